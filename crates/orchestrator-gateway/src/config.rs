//! Gateway configuration: bind address and the two auth paths (user JWT,
//! automation API key), following the grounding workspace's flat
//! `GatewayConfig`/`AuthConfig` shape.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { port: default_port(), bind: BindMode::default(), auth: AuthConfig::default() }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Loopback,
    #[default]
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

/// `jwt_secret` validates the Bearer-JWT path; `api_keys` is the
/// constant-time-compared automation fallback.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub require_email_confirmed: bool,
    #[serde(default)]
    pub api_keys: Vec<String>,
}
