//! Authentication: Bearer-JWT for user traffic, a constant-time API-key
//! comparison as the automation fallback (§6).

use crate::config::AuthConfig;
use jsonwebtoken::{decode, DecodingKey, Validation};
use orchestrator_core::{Error, Result};
use serde::Deserialize;

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email_confirmed: bool,
    #[serde(default)]
    exp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedAuth {
    config: AuthConfig,
}

impl ResolvedAuth {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Validate a `Bearer <jwt>` token against the configured shared
    /// secret. Issuer-agnostic: only the signature and `email_confirmed`
    /// are checked.
    pub fn verify_jwt(&self, token: &str) -> Result<AuthenticatedUser> {
        let secret = self
            .config
            .jwt_secret
            .as_deref()
            .ok_or_else(|| Error::internal("no jwt secret configured"))?;
        let mut validation = Validation::default();
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map_err(|e| Error::internal(format!("jwt validation failed: {e}")))?;
        if self.config.require_email_confirmed && !data.claims.email_confirmed {
            return Err(Error::internal("email not confirmed"));
        }
        Ok(AuthenticatedUser { user_id: data.claims.sub })
    }

    /// Validate an API key against the configured allow-list in constant
    /// time, regardless of which entry (if any) matches.
    pub fn verify_api_key(&self, provided: &str) -> bool {
        let mut matched = false;
        for key in &self.config.api_keys {
            if constant_time_eq(key.as_bytes(), provided.as_bytes()) {
                matched = true;
            }
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_rejects_wrong_key() {
        let auth = ResolvedAuth::new(AuthConfig { api_keys: vec!["secret-1".to_string()], ..Default::default() });
        assert!(auth.verify_api_key("secret-1"));
        assert!(!auth.verify_api_key("wrong"));
    }

    #[test]
    fn jwt_round_trips_with_shared_secret() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let secret = "test-secret";
        let claims = serde_json::json!({
            "sub": "user-1",
            "email_confirmed": true,
            "exp": 9_999_999_999u64,
        });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();

        let auth = ResolvedAuth::new(AuthConfig {
            jwt_secret: Some(secret.to_string()),
            require_email_confirmed: true,
            api_keys: vec![],
        });
        let user = auth.verify_jwt(&token).unwrap();
        assert_eq!(user.user_id, "user-1");
    }

    #[test]
    fn jwt_rejects_unconfirmed_email_when_required() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let secret = "test-secret";
        let claims = serde_json::json!({ "sub": "user-1", "email_confirmed": false, "exp": 9_999_999_999u64 });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();

        let auth = ResolvedAuth::new(AuthConfig {
            jwt_secret: Some(secret.to_string()),
            require_email_confirmed: true,
            api_keys: vec![],
        });
        assert!(auth.verify_jwt(&token).is_err());
    }
}
