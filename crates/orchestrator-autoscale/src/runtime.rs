//! The container-runtime boundary (§1 lists "container-runtime primitives"
//! as an external collaborator, accessed only through this interface —
//! never a concrete ECS/k8s client).

use async_trait::async_trait;
use orchestrator_core::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[async_trait]
pub trait WorkerRuntime: Send + Sync {
    async fn current_desired_count(&self) -> Result<Option<u32>>;
    async fn set_desired_count(&self, count: u32) -> Result<()>;
    /// Best-effort scale-in protection; absence of support is not an error.
    async fn enable_scale_in_protection(&self) -> Result<()> {
        Ok(())
    }
    async fn disable_scale_in_protection(&self) -> Result<()> {
        Ok(())
    }
}

/// In-process stand-in for a real container orchestrator API: tracks a
/// desired count and logs every transition instead of calling out to
/// ECS/Kubernetes.
pub struct LoggingWorkerRuntime {
    desired: AtomicU32,
    protection: Mutex<bool>,
    service_name: String,
}

impl LoggingWorkerRuntime {
    pub fn new(service_name: impl Into<String>, initial_count: u32) -> Self {
        Self { desired: AtomicU32::new(initial_count), protection: Mutex::new(false), service_name: service_name.into() }
    }
}

#[async_trait]
impl WorkerRuntime for LoggingWorkerRuntime {
    async fn current_desired_count(&self) -> Result<Option<u32>> {
        Ok(Some(self.desired.load(Ordering::SeqCst)))
    }

    async fn set_desired_count(&self, count: u32) -> Result<()> {
        let previous = self.desired.swap(count, Ordering::SeqCst);
        tracing::info!(service = %self.service_name, previous, desired = count, "updated desired worker count");
        Ok(())
    }

    async fn enable_scale_in_protection(&self) -> Result<()> {
        *self.protection.lock().unwrap() = true;
        Ok(())
    }

    async fn disable_scale_in_protection(&self) -> Result<()> {
        *self.protection.lock().unwrap() = false;
        Ok(())
    }
}
