use crate::core::errors::PipelineError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Device-id collaborator: a stable fingerprint for this installation
#[async_trait]
pub trait DeviceIdProvider: Send + Sync {
    async fn client_id(&self) -> Result<String, PipelineError>;
}

/// Fixed device id, for tests and for hosts that already know theirs.
#[derive(Debug, Clone)]
pub struct StaticDeviceId(String);

impl StaticDeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[async_trait]
impl DeviceIdProvider for StaticDeviceId {
    async fn client_id(&self) -> Result<String, PipelineError> {
        Ok(self.0.clone())
    }
}

/// Fingerprint memoized for the process lifetime and persisted to a file.
///
/// The first call reads the persisted id, or derives one from host traits and
/// writes it back. Later calls return the cached value without touching disk.
#[derive(Debug)]
pub struct FileDeviceId {
    path: Option<PathBuf>,
    cached: OnceCell<String>,
}

impl FileDeviceId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cached: OnceCell::new(),
        }
    }

    /// Memoize in memory only
    pub fn ephemeral() -> Self {
        Self {
            path: None,
            cached: OnceCell::new(),
        }
    }

    async fn load_or_create(&self) -> Result<String, PipelineError> {
        if let Some(path) = &self.path {
            match tokio::fs::read_to_string(path).await {
                Ok(stored) if !stored.trim().is_empty() => {
                    debug!(path = %path.display(), "loaded persisted device id");
                    return Ok(stored.trim().to_string());
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(PipelineError::DeviceId(format!(
                        "Failed to read {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        let id = fingerprint();

        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!(path = %path.display(), error = %e, "could not create device id directory");
                }
            }
            if let Err(e) = tokio::fs::write(path, &id).await {
                warn!(path = %path.display(), error = %e, "could not persist device id");
            }
        }

        Ok(id)
    }
}

#[async_trait]
impl DeviceIdProvider for FileDeviceId {
    async fn client_id(&self) -> Result<String, PipelineError> {
        self.cached
            .get_or_try_init(|| self.load_or_create())
            .await
            .cloned()
    }
}

/// 32 hex chars derived from stable host traits.
fn fingerprint() -> String {
    let mut hasher = Sha256::new();
    for part in [
        std::env::consts::OS,
        std::env::consts::ARCH,
        std::env::consts::FAMILY,
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    for var in ["HOSTNAME", "COMPUTERNAME", "USER", "USERNAME", "HOME"] {
        if let Ok(value) = std::env::var(var) {
            hasher.update(var.as_bytes());
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
    }
    hex::encode(&hasher.finalize()[..16])
}
