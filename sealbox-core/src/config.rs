use crate::error::{Result, SealError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "http://127.0.0.1:5000";

/// Settings shared by everything that acts on behalf of a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub data_dir: PathBuf,
    /// Remote registry; `None` means the registry lives in the local database.
    pub registry_url: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".").join("sealbox"),
            registry_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Self::default()
        }
    }

    pub fn with_registry(mut self, url: impl Into<String>) -> Self {
        self.registry_url = Some(url.into());
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("sealbox.db")
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(SealError::config("Data directory cannot be empty"));
        }

        if let Some(url) = &self.registry_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SealError::config(format!(
                    "Registry URL must be http(s): {}",
                    url
                )));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(SealError::config("Request timeout must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(ClientConfig::default()
            .with_registry(DEFAULT_REGISTRY_URL)
            .validate()
            .is_ok());
        assert!(ClientConfig::default()
            .with_registry("ftp://example.com")
            .validate()
            .is_err());
    }
}
