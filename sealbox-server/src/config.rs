use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub database_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            database_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sealbox")
                .join("registry.db"),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.bind_address.parse()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            bail!("Database path cannot be empty");
        }

        if self.bind_address.parse::<SocketAddr>().is_err() {
            bail!("Invalid bind address: {}", self.bind_address);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ServerConfig::default().validate().is_ok());

        let bad = ServerConfig {
            bind_address: "localhost".to_string(),
            ..ServerConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
