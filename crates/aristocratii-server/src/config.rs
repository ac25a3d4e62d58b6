use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Runtime settings, read from `ARISTOCRATII_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let port: u16 = var("ARISTOCRATII_PORT", "5000")
            .parse()
            .context("ARISTOCRATII_PORT must be a port number")?;
        let max_upload_mb: usize = var("ARISTOCRATII_MAX_UPLOAD_MB", "16")
            .parse()
            .context("ARISTOCRATII_MAX_UPLOAD_MB must be a whole number")?;
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .context("ARISTOCRATII_MAX_UPLOAD_MB is too large")?;

        Ok(Self {
            host: var("ARISTOCRATII_HOST", "0.0.0.0"),
            port,
            db_path: var("ARISTOCRATII_DB_PATH", "aristocratii.db").into(),
            upload_dir: var("ARISTOCRATII_UPLOAD_DIR", "./uploads").into(),
            max_upload_bytes,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.db_path, PathBuf::from("aristocratii.db"));
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config_from(&[("ARISTOCRATII_PORT", "http")]).is_err());
    }

    #[test]
    fn oversized_upload_limit_is_an_error() {
        let huge = usize::MAX.to_string();
        let err = config_from(&[("ARISTOCRATII_MAX_UPLOAD_MB", huge.as_str())]).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn overrides_are_used() {
        let config = config_from(&[
            ("ARISTOCRATII_HOST", "127.0.0.1"),
            ("ARISTOCRATII_PORT", "8080"),
            ("ARISTOCRATII_UPLOAD_DIR", "/srv/images"),
        ])
        .unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.upload_dir, PathBuf::from("/srv/images"));
    }
}
