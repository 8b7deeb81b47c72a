// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod server;

pub use server::{BackendConfig, ServerConfig};

pub use crate::image_optimizer::ImageConfig;

/// Complete proxy configuration.
///
/// Built once at startup and passed by value into the proxy; nothing reads
/// settings from globals afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub image: ImageConfig,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Configuration from the process environment alone.
    ///
    /// Reads `IMMICH_URL`, `SIZE_W`, `SIZE_H`, `LISTEN_ADDRESS` and `PORT`;
    /// anything unset keeps its default.
    pub fn from_env() -> Result<Self, String> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable lookup
    pub fn from_env_with<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("IMMICH_URL") {
            config.backend.url = url;
        }
        if let Some(width) = lookup("SIZE_W") {
            config.image.max_width = parse_env("SIZE_W", &width)?;
        }
        if let Some(height) = lookup("SIZE_H") {
            config.image.max_height = parse_env("SIZE_H", &height)?;
        }
        if let Some(address) = lookup("LISTEN_ADDRESS") {
            config.server.address = address;
        }
        if let Some(port) = lookup("PORT") {
            config.server.port = parse_env("PORT", &port)?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = self.backend.url.trim();
        if url.is_empty() {
            return Err("Backend URL cannot be empty".to_string());
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!(
                "Backend URL '{}' must start with http:// or https://",
                url
            ));
        }
        self.backend.peer_address()?;

        if self.image.max_width == 0 || self.image.max_height == 0 {
            return Err(format!(
                "Image bounds must be positive, got {}x{}",
                self.image.max_width, self.image.max_height
            ));
        }
        if !(1..=100).contains(&self.image.quality) {
            return Err(format!(
                "Image quality must be between 1 and 100, got {}",
                self.image.quality
            ));
        }
        if self.image.effort > 6 {
            return Err(format!(
                "Image effort must be between 0 and 6, got {}",
                self.image.effort
            ));
        }

        if self.server.max_upload_size == 0 {
            return Err("max_upload_size must be greater than 0".to_string());
        }
        if self.server.max_concurrent_uploads == 0 {
            return Err("max_concurrent_uploads must be greater than 0".to_string());
        }
        if self.server.threads == 0 {
            return Err("threads must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("Environment variable '{}' has invalid value '{}'", name, value))
}
