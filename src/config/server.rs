//! Server and backend configuration types.
//!
//! Default values are sourced from `crate::constants`.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_BACKEND_URL, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_FORWARD_TIMEOUT_SECS, DEFAULT_LISTEN_ADDRESS, DEFAULT_MAX_CONCURRENT_UPLOADS,
    DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_PORT, DEFAULT_THREADS,
};

fn default_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Default worker thread count
fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_max_upload_size() -> usize {
    DEFAULT_MAX_UPLOAD_SIZE
}

fn default_max_concurrent_uploads() -> usize {
    DEFAULT_MAX_CONCURRENT_UPLOADS
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_auth_timeout() -> u64 {
    DEFAULT_AUTH_TIMEOUT_SECS
}

fn default_forward_timeout() -> u64 {
    DEFAULT_FORWARD_TIMEOUT_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Worker threads for the proxy service
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Largest accepted upload body in bytes (default: 512 MB)
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
    /// Uploads processed at the same time; more are answered 503
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            threads: default_threads(),
            max_upload_size: default_max_upload_size(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
        }
    }
}

impl ServerConfig {
    /// `address:port` for the TCP listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// The Immich server every request ends up at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://immich-server:2283`
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Identity check deadline in seconds
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout: u64,
    /// Asset forward deadline in seconds
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout: u64,
    /// TCP connect deadline for every backend call, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            auth_timeout: default_auth_timeout(),
            forward_timeout: default_forward_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl BackendConfig {
    /// Host, port and TLS flag for the pass-through peer
    pub fn peer_address(&self) -> Result<(String, u16, bool), String> {
        let url = Url::parse(&self.url)
            .map_err(|e| format!("Backend URL '{}' is invalid: {}", self.url, e))?;

        let use_tls = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(format!(
                    "Backend URL '{}' has unsupported scheme '{}'",
                    self.url, other
                ))
            }
        };

        // IPv6 literals drop their brackets so they resolve as a socket address
        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .filter(|host| !host.is_empty())
            .ok_or_else(|| format!("Backend URL '{}' has no host", self.url))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| format!("Backend URL '{}' has no port", self.url))?;

        Ok((host, port, use_tls))
    }
}
