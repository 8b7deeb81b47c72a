// Test harness for integration tests
// Provides utilities to start/stop the proxy binary for testing

use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Test proxy instance that automatically starts and stops
pub struct ProxyTestHarness {
    process: Option<Child>,
    pub port: u16,
    pub base_url: String,
}

impl ProxyTestHarness {
    /// Start the proxy in front of `backend_url`, configured through the environment
    pub async fn start(backend_url: &str, port: u16) -> Result<Self, String> {
        let binary_path = env!("CARGO_BIN_EXE_immich-resize-proxy");

        let child = Command::new(binary_path)
            .env("IMMICH_URL", backend_url)
            .env("LISTEN_ADDRESS", "127.0.0.1")
            .env("PORT", port.to_string())
            .env("SIZE_W", "640")
            .env("SIZE_H", "480")
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to start proxy: {}", e))?;

        let mut harness = ProxyTestHarness {
            process: Some(child),
            port,
            base_url: format!("http://127.0.0.1:{}", port),
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        // Try a few times to connect
        for _ in 0..20 {
            if harness.exited()? {
                return Err("Proxy exited during startup".to_string());
            }
            if let Ok(response) = client.get(harness.url("/health")).send().await {
                if response.status().is_success() {
                    return Ok(harness);
                }
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }

        harness.stop();
        Err(format!("Proxy did not respond on port {}", port))
    }

    /// Get the full URL for a request path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn exited(&mut self) -> Result<bool, String> {
        match self.process.as_mut().map(|c| c.try_wait()) {
            Some(Ok(Some(_))) | None => Ok(true),
            Some(Ok(None)) => Ok(false),
            Some(Err(e)) => Err(format!("Error checking proxy status: {}", e)),
        }
    }

    /// Stop the proxy (called automatically on drop)
    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ProxyTestHarness {
    fn drop(&mut self) {
        self.stop();
    }
}
