// Authentication module
//
// The proxy holds no credentials of its own. A caller is authenticated when
// the backend's identity endpoint accepts the headers the caller sent us.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::constants::AUTH_CHECK_PATH;

/// Headers that describe the inbound body or connection. The identity call
/// is a body-less GET, so these never go along with it.
const NON_FORWARDABLE_AUTH_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "content-type",
    "transfer-encoding",
    "connection",
    "expect",
];

/// Decides whether a set of inbound headers belongs to a valid session.
///
/// Implementations must never fail: any problem reaching the identity
/// provider is an authentication failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthChecker: Send + Sync {
    async fn verify(&self, headers: &HashMap<String, String>) -> bool;
}

/// Validates sessions with `GET {backend}/api/users/me`.
///
/// 2xx means valid. Any other status, a network error or a timeout means
/// invalid. There is no retry.
pub struct BackendAuthChecker {
    client: reqwest::Client,
    url: String,
}

impl BackendAuthChecker {
    /// Share an existing client (connection pool) with other backend callers
    pub fn with_client(client: reqwest::Client, backend_url: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", backend_url.trim_end_matches('/'), AUTH_CHECK_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AuthChecker for BackendAuthChecker {
    async fn verify(&self, headers: &HashMap<String, String>) -> bool {
        let mut request = self.client.get(&self.url);
        for (name, value) in identity_headers(headers) {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    tracing::debug!(
                        status_code = status.as_u16(),
                        "Identity endpoint rejected the session"
                    );
                }
                status.is_success()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    timeout = e.is_timeout(),
                    url = %self.url,
                    "Identity check failed"
                );
                false
            }
        }
    }
}

/// Inbound headers minus the ones that describe the inbound body or connection
pub fn identity_headers(headers: &HashMap<String, String>) -> Vec<(&str, &str)> {
    headers
        .iter()
        .filter(|(name, _)| {
            !NON_FORWARDABLE_AUTH_HEADERS
                .iter()
                .any(|blocked| name.eq_ignore_ascii_case(blocked))
        })
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}
