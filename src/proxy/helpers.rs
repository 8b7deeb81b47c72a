//! Proxy utility functions.
//!
//! This module contains helper functions for request processing:
//! - Header extraction from Pingora requests
//! - Client IP detection (X-Forwarded-For aware)
//! - Bounded request body buffering
//! - Writing complete responses from `request_filter`

use bytes::{Bytes, BytesMut};
use std::collections::HashMap;

use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::Session;

use crate::error::UploadError;

/// Extract headers from Pingora RequestHeader into HashMap.
///
/// Converts all headers to string key-value pairs. Headers with non-UTF8
/// values are skipped. Repeated headers keep the last value.
pub fn extract_headers(req: &RequestHeader) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (name, value) in req.headers.iter() {
        if let Ok(value_str) = value.to_str() {
            headers.insert(name.to_string(), value_str.to_string());
        }
    }
    headers
}

/// Declared body size, when the client sent a valid `Content-Length`
pub fn content_length(req: &RequestHeader) -> Option<usize> {
    req.headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<usize>().ok())
}

/// Extract client IP address from session (X-Forwarded-For aware).
///
/// The header can contain multiple IPs: `"client, proxy1, proxy2"`.
/// The first IP is the original client, which is what we return.
pub fn get_client_ip(session: &Session) -> String {
    if let Some(forwarded_for) = session
        .req_header()
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(client_ip) = forwarded_for.split(',').next() {
            return client_ip.trim().to_string();
        }
    }

    session
        .client_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Buffer the whole request body, refusing anything over `limit` bytes.
///
/// A declared `Content-Length` over the limit is rejected before reading.
pub async fn read_body_limited(session: &mut Session, limit: usize) -> Result<Bytes, UploadError> {
    if let Some(declared) = content_length(session.req_header()) {
        if declared > limit {
            return Err(UploadError::PayloadTooLarge { limit });
        }
    }

    let mut body = BytesMut::new();
    loop {
        match session.read_request_body().await {
            Ok(Some(chunk)) => {
                if body.len() + chunk.len() > limit {
                    return Err(UploadError::PayloadTooLarge { limit });
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => return Err(UploadError::Body(e.to_string())),
        }
    }

    Ok(body.freeze())
}

/// Write a complete response (header and body) to the client
pub async fn write_response(
    session: &mut Session,
    status: u16,
    content_type: &str,
    extra_headers: &[(&'static str, String)],
    body: Bytes,
) -> pingora_core::Result<()> {
    let mut header = ResponseHeader::build(status, None)?;
    header.insert_header("Content-Type", content_type.to_string())?;
    header.insert_header("Content-Length", body.len().to_string())?;
    for (name, value) in extra_headers {
        header.insert_header(*name, value.clone())?;
    }

    session
        .write_response_header(Box::new(header), false)
        .await?;
    session.write_response_body(Some(body), true).await?;
    Ok(())
}
