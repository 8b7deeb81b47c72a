// Proxy module - Pingora ProxyHttp implementation
//
// `POST /api/assets` is answered by the upload pipeline inside
// `request_filter`. `/health` and `/metrics` are served locally. Every other
// request goes to the backend untouched.

use async_trait::async_trait;
use bytes::Bytes;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::{RequestHeader, ResponseHeader};
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::constants::{ASSET_UPLOAD_PATH, REQUEST_ID_HEADER};
use crate::error::UploadError;
use crate::forwarder::ForwardOutcome;
use crate::metrics::Metrics;
use crate::pipeline::{RequestContext, UploadPipeline};

pub mod helpers;
pub mod special_endpoints;
pub mod upload_response;

use helpers::{extract_headers, get_client_ip, read_body_limited, write_response};
use special_endpoints::{handle_health, handle_metrics, EndpointResponse, SpecialEndpoint};
use upload_response::UploadResponse;

/// Whether a request is an asset upload the pipeline should take over
pub fn is_upload_request(method: &str, path: &str) -> bool {
    method.eq_ignore_ascii_case("POST") && path.trim_end_matches('/') == ASSET_UPLOAD_PATH
}

/// UploadProxy implements the Pingora ProxyHttp trait
pub struct UploadProxy {
    config: Arc<Config>,
    pipeline: Arc<UploadPipeline>,
    metrics: Arc<Metrics>,
    /// Backend host, port and TLS flag for pass-through requests
    backend_peer: (String, u16, bool),
    /// Proxy start time (for uptime calculation in /health endpoint)
    start_time: Instant,
}

impl UploadProxy {
    /// Create a new UploadProxy from a validated configuration
    pub fn new(config: Config) -> std::result::Result<Self, String> {
        let metrics = Arc::new(Metrics::new());
        let pipeline = UploadPipeline::from_config(&config, Arc::clone(&metrics))?;
        Self::with_pipeline(config, pipeline)
    }

    /// Create an UploadProxy around an already wired pipeline
    pub fn with_pipeline(
        config: Config,
        pipeline: UploadPipeline,
    ) -> std::result::Result<Self, String> {
        let backend_peer = config.backend.peer_address()?;
        let metrics = pipeline.metrics();

        Ok(Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics,
            backend_peer,
            start_time: Instant::now(),
        })
    }

    /// Get a reference to the metrics instance
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle `POST /api/assets` end to end. Always writes a response.
    async fn handle_upload(&self, session: &mut Session, ctx: &mut RequestContext) -> Result<()> {
        let _permit = match self.pipeline.try_acquire_slot() {
            Ok(permit) => permit,
            Err(err) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    "Rejecting upload due to max concurrent uploads reached"
                );
                return self.write_upload_error(session, ctx, &err).await;
            }
        };

        self.metrics.increment_active_uploads();
        let result = self.run_upload(session, ctx).await;
        self.metrics.decrement_active_uploads();

        match result {
            Ok(outcome) => {
                ctx.set_status_tag(outcome.status_tag);
                self.write_outcome(session, ctx, outcome).await
            }
            Err(err) => self.write_upload_error(session, ctx, &err).await,
        }
    }

    async fn run_upload(
        &self,
        session: &mut Session,
        ctx: &RequestContext,
    ) -> std::result::Result<ForwardOutcome, UploadError> {
        let headers = extract_headers(session.req_header());
        let content_type = headers.get("content-type").cloned();

        let body = read_body_limited(session, self.config.server.max_upload_size).await?;

        self.pipeline
            .handle(ctx.request_id(), headers, content_type.as_deref(), body)
            .await
    }

    /// Relay the backend's answer with the asset status marker
    async fn write_outcome(
        &self,
        session: &mut Session,
        ctx: &RequestContext,
        outcome: ForwardOutcome,
    ) -> Result<()> {
        let response = UploadResponse::from_outcome(outcome, ctx.request_id());
        self.write_upload_response(session, response).await
    }

    async fn write_upload_response(
        &self,
        session: &mut Session,
        response: UploadResponse,
    ) -> Result<()> {
        write_response(
            session,
            response.status,
            &response.content_type,
            &response.headers,
            response.body,
        )
        .await
    }

    async fn write_upload_error(
        &self,
        session: &mut Session,
        ctx: &RequestContext,
        err: &UploadError,
    ) -> Result<()> {
        self.metrics.record_upload_error(err);

        let status = err.status_code();
        if status >= 500 {
            tracing::error!(
                request_id = %ctx.request_id(),
                status_code = status,
                error = %err,
                cause = ?std::error::Error::source(err).map(|s| s.to_string()),
                "Upload failed"
            );
        } else {
            tracing::warn!(
                request_id = %ctx.request_id(),
                status_code = status,
                error = %err,
                "Upload rejected"
            );
        }

        let response = UploadResponse::from_error(err, ctx.request_id());
        self.write_upload_response(session, response).await
    }

    async fn write_endpoint(
        &self,
        session: &mut Session,
        ctx: &RequestContext,
        response: EndpointResponse,
    ) -> Result<()> {
        write_response(
            session,
            response.status,
            response.content_type,
            &[(REQUEST_ID_HEADER, ctx.request_id().to_string())],
            Bytes::from(response.body),
        )
        .await
    }
}

#[async_trait]
impl ProxyHttp for UploadProxy {
    type CTX = RequestContext;

    /// Create a new request context for each incoming request
    fn new_ctx(&self) -> Self::CTX {
        RequestContext::new("GET".to_string(), "/".to_string())
    }

    /// Every pass-through request goes to the single backend
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let (host, port, use_tls) = self.backend_peer.clone();
        let mut peer = Box::new(HttpPeer::new((host.clone(), port), use_tls, host));

        peer.options.connection_timeout =
            Some(Duration::from_secs(self.config.backend.connect_timeout));

        Ok(peer)
    }

    /// Route the request: built-in endpoints, asset uploads, or pass-through
    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.to_string();
        let path = req.uri.path().to_string();
        ctx.set_request_line(method.clone(), path.clone());

        if let Some(endpoint) = SpecialEndpoint::from_request(&method, &path) {
            let response = match endpoint {
                SpecialEndpoint::Health => handle_health(self.start_time),
                SpecialEndpoint::Metrics => handle_metrics(&self.metrics),
            };
            self.write_endpoint(session, ctx, response).await?;
            return Ok(true);
        }

        if is_upload_request(&method, &path) {
            tracing::debug!(
                request_id = %ctx.request_id(),
                client_ip = %get_client_ip(session),
                "Handling asset upload"
            );
            self.handle_upload(session, ctx).await?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Tag pass-through requests for correlation in backend logs
    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        upstream_request.insert_header(REQUEST_ID_HEADER, ctx.request_id().to_string())?;
        Ok(())
    }

    /// Add X-Request-ID to pass-through responses
    fn upstream_response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        upstream_response
            .insert_header(REQUEST_ID_HEADER, ctx.request_id().to_string())
            .map_err(|e| {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    error = ?e,
                    "Failed to add X-Request-ID header"
                );
                e
            })?;

        Ok(())
    }

    /// Log request completion and record request metrics
    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora_core::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status_code = session
            .response_written()
            .map(|resp| resp.status.as_u16())
            .unwrap_or(500);
        let duration_ms = ctx.elapsed_ms();

        self.metrics
            .record_request(ctx.method(), status_code, duration_ms);

        tracing::info!(
            request_id = %ctx.request_id(),
            client_ip = %get_client_ip(session),
            method = %ctx.method(),
            path = %ctx.path(),
            status_code = status_code,
            status_tag = ctx.status_tag().map(|t| t.as_str()).unwrap_or("-"),
            duration_ms = duration_ms,
            "Request completed"
        );
    }
}
