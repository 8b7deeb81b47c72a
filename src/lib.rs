// Immich Resize Proxy Library

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod forwarder;
pub mod image_optimizer;
pub mod logging;
pub mod metrics;
pub mod multipart;
pub mod pipeline;
pub mod proxy;
pub mod server;
