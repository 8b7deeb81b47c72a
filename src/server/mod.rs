// Server module - Pingora HTTP server setup

use pingora_core::server::configuration::Opt as ServerOpt;
use pingora_core::server::Server;

use crate::config::Config;
use crate::proxy::UploadProxy;

/// Process-level switches passed through to Pingora
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerFlags {
    pub daemon: bool,
    pub test: bool,
    pub upgrade: bool,
}

impl ServerFlags {
    pub fn to_server_opt(self) -> ServerOpt {
        ServerOpt {
            daemon: self.daemon,
            test: self.test,
            upgrade: self.upgrade,
            ..Default::default()
        }
    }
}

/// Build a bootstrapped Pingora server with the proxy service registered.
///
/// The caller runs it with `run_forever`.
pub fn build_server(config: Config, flags: ServerFlags) -> Result<Server, String> {
    config.validate()?;

    let listen_addr = config.server.listen_address();
    let threads = config.server.threads;

    let mut server = Server::new(Some(flags.to_server_opt()))
        .map_err(|e| format!("Failed to create Pingora server: {}", e))?;
    server.bootstrap();

    let proxy = UploadProxy::new(config)?;
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&listen_addr);
    proxy_service.threads = Some(threads);

    tracing::info!(
        address = %listen_addr,
        threads = threads,
        "Registered upload proxy service"
    );

    server.add_service(proxy_service);
    Ok(server)
}
