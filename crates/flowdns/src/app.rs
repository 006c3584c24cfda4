use std::net::SocketAddr;

use anyhow::Context as _;

use crate::provider::{DnsProxyProvider, ProxyProvider, StopReason};
use crate::server::{FlowHost, SocketFlow};
use crate::{Args, RelayConfig, UpstreamResolver};

pub struct App;

impl App {
    pub async fn run_until_completion(args: Args) -> anyhow::Result<()> {
        let bind_addr = SocketAddr::new(args.host, args.port);
        let config = RelayConfig::from(&args);

        let host = FlowHost::bind(bind_addr)
            .await
            .context("failed to instantiate the flow host")?;
        let provider: DnsProxyProvider<SocketFlow> =
            DnsProxyProvider::new(UpstreamResolver::new(&config));

        provider
            .start_proxy()
            .context("failed to start the DNS proxy")?;
        tracing::info!(
            listen = %host.local_addr()?,
            upstream = %config.upstream_resolver,
            timeout = ?config.upstream_timeout,
            "Relaying intercepted DNS flows"
        );

        let result = host.run(&provider, shutdown_signal()).await;
        provider.stop_proxy(StopReason::UserRequested).await;

        result
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
