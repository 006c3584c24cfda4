use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::Args;

pub const DEFAULT_UPSTREAM_RESOLVER: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));
pub const DEFAULT_UPSTREAM_PORT: u16 = 53;

/// Immutable settings shared by every relayed flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub upstream_resolver: SocketAddr,
    /// Bounds establishing the upstream connection and the query exchange.
    /// `None` waits indefinitely.
    pub upstream_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            upstream_resolver: SocketAddr::new(DEFAULT_UPSTREAM_RESOLVER, DEFAULT_UPSTREAM_PORT),
            upstream_timeout: None,
        }
    }
}

impl From<&Args> for RelayConfig {
    fn from(args: &Args) -> Self {
        RelayConfig {
            upstream_resolver: SocketAddr::new(args.upstream_resolver, args.upstream_port),
            upstream_timeout: (args.upstream_timeout_ms > 0)
                .then(|| Duration::from_millis(args.upstream_timeout_ms)),
        }
    }
}
