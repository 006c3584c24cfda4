#[cfg(test)]
mod test_utils;

mod logging;
pub use logging::setup_logging;
mod error;
pub use error::RelayError;
pub mod connection;
pub use connection::{ConnectionState, UpstreamConnection};
mod resolver;
pub use resolver::UpstreamResolver;
pub mod flow;
mod relay;
pub use relay::relay_flow;
pub mod provider;
pub use provider::{DnsProxyProvider, ProxyProvider, StopReason};
pub mod server;
pub use server::FlowHost;
mod cli;
pub use cli::Args;
mod config;
pub use config::RelayConfig;
mod app;
pub use app::App;

/// Largest UDP payload, used for every receive buffer
pub const MAX_DATAGRAM_SIZE: usize = 65_535;
