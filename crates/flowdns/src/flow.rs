use std::future::Future;
use std::io;
use std::net::SocketAddr;

use crate::RelayError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    /// Peer the payload came from, replies are addressed back to it
    pub endpoint: SocketAddr,
}

/// One intercepted client UDP session to port 53.
///
/// Closing is synchronous so that a flow can still be closed from `Drop`.
pub trait UdpFlow: Send + 'static {
    fn remote_hostname(&self) -> Option<&str>;

    fn open(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// `None` if the flow carried nothing at all
    fn read_datagrams(&mut self) -> impl Future<Output = io::Result<Option<Vec<Datagram>>>> + Send;

    fn write_datagrams(
        &mut self,
        datagrams: Vec<Datagram>,
    ) -> impl Future<Output = io::Result<()>> + Send;

    fn close_read(&mut self, error: Option<&RelayError>);
    fn close_write(&mut self, error: Option<&RelayError>);
}

/// Flow offered by the host for admission
pub enum NewFlow<F> {
    Udp(F),
    Tcp { remote_hostname: Option<String> },
}

impl<F: UdpFlow> NewFlow<F> {
    pub fn remote_hostname(&self) -> Option<&str> {
        match self {
            NewFlow::Udp(flow) => flow.remote_hostname(),
            NewFlow::Tcp { remote_hostname } => remote_hostname.as_deref(),
        }
    }

    pub fn protocol(&self) -> &'static str {
        match self {
            NewFlow::Udp(_) => "UDP",
            NewFlow::Tcp { .. } => "TCP",
        }
    }
}
