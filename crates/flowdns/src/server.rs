use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use tokio::net::{TcpListener, UdpSocket};

use crate::flow::{Datagram, NewFlow, UdpFlow};
use crate::provider::ProxyProvider;
use crate::{RelayError, MAX_DATAGRAM_SIZE};

/// Local stand-in for the platform's flow interception.
///
/// Every received datagram becomes one UDP flow; every accepted TCP connection is
/// offered as a TCP flow and dropped.
pub struct FlowHost {
    udp_socket: Arc<UdpSocket>,
    tcp_listener: TcpListener,
}

impl FlowHost {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let udp_socket = Arc::new(
            UdpSocket::bind(addr)
                .await
                .context("error while creating a UDP socket")?,
        );
        // Share the port picked for UDP when binding to port 0
        let tcp_addr = udp_socket
            .local_addr()
            .context("error while getting UDP socket's local addr")?;
        let tcp_listener = TcpListener::bind(tcp_addr)
            .await
            .context("error while creating a TcpListener")?;

        Ok(FlowHost {
            udp_socket,
            tcp_listener,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.udp_socket
            .local_addr()
            .context("error while getting the local addr")
    }

    /// Feeds flows to `provider` until `shutdown` resolves
    pub async fn run<P>(
        &self,
        provider: &P,
        shutdown: impl Future<Output = ()>,
    ) -> anyhow::Result<()>
    where
        P: ProxyProvider<Flow = SocketFlow>,
    {
        let mut recv = vec![0; MAX_DATAGRAM_SIZE];
        tokio::pin!(shutdown);

        loop {
            let flow = tokio::select! {
                _ = &mut shutdown => break,
                result = self.udp_socket.recv_from(&mut recv) => {
                    let (len, from) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            tracing::debug!("error while receiving a datagram: {}", e);
                            continue;
                        }
                    };
                    tracing::trace!(%from, "new UDP flow");

                    NewFlow::Udp(SocketFlow::new(
                        self.udp_socket.clone(),
                        Datagram {
                            payload: recv[..len].to_vec(),
                            endpoint: from,
                        },
                    ))
                }
                result = self.tcp_listener.accept() => {
                    let (_stream, from) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::debug!("error while accepting a TCP connection: {}", e);
                            continue;
                        }
                    };
                    tracing::trace!(%from, "new TCP flow");

                    NewFlow::Tcp {
                        remote_hostname: Some(from.ip().to_string()),
                    }
                }
            };

            provider.handle_new_flow(flow);
        }

        Ok(())
    }
}

/// Flow made of a single datagram received on the host's socket
pub struct SocketFlow {
    socket: Arc<UdpSocket>,
    hostname: String,
    client: SocketAddr,
    datagram: Option<Datagram>,
    is_open: bool,
}

impl SocketFlow {
    pub fn new(socket: Arc<UdpSocket>, datagram: Datagram) -> Self {
        SocketFlow {
            socket,
            hostname: datagram.endpoint.ip().to_string(),
            client: datagram.endpoint,
            datagram: Some(datagram),
            is_open: false,
        }
    }
}

impl UdpFlow for SocketFlow {
    fn remote_hostname(&self) -> Option<&str> {
        Some(&self.hostname)
    }

    async fn open(&mut self) -> io::Result<()> {
        self.is_open = true;
        Ok(())
    }

    async fn read_datagrams(&mut self) -> io::Result<Option<Vec<Datagram>>> {
        if !self.is_open {
            return Err(io::ErrorKind::NotConnected.into());
        }

        Ok(self.datagram.take().map(|datagram| vec![datagram]))
    }

    async fn write_datagrams(&mut self, datagrams: Vec<Datagram>) -> io::Result<()> {
        if !self.is_open {
            return Err(io::ErrorKind::NotConnected.into());
        }

        for datagram in datagrams {
            self.socket
                .send_to(&datagram.payload, datagram.endpoint)
                .await?;
        }

        Ok(())
    }

    fn close_read(&mut self, error: Option<&RelayError>) {
        if let Some(e) = error {
            tracing::trace!(client = %self.client, "closing read side: {}", e);
        }
        self.datagram = None;
        self.is_open = false;
    }

    fn close_write(&mut self, error: Option<&RelayError>) {
        if let Some(e) = error {
            tracing::trace!(client = %self.client, "closing write side: {}", e);
        }
        self.is_open = false;
    }
}
