//! Transient UDP connection to the upstream resolver.
//!
//! A connection walks `Created → Establishing → Ready` and ends in `Cancelled`, possibly
//! through `Failed`. Every transition is pushed through the state update handler, which
//! is also the single completion slot [`UpstreamConnection::establish`] waits on.
//! Dropping a connection cancels it, so aborted tasks still reach `Cancelled`.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;

use crate::{RelayError, MAX_DATAGRAM_SIZE};

pub trait Transport: Send + Sync + 'static {
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;
}

impl Transport for UdpSocket {
    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.recv(buf).await
    }
}

/// Opens transports to a single endpoint
pub trait Connector: Clone + Send + Sync + 'static {
    type Transport: Transport;

    fn connect(
        &self,
        endpoint: SocketAddr,
    ) -> impl Future<Output = io::Result<Self::Transport>> + Send;
}

/// Binds an ephemeral UDP socket of the endpoint's family and connects it
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    type Transport = UdpSocket;

    async fn connect(&self, endpoint: SocketAddr) -> io::Result<UdpSocket> {
        let local_addr: SocketAddr = if endpoint.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local_addr).await?;
        socket.connect(endpoint).await?;
        Ok(socket)
    }
}

#[derive(Debug, Clone)]
pub enum ConnectionState {
    Created,
    Establishing,
    Ready,
    Failed(Arc<io::Error>),
    Cancelled,
}

impl ConnectionState {
    /// Result of establishment once the state is terminal for it
    pub fn outcome(&self) -> Option<Result<(), RelayError>> {
        match self {
            ConnectionState::Created | ConnectionState::Establishing => None,
            ConnectionState::Ready => Some(Ok(())),
            ConnectionState::Failed(error) => Some(Err(RelayError::Transport(error.clone()))),
            ConnectionState::Cancelled => Some(Err(RelayError::ConnectionCancelled)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Created => "created",
            ConnectionState::Establishing => "establishing",
            ConnectionState::Ready => "ready",
            ConnectionState::Failed(_) => "failed",
            ConnectionState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Failed(error) => write!(f, "failed ({})", error),
            state => f.write_str(state.name()),
        }
    }
}

/// Notified about every transition of every connection it is attached to
pub type StateObserver = Arc<dyn Fn(SocketAddr, &ConnectionState) + Send + Sync>;
pub type StateUpdateHandler = Box<dyn FnMut(&ConnectionState) + Send + Sync>;

pub struct UpstreamConnection<C: Connector> {
    endpoint: SocketAddr,
    connector: C,
    establish_timeout: Option<Duration>,
    state: ConnectionState,
    transport: Option<C::Transport>,
    state_update_handler: Option<StateUpdateHandler>,
    observer: Option<StateObserver>,
}

impl<C: Connector> UpstreamConnection<C> {
    pub fn new(endpoint: SocketAddr, connector: C) -> Self {
        UpstreamConnection {
            endpoint,
            connector,
            establish_timeout: None,
            state: ConnectionState::Created,
            transport: None,
            state_update_handler: None,
            observer: None,
        }
    }

    /// A transport that isn't ready in time moves the connection to `Failed(TimedOut)`
    pub fn with_establish_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.establish_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Option<StateObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the state update handler, returning the previous one
    pub fn set_state_update_handler(
        &mut self,
        handler: Option<StateUpdateHandler>,
    ) -> Option<StateUpdateHandler> {
        std::mem::replace(&mut self.state_update_handler, handler)
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Starts the connection and suspends until it is ready, failed or cancelled.
    ///
    /// A connection that already settled returns the outcome of its current state.
    /// The installed state update handler is parked for the duration of the call and
    /// restored afterward; dropping the returned future mid-way leaves it parked.
    pub async fn establish(&mut self) -> Result<(), RelayError> {
        if let Some(outcome) = self.state.outcome() {
            return outcome;
        }

        let (tx, mut rx) = oneshot::channel();
        let mut completion = Some(tx);
        let previous = self.set_state_update_handler(Some(Box::new(move |state: &ConnectionState| {
            if let Some(outcome) = state.outcome() {
                // First settled state wins, later transitions find the slot empty
                if let Some(tx) = completion.take() {
                    let _ = tx.send(outcome);
                }
            }
        })));

        self.start().await;
        self.set_state_update_handler(previous);

        rx.try_recv().unwrap_or(Err(RelayError::ConnectionCancelled))
    }

    async fn start(&mut self) {
        self.set_state(ConnectionState::Establishing);

        let connect = self.connector.connect(self.endpoint);
        let result = match self.establish_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .unwrap_or_else(|_| {
                    Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "upstream connection was waiting for too long",
                    ))
                }),
            None => connect.await,
        };

        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                self.set_state(ConnectionState::Ready);
            }
            Err(error) => self.set_state(ConnectionState::Failed(Arc::new(error))),
        }
    }

    /// Hands the whole payload to the transport
    pub async fn send(&self, payload: &[u8]) -> Result<(), RelayError> {
        let transport = self.ready_transport()?;
        let sent = transport
            .send(payload)
            .await
            .map_err(RelayError::transport)?;
        if sent != payload.len() {
            return Err(RelayError::transport(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} out of {} bytes", sent, payload.len()),
            )));
        }

        Ok(())
    }

    /// Waits for one complete datagram, `None` if it was empty
    pub async fn receive_message(&self) -> Result<Option<Vec<u8>>, RelayError> {
        let transport = self.ready_transport()?;
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let len = transport
            .recv(&mut buf)
            .await
            .map_err(RelayError::transport)?;
        if len == 0 {
            return Ok(None);
        }

        buf.truncate(len);
        Ok(Some(buf))
    }

    /// Terminal and idempotent, releases the socket
    pub fn cancel(&mut self) {
        if matches!(self.state, ConnectionState::Cancelled) {
            return;
        }

        self.transport = None;
        self.set_state(ConnectionState::Cancelled);
    }

    fn ready_transport(&self) -> Result<&C::Transport, RelayError> {
        match (&self.state, &self.transport) {
            (ConnectionState::Ready, Some(transport)) => Ok(transport),
            (ConnectionState::Cancelled, _) => Err(RelayError::ConnectionCancelled),
            (state, _) => Err(RelayError::transport(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("upstream connection is {}", state),
            ))),
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        tracing::trace!(upstream = %self.endpoint, "connection state: {} -> {}", self.state, state);

        if let Some(handler) = self.state_update_handler.as_mut() {
            handler(&state);
        }
        if let Some(observer) = self.observer.as_ref() {
            observer(self.endpoint, &state);
        }

        self.state = state;
    }
}

impl<C: Connector> Drop for UpstreamConnection<C> {
    fn drop(&mut self) {
        self.cancel();
    }
}
