use std::io;
use std::sync::Arc;

use flowdns_lib::MessageError;

/// Every way relaying a flow can fail.
///
/// The flow relay is the only place that turns one of these into a flow closure;
/// everything below it propagates them unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The flow produced a datagram count other than exactly one
    #[error("malformed DNS query: flow produced {0} datagrams instead of one")]
    MalformedQuery(usize),
    #[error("no datagrams in flow")]
    NoDatagrams,
    #[error("upstream DNS server did not return data")]
    NoResponse,
    /// Upstream socket failure: waiting, failed, timed out or used while not ready
    #[error("upstream transport error: {0}")]
    Transport(#[source] Arc<io::Error>),
    #[error("upstream connection was cancelled")]
    ConnectionCancelled,
    /// Opening, reading or writing the intercepted flow failed
    #[error("flow I/O error: {0}")]
    Flow(#[source] io::Error),
    /// Relay task went away before it could finish, e.g. on proxy shutdown
    #[error("relay was interrupted before completion")]
    Interrupted,
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl RelayError {
    pub fn transport(error: io::Error) -> Self {
        RelayError::Transport(Arc::new(error))
    }

    /// Failure of the upstream exchange rather than of the flow itself
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RelayError::NoResponse | RelayError::Transport(_) | RelayError::ConnectionCancelled
        )
    }

    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            RelayError::Transport(error) => Some(error.kind()),
            RelayError::Flow(error) => Some(error.kind()),
            _ => None,
        }
    }
}
