use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crate::connection::{Connector, StateObserver, UdpConnector, UpstreamConnection};
use crate::{RelayConfig, RelayError};

/// Forwards raw queries to the fixed upstream, one transient connection per query
pub struct UpstreamResolver<C: Connector = UdpConnector> {
    connector: C,
    endpoint: SocketAddr,
    timeout: Option<Duration>,
    observer: Option<StateObserver>,
}

impl UpstreamResolver<UdpConnector> {
    pub fn new(config: &RelayConfig) -> Self {
        UpstreamResolver::with_connector(UdpConnector, config)
    }
}

impl<C: Connector> UpstreamResolver<C> {
    pub fn with_connector(connector: C, config: &RelayConfig) -> Self {
        UpstreamResolver {
            connector,
            endpoint: config.upstream_resolver,
            timeout: config.upstream_timeout,
            observer: None,
        }
    }

    /// Attaches an observer to every connection this resolver opens
    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    fn new_connection(&self) -> UpstreamConnection<C> {
        UpstreamConnection::new(self.endpoint, self.connector.clone())
            .with_establish_timeout(self.timeout)
            .with_observer(self.observer.clone())
    }

    /// Sends `query` upstream and waits for exactly one reply.
    ///
    /// The connection is cancelled before returning, whatever the outcome, and also when
    /// the returned future is dropped.
    pub async fn resolve(&self, query: &[u8]) -> Result<Vec<u8>, RelayError> {
        let mut connection = self.new_connection();

        let result = match connection.establish().await {
            Ok(()) => self.exchange(&connection, query).await,
            Err(e) => {
                tracing::error!(upstream = %self.endpoint, "Failed to establish connection: {}", e);
                connection.cancel();
                return Err(e);
            }
        };
        connection.cancel();

        result.inspect_err(|e| {
            tracing::error!(upstream = %self.endpoint, "Error while resolving upstream: {}", e)
        })
    }

    async fn exchange(
        &self,
        connection: &UpstreamConnection<C>,
        query: &[u8],
    ) -> Result<Vec<u8>, RelayError> {
        let exchange = async {
            connection.send(query).await?;
            connection
                .receive_message()
                .await?
                .ok_or(RelayError::NoResponse)
        };

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .unwrap_or_else(|_| {
                    Err(RelayError::transport(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "upstream did not reply in time",
                    )))
                }),
            None => exchange.await,
        }
    }
}
