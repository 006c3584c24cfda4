use std::future::Future;
use std::sync::Arc;

use crate::connection::Connector;
use crate::flow::{Datagram, UdpFlow};
use crate::{RelayError, UpstreamResolver};

/// Closes the wrapped flow exactly once.
///
/// A guard dropped before [`FlowGuard::close`] ran (panic, task abort) closes both
/// sides with [`RelayError::Interrupted`].
struct FlowGuard<F: UdpFlow> {
    flow: F,
    closed: bool,
}

impl<F: UdpFlow> FlowGuard<F> {
    fn new(flow: F) -> Self {
        FlowGuard {
            flow,
            closed: false,
        }
    }

    fn close(&mut self, error: Option<&RelayError>) {
        if self.closed {
            return;
        }

        self.flow.close_read(error);
        self.flow.close_write(error);
        self.closed = true;
    }
}

impl<F: UdpFlow> Drop for FlowGuard<F> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!("flow is dropped before the relay finished");
            self.close(Some(&RelayError::Interrupted));
        }
    }
}

/// Relays the single query carried by `flow` and its reply.
///
/// The flow is owned by the returned future from the moment of the call, so it is
/// closed even if the future is never polled.
pub fn relay_flow<F: UdpFlow, C: Connector>(
    flow: F,
    resolver: Arc<UpstreamResolver<C>>,
) -> impl Future<Output = Result<(), RelayError>> + Send {
    relay_guarded(FlowGuard::new(flow), resolver)
}

async fn relay_guarded<F: UdpFlow, C: Connector>(
    mut guard: FlowGuard<F>,
    resolver: Arc<UpstreamResolver<C>>,
) -> Result<(), RelayError> {
    let result = relay_single_query(&mut guard.flow, &resolver).await;

    match &result {
        Ok(()) => {
            tracing::debug!("query relayed");
            guard.close(None);
        }
        Err(e) => {
            if e.is_upstream() {
                // Already reported by the resolver
                tracing::debug!("closing flow: {}", e);
            } else {
                tracing::warn!("closing flow: {}", e);
            }
            guard.close(Some(e));
        }
    }

    result
}

async fn relay_single_query<F: UdpFlow, C: Connector>(
    flow: &mut F,
    resolver: &UpstreamResolver<C>,
) -> Result<(), RelayError> {
    flow.open().await.map_err(RelayError::Flow)?;

    let datagrams = flow
        .read_datagrams()
        .await
        .map_err(RelayError::Flow)?
        .ok_or(RelayError::NoDatagrams)?;
    let [Datagram { payload, endpoint }] = <[Datagram; 1]>::try_from(datagrams)
        .map_err(|datagrams| RelayError::MalformedQuery(datagrams.len()))?;

    inspect_query(&payload);
    let reply = resolver.resolve(&payload).await?;
    inspect_reply(&reply);

    flow.write_datagrams(vec![Datagram {
        payload: reply,
        endpoint,
    }])
    .await
    .map_err(RelayError::Flow)
}

fn inspect_query(payload: &[u8]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    match flowdns_lib::extract_question_classes_and_types(payload) {
        Ok(classes_and_types) => {
            if let Some((class, dns_type)) = classes_and_types.first() {
                tracing::debug!(%class, r#type = %dns_type, "forwarding query upstream");
            }
        }
        Err(e) => tracing::debug!("can't inspect the query: {}", e),
    }
}

fn inspect_reply(reply: &[u8]) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    match flowdns_lib::parse(reply) {
        Ok(message) => tracing::debug!(
            id = message.header.id,
            rcode = %message.header.response_code,
            answers = message.answers.len(),
            "reply received from upstream"
        ),
        Err(e) => {
            tracing::debug!("can't inspect the reply: {}", e);
            return;
        }
    }

    match flowdns_lib::extract_answer_strings(reply) {
        Ok(answers) => {
            for answer in answers {
                tracing::debug!("{}", answer);
            }
        }
        Err(e) => tracing::debug!("can't inspect the reply: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;
    use crate::test_utils::{
        example_query, spawn_upstream, state_recorder, MockConnector, MockFlow,
    };
    use crate::RelayConfig;

    fn datagram(payload: Vec<u8>) -> Datagram {
        Datagram {
            payload,
            endpoint: "127.0.0.1:40000".parse().unwrap(),
        }
    }

    /// Resolver talking to a loopback upstream through a counting connector
    async fn loopback_resolver() -> (Arc<UpstreamResolver<MockConnector>>, MockConnector) {
        let (upstream, _) = spawn_upstream().await;
        let connector = MockConnector::default();
        let resolver = UpstreamResolver::with_connector(
            connector.clone(),
            &RelayConfig {
                upstream_resolver: upstream,
                upstream_timeout: Some(Duration::from_secs(5)),
            },
        );
        (Arc::new(resolver), connector)
    }

    fn unreachable_resolver(connector: MockConnector) -> Arc<UpstreamResolver<MockConnector>> {
        Arc::new(UpstreamResolver::with_connector(connector, &RelayConfig::default()))
    }

    #[tokio::test]
    async fn relay_single_datagram() {
        let (resolver, connector) = loopback_resolver().await;
        let query = example_query(0xbeef);
        let (flow, record) = MockFlow::new(Some(vec![datagram(query.clone())]));

        relay_flow(flow, resolver).await.expect("relay failed");
        assert_eq!(connector.connect_count(), 1);

        let record = record.lock().unwrap();
        assert!(record.opened);
        assert_eq!(record.writes.len(), 1);
        let written = &record.writes[0];
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].endpoint, "127.0.0.1:40000".parse().unwrap());

        let reply = flowdns_lib::parse(&written[0].payload).expect("reply should parse");
        assert_eq!(reply.header.id, 0xbeef);
        assert_eq!(
            flowdns_lib::extract_answer_strings(&written[0].payload).unwrap(),
            ["Name: example.com, TTL: 300, Data: 93.184.215.14"]
        );
        assert_eq!(record.read_closed, [None]);
        assert_eq!(record.write_closed, [None]);
    }

    #[tokio::test]
    async fn flow_without_datagrams() {
        let connector = MockConnector::default();
        let (flow, record) = MockFlow::new(None);

        let err = relay_flow(flow, unreachable_resolver(connector.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NoDatagrams));
        assert_eq!(connector.connect_count(), 0);

        let record = record.lock().unwrap();
        assert!(record.writes.is_empty());
        assert_eq!(record.read_closed, [Some("no datagrams in flow".to_owned())]);
        assert_eq!(record.write_closed, record.read_closed);
    }

    #[tokio::test]
    async fn more_than_one_datagram() {
        let connector = MockConnector::default();
        let query = example_query(1);
        let (flow, record) =
            MockFlow::new(Some(vec![datagram(query.clone()), datagram(query)]));

        let err = relay_flow(flow, unreachable_resolver(connector.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedQuery(2)));
        assert_eq!(connector.connect_count(), 0);

        let record = record.lock().unwrap();
        assert!(record.writes.is_empty());
        assert_eq!(record.read_closed.len(), 1);
        assert!(record.read_closed[0]
            .as_deref()
            .is_some_and(|e| e.starts_with("malformed DNS query")));
        assert_eq!(record.write_closed, record.read_closed);
    }

    #[tokio::test]
    async fn empty_datagram_set() {
        let (flow, record) = MockFlow::new(Some(Vec::new()));

        let err = relay_flow(flow, unreachable_resolver(MockConnector::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedQuery(0)));
        assert_eq!(record.lock().unwrap().read_closed.len(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_closes_both_sides() {
        let connector = MockConnector::failing(io::ErrorKind::ConnectionRefused);
        let (observer, states) = state_recorder();
        let resolver = Arc::new(
            UpstreamResolver::with_connector(connector, &RelayConfig::default())
                .with_observer(observer),
        );
        let (flow, record) = MockFlow::new(Some(vec![datagram(example_query(7))]));

        let err = relay_flow(flow, resolver).await.unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::ConnectionRefused));

        let record = record.lock().unwrap();
        assert!(record.writes.is_empty());
        assert_eq!(record.read_closed.len(), 1);
        assert!(record.read_closed[0]
            .as_deref()
            .is_some_and(|e| e.starts_with("upstream transport error")));
        assert_eq!(record.write_closed, record.read_closed);
        assert_eq!(
            *states.lock().unwrap(),
            ["establishing", "failed", "cancelled"]
        );
    }

    #[tokio::test]
    async fn open_failure() {
        let (flow, record) = MockFlow::new(Some(vec![datagram(example_query(1))]));
        let flow = flow.failing_open(io::ErrorKind::PermissionDenied);

        let err = relay_flow(flow, unreachable_resolver(MockConnector::default()))
            .await
            .unwrap_err();
        assert!(
            matches!(err, RelayError::Flow(ref e) if e.kind() == io::ErrorKind::PermissionDenied)
        );
        assert_eq!(record.lock().unwrap().write_closed.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_query_is_still_relayed() {
        let (resolver, _) = loopback_resolver().await;
        let (flow, record) = MockFlow::new(Some(vec![datagram(b"not a dns message".to_vec())]));

        relay_flow(flow, resolver).await.expect("relay failed");

        let record = record.lock().unwrap();
        assert_eq!(record.writes[0][0].payload, b"not a dns message");
        assert_eq!(record.read_closed, [None]);
    }

    #[tokio::test]
    async fn dropped_relay_closes_flow() {
        let (flow, record) = MockFlow::new(Some(vec![datagram(example_query(1))]));

        drop(relay_flow(flow, unreachable_resolver(MockConnector::default())));

        let record = record.lock().unwrap();
        assert!(!record.opened);
        assert_eq!(
            record.read_closed,
            [Some("relay was interrupted before completion".to_owned())]
        );
        assert_eq!(record.write_closed, record.read_closed);
    }
}
