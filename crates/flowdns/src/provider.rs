use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::connection::{Connector, UdpConnector};
use crate::flow::{NewFlow, UdpFlow};
use crate::relay::relay_flow;
use crate::{RelayError, UpstreamResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    UserRequested,
    ConfigurationChanged,
    Sleep,
    Other,
}

/// Lifecycle hooks and flow admission, invoked by the host
pub trait ProxyProvider {
    type Flow: UdpFlow;

    fn start_proxy(&self) -> anyhow::Result<()>;
    fn stop_proxy(&self, reason: StopReason) -> impl Future<Output = ()> + Send;
    fn sleep(&self);
    fn wake(&self);

    /// Returns `false` when the flow is declined and stays with the host
    fn handle_new_flow(&self, flow: NewFlow<Self::Flow>) -> bool;
}

/// Relays every admitted UDP flow in its own task.
///
/// Admission spawns onto the current tokio runtime.
pub struct DnsProxyProvider<F: UdpFlow, C: Connector = UdpConnector> {
    resolver: Arc<UpstreamResolver<C>>,
    relays: Mutex<JoinSet<Result<(), RelayError>>>,
    next_flow_id: AtomicU64,
    running: AtomicBool,
    _flow: PhantomData<fn(F)>,
}

impl<F: UdpFlow, C: Connector> DnsProxyProvider<F, C> {
    pub fn new(resolver: UpstreamResolver<C>) -> Self {
        DnsProxyProvider {
            resolver: Arc::new(resolver),
            relays: Default::default(),
            next_flow_id: AtomicU64::new(0),
            running: AtomicBool::new(false),
            _flow: PhantomData,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of relays that haven't been reaped yet
    pub fn in_flight(&self) -> usize {
        let mut relays = self.relays.lock().unwrap_or_else(PoisonError::into_inner);
        reap_finished(&mut relays);
        relays.len()
    }
}

fn reap_finished(relays: &mut JoinSet<Result<(), RelayError>>) {
    while let Some(result) = relays.try_join_next() {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("relay task panicked: {}", e);
            }
        }
    }
}

impl<F: UdpFlow, C: Connector> ProxyProvider for DnsProxyProvider<F, C> {
    type Flow = F;

    fn start_proxy(&self) -> anyhow::Result<()> {
        self.running.store(true, Ordering::Release);
        tracing::info!(upstream = %self.resolver.endpoint(), "DNS proxy started");
        Ok(())
    }

    async fn stop_proxy(&self, reason: StopReason) {
        self.running.store(false, Ordering::Release);

        let mut relays = std::mem::take(
            &mut *self.relays.lock().unwrap_or_else(PoisonError::into_inner),
        );
        tracing::info!(?reason, in_flight = relays.len(), "DNS proxy stopping");
        relays.shutdown().await;
    }

    fn sleep(&self) {
        tracing::debug!("DNS proxy going to sleep");
    }

    fn wake(&self) {
        tracing::debug!("DNS proxy woke up");
    }

    fn handle_new_flow(&self, flow: NewFlow<F>) -> bool {
        let Some(hostname) = flow.remote_hostname().map(str::to_owned) else {
            tracing::warn!("Declining {} flow without a remote hostname", flow.protocol());
            return false;
        };
        let NewFlow::Udp(flow) = flow else {
            tracing::warn!(%hostname, "Declining non-UDP flow");
            return false;
        };
        if !self.is_running() {
            tracing::warn!(%hostname, "Declining flow, the proxy isn't running");
            return false;
        }

        let id = self.next_flow_id.fetch_add(1, Ordering::Relaxed);
        let relay = relay_flow(flow, self.resolver.clone());

        let mut relays = self.relays.lock().unwrap_or_else(PoisonError::into_inner);
        reap_finished(&mut relays);
        relays.spawn(relay.instrument(tracing::info_span!("flow", id, host = %hostname)));

        true
    }
}
