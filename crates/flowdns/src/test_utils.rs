use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flowdns_lib::{DnsMessage, Question, ResourceData, ResourceRecord};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::connection::{ConnectionState, Connector, StateObserver, UdpConnector};
use crate::flow::{Datagram, UdpFlow};
use crate::{RelayError, MAX_DATAGRAM_SIZE};

pub const EXAMPLE_COM_ADDR: Ipv4Addr = Ipv4Addr::new(93, 184, 215, 14);

pub fn example_query(id: u16) -> Vec<u8> {
    DnsMessage::query(id, Question::new("example.com", 1, None))
        .to_bytes()
        .expect("query should encode")
}

/// Answers every question with an A record, anything that isn't DNS is echoed back
fn reply_to(query: &[u8]) -> Vec<u8> {
    let Ok(mut message) = flowdns_lib::parse(query) else {
        return query.to_vec();
    };

    message.header.is_response = true;
    message.header.recursion_available = true;
    message.answers = message
        .questions
        .iter()
        .map(|question| {
            ResourceRecord::new(
                question.qname.clone(),
                ResourceData::A {
                    address: EXAMPLE_COM_ADDR,
                },
                Some(300),
                None,
            )
        })
        .collect();
    message.to_bytes().expect("reply should encode")
}

async fn spawn_responder(
    reply: impl Fn(&[u8]) -> Vec<u8> + Send + 'static,
) -> (SocketAddr, JoinHandle<()>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&reply(&buf[..len]), from).await;
        }
    });

    (addr, handle)
}

/// Loopback upstream resolver
pub async fn spawn_upstream() -> (SocketAddr, JoinHandle<()>) {
    spawn_responder(reply_to).await
}

/// Upstream that answers with empty datagrams
pub async fn spawn_empty_upstream() -> (SocketAddr, JoinHandle<()>) {
    spawn_responder(|_| Vec::new()).await
}

/// Bound socket that never reads, keep it alive for the duration of the test
pub async fn spawn_silent_upstream() -> (SocketAddr, UdpSocket) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    (socket.local_addr().unwrap(), socket)
}

pub fn state_recorder() -> (StateObserver, Arc<Mutex<Vec<&'static str>>>) {
    let states = Arc::new(Mutex::new(Vec::new()));
    let observer: StateObserver = Arc::new({
        let states = states.clone();
        move |_: SocketAddr, state: &ConnectionState| states.lock().unwrap().push(state.name())
    });
    (observer, states)
}

#[derive(Clone, Default)]
pub struct MockConnector {
    failure: Option<io::ErrorKind>,
    stall: bool,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn failing(kind: io::ErrorKind) -> Self {
        MockConnector {
            failure: Some(kind),
            ..Default::default()
        }
    }

    /// Never becomes ready
    pub fn stalled() -> Self {
        MockConnector {
            stall: true,
            ..Default::default()
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Transport = UdpSocket;

    async fn connect(&self, endpoint: SocketAddr) -> io::Result<UdpSocket> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if let Some(kind) = self.failure {
            return Err(io::Error::new(kind, "mock connect failure"));
        }

        UdpConnector.connect(endpoint).await
    }
}

#[derive(Debug, Default)]
pub struct FlowRecord {
    pub opened: bool,
    pub writes: Vec<Vec<Datagram>>,
    /// Error message of every close, `None` for a clean close
    pub read_closed: Vec<Option<String>>,
    pub write_closed: Vec<Option<String>>,
}

pub struct MockFlow {
    hostname: Option<String>,
    datagrams: Option<Vec<Datagram>>,
    open_failure: Option<io::ErrorKind>,
    record: Arc<Mutex<FlowRecord>>,
}

impl MockFlow {
    pub fn new(datagrams: Option<Vec<Datagram>>) -> (Self, Arc<Mutex<FlowRecord>>) {
        let record = Arc::new(Mutex::new(FlowRecord::default()));
        let flow = MockFlow {
            hostname: Some("dns.google".to_owned()),
            datagrams,
            open_failure: None,
            record: record.clone(),
        };
        (flow, record)
    }

    pub fn failing_open(mut self, kind: io::ErrorKind) -> Self {
        self.open_failure = Some(kind);
        self
    }

    pub fn without_hostname(mut self) -> Self {
        self.hostname = None;
        self
    }
}

impl UdpFlow for MockFlow {
    fn remote_hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    async fn open(&mut self) -> io::Result<()> {
        if let Some(kind) = self.open_failure {
            return Err(kind.into());
        }
        self.record.lock().unwrap().opened = true;
        Ok(())
    }

    async fn read_datagrams(&mut self) -> io::Result<Option<Vec<Datagram>>> {
        Ok(self.datagrams.take())
    }

    async fn write_datagrams(&mut self, datagrams: Vec<Datagram>) -> io::Result<()> {
        self.record.lock().unwrap().writes.push(datagrams);
        Ok(())
    }

    fn close_read(&mut self, error: Option<&RelayError>) {
        self.record
            .lock()
            .unwrap()
            .read_closed
            .push(error.map(ToString::to_string));
    }

    fn close_write(&mut self, error: Option<&RelayError>) {
        self.record
            .lock()
            .unwrap()
            .write_closed
            .push(error.map(ToString::to_string));
    }
}
