use crate::config::{BackoffConfig, LoopringConfig};
use crate::gateway::{Connection, Gateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use ti_types::{Exchange, ExchangePair, ScraperError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

pub fn test_config() -> LoopringConfig {
    LoopringConfig {
        decimals: [("A", 0), ("C", 0), ("ETH", 18), ("LRC", 18), ("USDT", 6)]
            .into_iter()
            .collect(),
        read_timeout: Duration::from_secs(30),
        backoff: BackoffConfig {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(20),
            jitter: 0.0,
        },
        max_reconnect_attempts: 3,
        channel_capacity: 16,
        ..Default::default()
    }
}

pub fn pair(market: &str) -> ExchangePair {
    ExchangePair::from_market(Exchange::Loopring, market).unwrap()
}

/// The exchange end of one mock connection.
pub struct MockPeer {
    pub inbound: UnboundedSender<String>,
    pub outbound: UnboundedReceiver<String>,
}

impl MockPeer {
    pub fn push(&self, text: &str) {
        self.inbound.send(text.to_string()).unwrap();
    }

    pub async fn next_sent(&mut self) -> String {
        timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for a message")
            .expect("connection dropped")
    }

    pub async fn next_request(&mut self) -> serde_json::Value {
        serde_json::from_str(&self.next_sent().await).unwrap()
    }

    pub fn nothing_sent(&mut self) -> bool {
        self.outbound.try_recv().is_err()
    }
}

pub struct MockConnection {
    inbound: UnboundedReceiver<String>,
    outbound: UnboundedSender<String>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ScraperError> {
        self.outbound
            .send(text)
            .map_err(|_| ScraperError::Send("peer gone".to_string()))
    }

    async fn next_frame(&mut self) -> Result<String, ScraperError> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| ScraperError::Disconnected("peer gone".to_string()))
    }

    async fn close(&mut self) {
        self.inbound.close();
    }

    fn url(&self) -> &str {
        "mock://loopring"
    }
}

#[derive(Default)]
struct MockState {
    connects: AtomicUsize,
    failures: Mutex<VecDeque<ScraperError>>,
}

/// Gateway whose connections are driven by the test through [`MockPeer`]s, one per successful
/// connect, handed out in order.
#[derive(Clone)]
pub struct MockGateway {
    state: Arc<MockState>,
    peers: UnboundedSender<MockPeer>,
}

impl MockGateway {
    pub fn new() -> (MockGateway, MockPeers) {
        let (peers, receiver) = unbounded_channel();
        (
            MockGateway {
                state: Arc::default(),
                peers,
            },
            MockPeers { receiver },
        )
    }

    /// Makes the next `count` connects fail with `error`.
    pub fn fail_next(&self, count: usize, error: ScraperError) {
        let mut failures = self.state.failures.lock();
        for _ in 0..count {
            failures.push_back(error.clone());
        }
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for MockGateway {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, ScraperError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.state.failures.lock().pop_front() {
            return Err(error);
        }

        let (inbound_sender, inbound) = unbounded_channel();
        let (outbound, outbound_receiver) = unbounded_channel();
        let _ = self.peers.send(MockPeer {
            inbound: inbound_sender,
            outbound: outbound_receiver,
        });

        Ok(MockConnection { inbound, outbound })
    }

    async fn fetch_available_pairs(&self) -> Result<Vec<ExchangePair>, ScraperError> {
        Ok(vec![pair("LRC-ETH"), pair("LRC-USDT")])
    }
}

pub struct MockPeers {
    receiver: UnboundedReceiver<MockPeer>,
}

impl MockPeers {
    pub async fn next(&mut self) -> MockPeer {
        timeout(WAIT, self.receiver.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("gateway dropped")
    }

    pub fn none_pending(&mut self) -> bool {
        self.receiver.try_recv().is_err()
    }
}
