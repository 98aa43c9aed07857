use serde::{Deserialize, Serialize};

pub const TRADE_TOPIC: &str = "trade";
pub const PONG: &str = "pong";
const PING: &str = "ping";
// Not used for correlation, the exchange treats repeated subscriptions as no-ops.
const SEQUENCE: u64 = 1000;
const SNAPSHOT_COUNT: u32 = 20;

/// A frame received from the exchange, classified.
#[derive(Debug)]
pub enum Inbound {
    Data(TradeEnvelope),
    Keepalive,
    Ack(Ack),
    Malformed(String),
}

pub fn classify(text: &str) -> Inbound {
    if text.trim() == PING {
        return Inbound::Keepalive;
    }

    match serde_json::from_str::<Frame>(text) {
        Ok(Frame::Data(envelope)) => Inbound::Data(envelope),
        Ok(Frame::Ack(ack)) => Inbound::Ack(ack),
        Err(error) => Inbound::Malformed(error.to_string()),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Frame {
    Data(TradeEnvelope),
    Ack(Ack),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Op {
    Sub,
    UnSub,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Request {
    pub op: Op,
    pub sequence: u64,
    pub topics: Vec<Topic>,
}

impl Request {
    pub fn subscribe(market: &str) -> Request {
        Request::new(Op::Sub, market)
    }

    pub fn unsubscribe(market: &str) -> Request {
        Request::new(Op::UnSub, market)
    }

    fn new(op: Op, market: &str) -> Request {
        Request {
            op,
            sequence: SEQUENCE,
            topics: vec![Topic {
                topic: TRADE_TOPIC.to_string(),
                market: market.to_string(),
                count: SNAPSHOT_COUNT,
                snapshot: true,
            }],
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Topic {
    pub topic: String,
    pub market: String,
    pub count: u32,
    pub snapshot: bool,
}

/// Trade push. Each row is `[timestamp_ms, trade_id, side, raw_volume, price, fee]`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TradeEnvelope {
    pub topic: TopicRef,
    #[serde(default)]
    pub ts: i64,
    pub data: Vec<Vec<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TopicRef {
    pub topic: String,
    pub market: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Ack {
    pub op: String,
    #[serde(default)]
    pub sequence: u64,
    pub result: AckResult,
}

impl Ack {
    pub fn is_ok(&self) -> bool {
        self.result.status.eq_ignore_ascii_case("ok")
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AckResult {
    pub status: String,
    #[serde(default)]
    pub error: Option<AckError>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AckError {
    pub code: i64,
    pub message: String,
}
