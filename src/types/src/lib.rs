use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

mod error;

pub use error::ScraperError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Exchange {
    Loopring,
}

impl Exchange {
    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Loopring => "Loopring",
        }
    }
}

impl Display for Exchange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The contract every exchange integration implements.
///
/// A scraper owns a single streaming connection to its exchange. Pairs are added with
/// [`Scraper::scrape_pair`] and every trade for every pair is delivered through the one shared
/// [`TradeChannel`]. Once [`Scraper::error`] returns `Some` the scraper is finished for good.
#[async_trait]
pub trait Scraper: Send + Sync {
    type PairScraper: PairScraper;

    fn exchange(&self) -> Exchange;

    async fn scrape_pair(&self, pair: ExchangePair) -> Result<Self::PairScraper, ScraperError>;

    async fn fetch_available_pairs(&self) -> Result<Vec<ExchangePair>, ScraperError>;

    fn channel(&self) -> TradeChannel;

    fn error(&self) -> Option<ScraperError>;

    /// Shuts the scraper down. Only the first call can succeed, later calls return
    /// [`ScraperError::AlreadyClosed`].
    async fn close(&self) -> Result<(), ScraperError>;
}

/// Handle bound to a single pair of a running [`Scraper`].
#[async_trait]
pub trait PairScraper: Send + Sync {
    fn pair(&self) -> &ExchangePair;

    /// Stops receiving trades for this pair. Idempotent.
    async fn close(&self) -> Result<(), ScraperError>;

    fn error(&self) -> Option<ScraperError>;
}

/// Lookup of verification data for exchange pairs. Called once per received frame so
/// implementations must not block.
pub trait PairCache: Send + Sync {
    fn get_exchange_pair(&self, exchange: Exchange, foreign_name: &str) -> Option<PairIdentity>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub exchange: Exchange,
    /// Base asset symbol.
    pub symbol: String,
    /// Exchange pair name, eg. "LRC-ETH".
    pub pair: String,
    /// Quote asset per unit of base asset.
    pub price: f64,
    /// Base asset amount, negative for sells.
    pub volume: f64,
    /// Time reported by the exchange.
    pub timestamp_ms: u64,
    pub foreign_trade_id: String,
    pub verified_pair: bool,
    pub base_token: Asset,
    pub quote_token: Asset,
}

impl Trade {
    pub fn is_sell(&self) -> bool {
        self.volume < 0.0
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ExchangePair {
    pub exchange: Exchange,
    /// Name used on the wire, "BASE-QUOTE".
    pub foreign_name: String,
    pub symbol: String,
    pub quote_symbol: String,
}

impl ExchangePair {
    pub fn from_market(exchange: Exchange, market: &str) -> Option<ExchangePair> {
        let (base, quote) = market.split_once('-')?;
        if base.is_empty() || quote.is_empty() || quote.contains('-') {
            return None;
        }

        Some(ExchangePair {
            exchange,
            foreign_name: market.to_string(),
            symbol: base.to_string(),
            quote_symbol: quote.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub address: String,
    pub blockchain: String,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PairIdentity {
    pub verified: bool,
    pub base_token: Asset,
    pub quote_token: Asset,
}

#[derive(Default)]
pub struct InMemoryPairCache {
    pairs: HashMap<(Exchange, String), PairIdentity>,
}

impl InMemoryPairCache {
    pub fn insert(&mut self, exchange: Exchange, foreign_name: &str, identity: PairIdentity) {
        self.pairs
            .insert((exchange, foreign_name.to_string()), identity);
    }
}

impl PairCache for InMemoryPairCache {
    fn get_exchange_pair(&self, exchange: Exchange, foreign_name: &str) -> Option<PairIdentity> {
        self.pairs
            .get(&(exchange, foreign_name.to_string()))
            .cloned()
    }
}

/// Symbol to decimal exponent, used to turn raw integer amounts into whole units.
#[derive(Debug, Clone, Default)]
pub struct AssetDecimals {
    decimals: HashMap<String, u32>,
}

impl AssetDecimals {
    pub fn insert(&mut self, symbol: &str, decimals: u32) {
        self.decimals.insert(symbol.to_string(), decimals);
    }

    pub fn get(&self, symbol: &str) -> Option<u32> {
        self.decimals.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.decimals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decimals.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for AssetDecimals {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        AssetDecimals {
            decimals: iter.into_iter().map(|(s, d)| (s.into(), d)).collect(),
        }
    }
}

/// Receiving side of a scraper's output. Clones share the same underlying queue, so each
/// trade is delivered to exactly one of them.
#[derive(Clone)]
pub struct TradeChannel {
    receiver: Arc<Mutex<mpsc::Receiver<Trade>>>,
}

impl TradeChannel {
    /// Returns `None` once the producing scraper has stopped.
    pub async fn recv(&self) -> Option<Trade> {
        self.receiver.lock().await.recv().await
    }
}

pub fn trade_channel(capacity: usize) -> (mpsc::Sender<Trade>, TradeChannel) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        sender,
        TradeChannel {
            receiver: Arc::new(Mutex::new(receiver)),
        },
    )
}
