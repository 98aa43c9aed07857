use std::time::Duration;
use ti_types::AssetDecimals;

pub const WS_URL: &str = "wss://ws.api3.loopring.io/v3/ws";
pub const KEY_URL: &str = "https://api3.loopring.io/v3/ws/key";
pub const MARKETS_URL: &str = "https://api.loopring.io/api/v2/exchange/markets";

#[derive(Debug, Clone)]
pub struct LoopringConfig {
    pub ws_url: String,
    pub key_url: String,
    pub markets_url: String,
    pub decimals: AssetDecimals,
    /// Applies to every REST request (session key and market listing).
    pub request_timeout: Duration,
    /// How long to wait for the websocket handshake.
    pub connect_timeout: Duration,
    /// A connection that stays silent for this long is considered dead. The exchange pings
    /// every few seconds so this only fires when the link is gone.
    pub read_timeout: Duration,
    pub backoff: BackoffConfig,
    /// Consecutive failed connection attempts tolerated before the session gives up.
    pub max_reconnect_attempts: u32,
    pub channel_capacity: usize,
}

impl Default for LoopringConfig {
    fn default() -> Self {
        LoopringConfig {
            ws_url: WS_URL.to_string(),
            key_url: KEY_URL.to_string(),
            markets_url: MARKETS_URL.to_string(),
            decimals: default_decimals(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            backoff: BackoffConfig::default(),
            max_reconnect_attempts: 10,
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    /// Fraction of each delay added at random, 0.0 disables jitter.
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

pub fn default_decimals() -> AssetDecimals {
    [
        ("ETH", 18),
        ("WETH", 18),
        ("LRC", 18),
        ("USDT", 6),
        ("DAI", 18),
        ("LINK", 18),
        ("KEEP", 18),
        ("USDC", 6),
        ("DXD", 18),
        ("TRB", 18),
        ("AUC", 18),
        ("RPL", 18),
        ("WBTC", 8),
        ("RENBTC", 8),
        ("PAX", 18),
        ("MKR", 18),
        ("BUSD", 18),
        ("SNX", 18),
        ("GNO", 18),
        ("LEND", 18),
        ("REN", 18),
        ("REP", 18),
        ("BNT", 18),
        ("PBTC", 18),
        ("COMP", 18),
        ("PNT", 18),
        ("PNK", 18),
        ("NEST", 18),
        ("BTU", 18),
        ("BZRX", 18),
        ("VBZRX", 18),
        ("GRID", 12),
    ]
    .into_iter()
    .collect()
}
