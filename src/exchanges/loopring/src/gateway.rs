use crate::client::LoopringClient;
use crate::config::LoopringConfig;
use crate::socket::{self, LoopringConnection};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use ti_types::{ExchangePair, ScraperError};
use tracing::info;

/// Everything the session needs from the exchange: fresh streaming connections and the
/// market listing.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    type Connection: Connection;

    /// Fetches a one-shot session key and dials the stream with it.
    async fn connect(&self) -> Result<Self::Connection, ScraperError>;

    async fn fetch_available_pairs(&self) -> Result<Vec<ExchangePair>, ScraperError>;
}

#[async_trait]
pub trait Connection: Send + 'static {
    async fn send_text(&mut self, text: String) -> Result<(), ScraperError>;

    /// Waits for the next text frame. An error means the connection can no longer be used.
    async fn next_frame(&mut self) -> Result<String, ScraperError>;

    async fn close(&mut self);

    fn url(&self) -> &str;
}

pub struct LoopringGateway {
    client: LoopringClient,
    ws_url: String,
    connect_timeout: Duration,
}

impl LoopringGateway {
    pub fn new(config: &LoopringConfig) -> LoopringGateway {
        LoopringGateway {
            client: LoopringClient::new(config),
            ws_url: config.ws_url.clone(),
            connect_timeout: config.connect_timeout,
        }
    }
}

#[async_trait]
impl Gateway for LoopringGateway {
    type Connection = LoopringConnection;

    async fn connect(&self) -> Result<LoopringConnection, ScraperError> {
        let key = self.client.fetch_ws_key().await?;

        let url = Url::parse_with_params(&self.ws_url, &[("wsApiKey", key.as_str())]).map_err(
            |e| ScraperError::Connect {
                url: self.ws_url.clone(),
                reason: e.to_string(),
            },
        )?;

        info!("Loopring: Connecting to {}", self.ws_url);

        socket::dial(url.as_str(), self.connect_timeout).await
    }

    async fn fetch_available_pairs(&self) -> Result<Vec<ExchangePair>, ScraperError> {
        self.client.fetch_markets().await
    }
}
