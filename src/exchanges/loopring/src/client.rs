use crate::config::LoopringConfig;
use reqwest::Client;
use serde::Deserialize;
use ti_types::{Exchange, ExchangePair, ScraperError};
use tracing::{debug, trace, warn};

/// REST side of the exchange: session keys for the websocket and market metadata.
pub struct LoopringClient {
    key_url: String,
    markets_url: String,
    client: Client,
}

impl LoopringClient {
    pub fn new(config: &LoopringConfig) -> LoopringClient {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|error| {
                warn!("Loopring: Failed to build http client with timeout, using defaults: {error}");
                Client::new()
            });

        LoopringClient {
            key_url: config.key_url.clone(),
            markets_url: config.markets_url.clone(),
            client,
        }
    }

    pub async fn fetch_ws_key(&self) -> Result<String, ScraperError> {
        let content = self
            .get_request(&self.key_url)
            .await
            .map_err(|e| ScraperError::Credential(e.to_string()))?;

        parse_key(&content).map_err(ScraperError::Credential)
    }

    pub async fn fetch_markets(&self) -> Result<Vec<ExchangePair>, ScraperError> {
        let content = self.get_request(&self.markets_url).await?;

        parse_markets(&content).map_err(|reason| ScraperError::Response {
            url: self.markets_url.clone(),
            reason,
        })
    }

    async fn get_request(&self, url: &str) -> Result<String, ScraperError> {
        let request_error = |e: reqwest::Error| ScraperError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_error)?;

        debug!("Loopring: Response from {url}: {}", response.status());

        let content = response.text().await.map_err(request_error)?;

        trace!("Loopring: Response content: {content}");

        Ok(content)
    }
}

fn parse_key(content: &str) -> Result<String, String> {
    let response: KeyResponse = serde_json::from_str(content).map_err(|e| e.to_string())?;

    if response.key.is_empty() {
        Err("empty key in response".to_string())
    } else {
        Ok(response.key)
    }
}

fn parse_markets(content: &str) -> Result<Vec<ExchangePair>, String> {
    let response: MarketsResponse = serde_json::from_str(content).map_err(|e| e.to_string())?;

    if let Some(info) = response.result_info.filter(|i| i.code != 0) {
        return Err(format!("error {}: {}", info.code, info.message));
    }

    let mut pairs = Vec::with_capacity(response.data.len());
    for market in response.data {
        if !market.enabled {
            debug!("Loopring: Skipping disabled market {}", market.market);
            continue;
        }
        match ExchangePair::from_market(Exchange::Loopring, &market.market) {
            Some(pair) => pairs.push(pair),
            None => warn!("Loopring: Skipping malformed market name {}", market.market),
        }
    }
    Ok(pairs)
}

#[derive(Deserialize)]
struct KeyResponse {
    key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketsResponse {
    #[serde(default)]
    result_info: Option<ResultInfo>,
    #[serde(default)]
    data: Vec<Market>,
}

#[derive(Deserialize)]
struct ResultInfo {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Market {
    market: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}
