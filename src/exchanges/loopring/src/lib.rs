use serde::Serialize;
use ti_types::ScraperError;

mod backoff;
mod client;
mod config;
mod gateway;
mod messages;
mod normalizer;
mod registry;
mod scraper;
mod session;
mod socket;
#[cfg(test)]
mod test_utils;

pub use config::{default_decimals, BackoffConfig, LoopringConfig};
pub use gateway::{Connection, Gateway, LoopringGateway};
pub use scraper::{LoopringPairScraper, LoopringScraper};

fn serialize_to_json<S: Serialize>(value: &S) -> Result<String, ScraperError> {
    serde_json::to_string(value).map_err(|e| ScraperError::Send(e.to_string()))
}
