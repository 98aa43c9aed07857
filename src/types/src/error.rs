use crate::Exchange;
use thiserror::Error;

/// Everything a scraper can report to its callers.
///
/// Cloneable so that one failure can be kept as the sticky session error and handed to every
/// caller that asks for it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScraperError {
    #[error("{0}: already closed")]
    AlreadyClosed(Exchange),
    #[error("{0}: scraper is closed")]
    Closed(Exchange),
    #[error("{0}: ingestion is disabled for this scraper")]
    IngestionDisabled(Exchange),
    #[error("unknown asset {0}")]
    UnknownAsset(String),
    #[error("failed to fetch session key: {0}")]
    Credential(String),
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("connection lost: {0}")]
    Disconnected(String),
    #[error("failed to send message: {0}")]
    Send(String),
    #[error("failed to subscribe to {pair}: {reason}")]
    Subscribe { pair: String, reason: String },
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("unexpected response from {url}: {reason}")]
    Response { url: String, reason: String },
    #[error("gave up reconnecting after {attempts} attempts: {last}")]
    ReconnectExhausted {
        attempts: u32,
        last: Box<ScraperError>,
    },
}

impl ScraperError {
    /// True for conditions caused by calling into a scraper that is no longer usable.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            ScraperError::AlreadyClosed(_) | ScraperError::Closed(_)
        )
    }
}
