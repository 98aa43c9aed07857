use crate::backoff::Backoff;
use crate::config::LoopringConfig;
use crate::gateway::{Gateway, LoopringGateway};
use crate::registry::SubscriptionRegistry;
use crate::session::{Command, Session, SharedStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ti_types::{
    trade_channel, Exchange, ExchangePair, PairCache, PairScraper, Scraper, ScraperError,
    TradeChannel,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Streams Loopring trades for any number of pairs over a single websocket.
///
/// Construction never fails. If the first connection cannot be established the error is kept
/// and returned by [`Scraper::error`] and by every later call.
pub struct LoopringScraper<G: Gateway = LoopringGateway> {
    exchange: Exchange,
    gateway: Arc<G>,
    commands: Option<mpsc::UnboundedSender<Command>>,
    status: SharedStatus,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    channel: TradeChannel,
}

impl LoopringScraper {
    /// With `scrape` false the scraper only serves pair discovery and never connects.
    pub async fn new(
        config: LoopringConfig,
        pair_cache: Arc<dyn PairCache>,
        scrape: bool,
    ) -> LoopringScraper {
        let gateway = LoopringGateway::new(&config);
        LoopringScraper::with_gateway(gateway, config, pair_cache, scrape).await
    }
}

impl<G: Gateway> LoopringScraper<G> {
    pub async fn with_gateway(
        gateway: G,
        config: LoopringConfig,
        pair_cache: Arc<dyn PairCache>,
        scrape: bool,
    ) -> LoopringScraper<G> {
        let exchange = Exchange::Loopring;
        let gateway = Arc::new(gateway);
        let (trades, channel) = trade_channel(config.channel_capacity);
        let status = SharedStatus::default();
        let shutdown = CancellationToken::new();

        let mut scraper = LoopringScraper {
            exchange,
            gateway: gateway.clone(),
            commands: None,
            status: status.clone(),
            shutdown: shutdown.clone(),
            task: Mutex::new(None),
            channel,
        };

        if !scrape {
            return scraper;
        }

        let connection = match gateway.connect().await {
            Ok(connection) => connection,
            Err(error) => {
                error!("{exchange}: Failed to start session: {error}");
                status.write().fail(error);
                return scraper;
            }
        };

        let (command_sender, command_receiver) = mpsc::unbounded_channel();
        let session = Session {
            exchange,
            gateway,
            registry: SubscriptionRegistry::default(),
            decimals: config.decimals,
            pair_cache,
            trades,
            commands: command_receiver,
            status,
            shutdown,
            read_timeout: config.read_timeout,
            backoff: Backoff::new(config.backoff),
            max_reconnect_attempts: config.max_reconnect_attempts,
        };

        scraper.commands = Some(command_sender);
        *scraper.task.get_mut() = Some(tokio::spawn(session.run(connection)));
        scraper
    }

    fn ensure_usable(&self) -> Result<(), ScraperError> {
        let status = self.status.read();
        if let Some(error) = &status.error {
            return Err(error.clone());
        }
        if status.closed {
            return Err(ScraperError::Closed(self.exchange));
        }
        Ok(())
    }

    /// The reason the session task is no longer accepting commands.
    fn stopped_error(&self) -> ScraperError {
        self.status
            .read()
            .error
            .clone()
            .unwrap_or(ScraperError::Closed(self.exchange))
    }
}

#[async_trait]
impl<G: Gateway> Scraper for LoopringScraper<G> {
    type PairScraper = LoopringPairScraper;

    fn exchange(&self) -> Exchange {
        self.exchange
    }

    async fn scrape_pair(&self, pair: ExchangePair) -> Result<LoopringPairScraper, ScraperError> {
        self.ensure_usable()?;

        let commands = self
            .commands
            .as_ref()
            .ok_or(ScraperError::IngestionDisabled(self.exchange))?;

        let (reply, response) = oneshot::channel();
        commands
            .send(Command::Subscribe {
                pair: pair.clone(),
                reply,
            })
            .map_err(|_| self.stopped_error())?;
        response.await.map_err(|_| self.stopped_error())??;

        Ok(LoopringPairScraper {
            pair,
            closed: AtomicBool::new(false),
            commands: commands.clone(),
            status: self.status.clone(),
        })
    }

    async fn fetch_available_pairs(&self) -> Result<Vec<ExchangePair>, ScraperError> {
        self.gateway.fetch_available_pairs().await
    }

    fn channel(&self) -> TradeChannel {
        self.channel.clone()
    }

    fn error(&self) -> Option<ScraperError> {
        self.status.read().error.clone()
    }

    async fn close(&self) -> Result<(), ScraperError> {
        {
            let mut status = self.status.write();
            if status.closed {
                return Err(ScraperError::AlreadyClosed(self.exchange));
            }
            status.closed = true;
        }

        info!("{}: Closing", self.exchange);
        self.shutdown.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(error) = task.await {
                error!("{}: Session task panicked: {error}", self.exchange);
            }
        }

        match self.error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<G: Gateway> Drop for LoopringScraper<G> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub struct LoopringPairScraper {
    pair: ExchangePair,
    closed: AtomicBool,
    commands: mpsc::UnboundedSender<Command>,
    status: SharedStatus,
}

#[async_trait]
impl PairScraper for LoopringPairScraper {
    fn pair(&self) -> &ExchangePair {
        &self.pair
    }

    /// Releases this handle. Once no handle for the market is left it is unsubscribed on the
    /// wire and no longer replayed after a reconnect.
    async fn close(&self) -> Result<(), ScraperError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (reply, response) = oneshot::channel();
        let command = Command::Unsubscribe {
            market: self.pair.foreign_name.clone(),
            reply,
        };
        if self.commands.send(command).is_err() {
            // Session already gone, nothing left to unsubscribe from.
            return Ok(());
        }
        response.await.unwrap_or(Ok(()))
    }

    fn error(&self) -> Option<ScraperError> {
        self.status.read().error.clone()
    }
}
