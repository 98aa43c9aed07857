use std::sync::Arc;
use ti_exchanges_loopring::{LoopringConfig, LoopringScraper};
use ti_types::{Exchange, PairCache, PairScraper, Scraper, ScraperError, Trade};
use tokio::select;
use tokio::sync::broadcast::{channel, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub struct Subscriber {
    exchanges: Vec<Exchange>,
    settings: SubscriberSettings,
}

#[derive(Clone)]
pub struct SubscriberSettings {
    pub loopring: LoopringConfig,
    /// Markets to subscribe to. `None` subscribes to every market the exchange lists.
    pub pairs: Option<Vec<String>>,
    pub pair_cache: Arc<dyn PairCache>,
}

pub struct SubscriptionManager {
    trades: Receiver<Arc<Trade>>,
    task: JoinHandle<()>,
}

impl Subscriber {
    pub fn new(exchanges: Vec<Exchange>, settings: SubscriberSettings) -> Subscriber {
        Subscriber {
            exchanges,
            settings,
        }
    }

    pub fn run(self, cancellation_token: CancellationToken) -> SubscriptionManager {
        let (sender, receiver) = channel(1024);

        let task = tokio::spawn(self.run_async(sender, cancellation_token));

        SubscriptionManager {
            trades: receiver,
            task,
        }
    }

    async fn run_async(self, sender: Sender<Arc<Trade>>, cancellation_token: CancellationToken) {
        let mut futures = Vec::new();
        for exchange in self.exchanges {
            match exchange {
                Exchange::Loopring => {
                    let scraper = LoopringScraper::new(
                        self.settings.loopring.clone(),
                        self.settings.pair_cache.clone(),
                        true,
                    )
                    .await;
                    futures.push(forward(
                        scraper,
                        self.settings.pairs.clone(),
                        sender.clone(),
                        cancellation_token.clone(),
                    ));
                }
            }
        }

        futures::future::join_all(futures).await;
    }
}

impl SubscriptionManager {
    pub fn subscribe_trades(&self) -> Receiver<Arc<Trade>> {
        self.trades.resubscribe()
    }

    /// Waits for every scraper to be closed, which happens once the cancellation token fires.
    pub async fn wait(self) {
        if let Err(error) = self.task.await {
            error!("Subscriber task failed: {error}");
        }
    }
}

/// Subscribes `scraper` to the selected pairs and republishes its trades until cancelled or
/// until the scraper stops on its own.
pub async fn forward<S: Scraper>(
    scraper: S,
    pairs: Option<Vec<String>>,
    sender: Sender<Arc<Trade>>,
    cancellation_token: CancellationToken,
) {
    let exchange = scraper.exchange();

    match subscribe_pairs(&scraper, pairs.as_deref()).await {
        Ok(handles) => {
            info!("{exchange}: Scraping {} pairs", handles.len());
            let channel = scraper.channel();
            loop {
                select! {
                    _ = cancellation_token.cancelled() => break,
                    next = channel.recv() => match next {
                        Some(trade) => {
                            if sender.send(Arc::new(trade)).is_err() {
                                trace!("{exchange}: No trade subscribers");
                            }
                        }
                        None => {
                            match scraper.error() {
                                Some(error) => error!("{exchange}: Trade stream ended: {error}"),
                                None => warn!("{exchange}: Trade stream ended"),
                            }
                            break;
                        }
                    }
                }
            }
            for handle in handles {
                if let Err(error) = handle.close().await {
                    trace!("{exchange}: Closing {}: {error}", handle.pair().foreign_name);
                }
            }
        }
        Err(error) => error!("{exchange}: Failed to subscribe: {error}"),
    }

    match scraper.close().await {
        Ok(()) => info!("{exchange}: Stopped"),
        Err(error) if error.is_closed() => debug!("{exchange}: Already stopped"),
        Err(error) => warn!("{exchange}: Stopped with error: {error}"),
    }
}

async fn subscribe_pairs<S: Scraper>(
    scraper: &S,
    pairs: Option<&[String]>,
) -> Result<Vec<S::PairScraper>, ScraperError> {
    let available = scraper.fetch_available_pairs().await?;

    let mut handles = Vec::new();
    for pair in available {
        if pairs.is_some_and(|p| !p.contains(&pair.foreign_name)) {
            continue;
        }
        handles.push(scraper.scrape_pair(pair).await?);
    }

    if let Some(pairs) = pairs {
        for missing in pairs
            .iter()
            .filter(|m| !handles.iter().any(|h| &h.pair().foreign_name == *m))
        {
            warn!("{}: Market {missing} is not listed", scraper.exchange());
        }
    }
    Ok(handles)
}
