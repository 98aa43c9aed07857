use std::io;
use std::sync::Arc;
use ti_subscriber::{Subscriber, SubscriberSettings};
use ti_types::{Exchange, InMemoryPairCache};
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod config;

use config::AppConfig;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_writer(io::stdout).init();

    info!("Service started");

    abort_on_panic();

    let config = AppConfig::from_env();
    let shutdown = CancellationToken::new();
    let subscriber = Subscriber::new(
        vec![Exchange::Loopring],
        SubscriberSettings {
            loopring: config.loopring,
            pairs: config.pairs,
            pair_cache: Arc::new(InMemoryPairCache::default()),
        },
    );

    let manager = subscriber.run(shutdown.clone());
    let mut trades = manager.subscribe_trades();

    loop {
        select! {
            next = trades.recv() => match next {
                Ok(trade) => info!(
                    "{} {} {} {} @ {} ({})",
                    trade.exchange,
                    trade.pair,
                    if trade.is_sell() { "sell" } else { "buy" },
                    trade.volume.abs(),
                    trade.price,
                    trade.timestamp_ms
                ),
                Err(RecvError::Lagged(count)) => warn!("Skipped {count} trades"),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    error!("Failed to listen for ctrl-c: {error}");
                }
                break;
            }
        }
    }

    info!("Service stopping");
    shutdown.cancel();
    drop(trades);
    manager.wait().await;
    info!("Service stopped");
}

pub fn abort_on_panic() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        std::process::abort();
    }));
}
