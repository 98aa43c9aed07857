use crate::backoff::Backoff;
use crate::gateway::{Connection, Gateway};
use crate::messages::{classify, Ack, Inbound, Request, TradeEnvelope, PONG, TRADE_TOPIC};
use crate::normalizer::normalize;
use crate::registry::SubscriptionRegistry;
use crate::serialize_to_json;
use crate::socket::redact;
use parking_lot::RwLock;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use ti_types::{AssetDecimals, Exchange, ExchangePair, PairCache, ScraperError, Trade};
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

pub(crate) type Reply = oneshot::Sender<Result<(), ScraperError>>;

/// Requests from callers, executed by the session task.
pub(crate) enum Command {
    Subscribe { pair: ExchangePair, reply: Reply },
    Unsubscribe { market: String, reply: Reply },
}

#[derive(Default)]
pub(crate) struct SessionStatus {
    pub error: Option<ScraperError>,
    pub closed: bool,
}

impl SessionStatus {
    /// Keeps the first error, later ones are only logged.
    pub fn fail(&mut self, error: ScraperError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

pub(crate) type SharedStatus = Arc<RwLock<SessionStatus>>;

type Flow = ControlFlow<()>;

/// The receive loop. Owns the connection, the subscription registry and the sending side of
/// the trade channel; everything else talks to it through [`Command`]s.
pub(crate) struct Session<G: Gateway> {
    pub exchange: Exchange,
    pub gateway: Arc<G>,
    pub registry: SubscriptionRegistry,
    pub decimals: AssetDecimals,
    pub pair_cache: Arc<dyn PairCache>,
    pub trades: mpsc::Sender<Trade>,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub status: SharedStatus,
    pub shutdown: CancellationToken,
    pub read_timeout: Duration,
    pub backoff: Backoff,
    pub max_reconnect_attempts: u32,
}

impl<G: Gateway> Session<G> {
    pub async fn run(mut self, mut connection: G::Connection) {
        info!("{}: Session started", self.exchange);

        let result = self.run_loop(&mut connection).await;
        connection.close().await;

        match result {
            Ok(()) => info!("{}: Session stopped", self.exchange),
            Err(error) => {
                error!("{}: Session failed: {error}", self.exchange);
                self.fail(error);
            }
        }
    }

    async fn run_loop(&mut self, connection: &mut G::Connection) -> Result<(), ScraperError> {
        loop {
            let flow = select! {
                biased;
                _ = self.shutdown.cancelled() => Flow::Break(()),
                Some(command) = self.commands.recv() => {
                    self.handle_command(command, connection).await?
                }
                frame = timeout(self.read_timeout, connection.next_frame()) => match frame {
                    Ok(Ok(text)) => self.handle_frame(&text, connection).await?,
                    Ok(Err(error)) => {
                        warn!("{}: {error}, reconnecting", self.exchange);
                        self.reconnect(connection).await?
                    }
                    Err(_) => {
                        warn!(
                            "{}: Nothing received for {:?}, reconnecting",
                            self.exchange, self.read_timeout
                        );
                        self.reconnect(connection).await?
                    }
                },
            };

            if flow.is_break() {
                return Ok(());
            }
        }
    }

    async fn handle_command(
        &mut self,
        command: Command,
        connection: &mut G::Connection,
    ) -> Result<Flow, ScraperError> {
        match command {
            Command::Subscribe { pair, reply } => {
                let market = pair.foreign_name.clone();
                if self.registry.contains(&market) {
                    debug!("{}: Already subscribed to {market}", self.exchange);
                    self.registry.insert(pair);
                    let _ = reply.send(Ok(()));
                    return Ok(Flow::Continue(()));
                }

                if let Err(error) = send_request(connection, &Request::subscribe(&market)).await {
                    let error = ScraperError::Subscribe {
                        pair: market,
                        reason: error.to_string(),
                    };
                    self.fail(error.clone());
                    let _ = reply.send(Err(error.clone()));
                    return Err(error);
                }

                info!("{}: Subscribed to {market}", self.exchange);
                self.registry.insert(pair);
                let _ = reply.send(Ok(()));
            }
            Command::Unsubscribe { market, reply } => {
                let mut result = Ok(());
                // Other handles for the same market keep it subscribed.
                if self.registry.remove(&market).is_some() {
                    info!("{}: Unsubscribing from {market}", self.exchange);
                    result = send_request(connection, &Request::unsubscribe(&market)).await;
                    if let Err(error) = &result {
                        // The market is gone from the registry either way, so it will not come
                        // back after the next reconnect.
                        warn!("{}: Failed to unsubscribe from {market}: {error}", self.exchange);
                    }
                }
                let _ = reply.send(result);
            }
        }
        Ok(Flow::Continue(()))
    }

    async fn handle_frame(
        &mut self,
        text: &str,
        connection: &mut G::Connection,
    ) -> Result<Flow, ScraperError> {
        match classify(text) {
            Inbound::Data(envelope) => Ok(self.publish(&envelope).await),
            Inbound::Keepalive => {
                if let Err(error) = connection.send_text(PONG.to_string()).await {
                    warn!("{}: Failed to answer ping: {error}", self.exchange);
                    return self.reconnect(connection).await;
                }
                Ok(Flow::Continue(()))
            }
            Inbound::Ack(ack) => {
                self.log_ack(&ack);
                Ok(Flow::Continue(()))
            }
            Inbound::Malformed(reason) => {
                warn!("{}: Undecodable frame ({reason}), reconnecting", self.exchange);
                self.reconnect(connection).await
            }
        }
    }

    async fn publish(&mut self, envelope: &TradeEnvelope) -> Flow {
        let market = envelope.topic.market.as_str();
        if envelope.topic.topic != TRADE_TOPIC {
            debug!(
                "{}: Ignoring '{}' push for {market}",
                self.exchange, envelope.topic.topic
            );
            return Flow::Continue(());
        }
        trace!("{}: Trade push for {market} at {}", self.exchange, envelope.ts);

        let identity = self
            .pair_cache
            .get_exchange_pair(self.exchange, market)
            .unwrap_or_else(|| {
                debug!("{}: No pair cache entry for {market}", self.exchange);
                Default::default()
            });

        let trades = match normalize(self.exchange, envelope, &self.decimals, &identity) {
            Ok(trades) => trades,
            Err(error) => {
                warn!("{}: Dropping trades for {market}: {error}", self.exchange);
                return Flow::Continue(());
            }
        };

        if trades.is_empty() {
            debug!("{}: No data received for {market}", self.exchange);
            return Flow::Continue(());
        }

        self.backoff.reset();

        for trade in trades {
            trace!("{}: Received trade: {trade:?}", self.exchange);
            select! {
                _ = self.shutdown.cancelled() => return Flow::Break(()),
                sent = self.trades.send(trade) => {
                    if sent.is_err() {
                        debug!("{}: Trade channel closed", self.exchange);
                        return Flow::Break(());
                    }
                }
            }
        }
        Flow::Continue(())
    }

    fn log_ack(&self, ack: &Ack) {
        if ack.is_ok() {
            debug!(
                "{}: '{}' #{} acknowledged",
                self.exchange, ack.op, ack.sequence
            );
        } else if let Some(error) = &ack.result.error {
            warn!(
                "{}: '{}' rejected with {}: {}",
                self.exchange, ack.op, error.code, error.message
            );
        } else {
            warn!(
                "{}: '{}' rejected with status {}",
                self.exchange, ack.op, ack.result.status
            );
        }
    }

    /// Replaces the connection with a new one and replays every registered subscription on it.
    async fn reconnect(&mut self, connection: &mut G::Connection) -> Result<Flow, ScraperError> {
        info!("{}: Reconnecting", self.exchange);
        connection.close().await;

        let max_attempts = self.max_reconnect_attempts.max(1);
        let mut failures = 0;
        let replacement = loop {
            let delay = self.backoff.next_delay();
            if !delay.is_zero() {
                debug!("{}: Waiting {delay:?} before reconnecting", self.exchange);
                select! {
                    _ = self.shutdown.cancelled() => return Ok(Flow::Break(())),
                    _ = sleep(delay) => {}
                }
            }

            let attempt = select! {
                _ = self.shutdown.cancelled() => return Ok(Flow::Break(())),
                attempt = self.gateway.connect() => attempt,
            };

            match attempt {
                Ok(replacement) => break replacement,
                Err(error) => {
                    failures += 1;
                    if failures >= max_attempts {
                        return Err(ScraperError::ReconnectExhausted {
                            attempts: failures,
                            last: Box::new(error),
                        });
                    }
                    warn!(
                        "{}: Reconnect attempt {failures} of {max_attempts} failed: {error}",
                        self.exchange
                    );
                }
            }
        };

        *connection = replacement;
        info!(
            "{}: Reconnected to {}",
            self.exchange,
            redact(connection.url())
        );
        self.resubscribe_all(connection).await?;
        Ok(Flow::Continue(()))
    }

    async fn resubscribe_all(&mut self, connection: &mut G::Connection) -> Result<(), ScraperError> {
        info!(
            "{}: Subscribing to {} pairs again",
            self.exchange,
            self.registry.len()
        );

        for market in self.registry.markets() {
            send_request(connection, &Request::subscribe(market))
                .await
                .map_err(|error| ScraperError::Subscribe {
                    pair: market.to_string(),
                    reason: error.to_string(),
                })?;
        }
        Ok(())
    }

    fn fail(&self, error: ScraperError) {
        self.status.write().fail(error);
    }
}

async fn send_request<C: Connection>(connection: &mut C, request: &Request) -> Result<(), ScraperError> {
    let json = serialize_to_json(request)?;
    connection.send_text(json).await
}
