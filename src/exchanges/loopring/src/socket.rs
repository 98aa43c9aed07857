use async_trait::async_trait;
use ezsockets::client::ClientCloseMode;
use ezsockets::{ClientConfig, ClientExt, Error, WSError};
use std::time::Duration;
use ti_types::ScraperError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, trace, warn};

use crate::gateway::Connection;

enum SocketEvent {
    Connected,
    Text(String),
    Closed(String),
}

/// Forwards everything the websocket actor sees to the owning [`LoopringConnection`].
struct WebSocketClient {
    events: UnboundedSender<SocketEvent>,
}

impl WebSocketClient {
    fn emit(&self, event: SocketEvent) {
        if self.events.send(event).is_err() {
            trace!("Loopring: Dropping event for discarded connection");
        }
    }
}

#[async_trait]
impl ClientExt for WebSocketClient {
    type Call = ();

    async fn on_text(&mut self, text: String) -> Result<(), Error> {
        trace!("Loopring: Received text: {text}");
        self.emit(SocketEvent::Text(text));
        Ok(())
    }

    async fn on_binary(&mut self, bytes: Vec<u8>) -> Result<(), Error> {
        match String::from_utf8(bytes) {
            Ok(text) => self.emit(SocketEvent::Text(text)),
            Err(_) => warn!("Loopring: Ignoring non utf-8 binary frame"),
        }
        Ok(())
    }

    async fn on_call(&mut self, _: Self::Call) -> Result<(), Error> {
        Ok(())
    }

    async fn on_connect(&mut self) -> Result<(), Error> {
        info!("Loopring: Connected");
        self.emit(SocketEvent::Connected);
        Ok(())
    }

    async fn on_disconnect(&mut self) -> Result<ClientCloseMode, Error> {
        info!("Loopring: Disconnected");
        self.emit(SocketEvent::Closed("disconnected".to_string()));
        // Reconnecting needs a fresh session key, which the session takes care of.
        Ok(ClientCloseMode::Close)
    }

    async fn on_connect_fail(&mut self, error: WSError) -> Result<ClientCloseMode, Error> {
        error!("Loopring: Failed to connect: {error:?}");
        self.emit(SocketEvent::Closed(error.to_string()));
        Ok(ClientCloseMode::Close)
    }
}

pub struct LoopringConnection {
    handle: ezsockets::Client<WebSocketClient>,
    events: UnboundedReceiver<SocketEvent>,
    url: String,
}

/// Opens the websocket and waits until the handshake completes or `timeout` elapses.
pub async fn dial(url: &str, timeout: Duration) -> Result<LoopringConnection, ScraperError> {
    let (sender, mut events) = unbounded_channel();

    let (handle, future) = ezsockets::connect(
        |_| WebSocketClient { events: sender },
        ClientConfig::new(url),
    )
    .await;
    tokio::spawn(future);

    let connected = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Some(SocketEvent::Connected) => return Ok(()),
                Some(SocketEvent::Closed(reason)) => return Err(reason),
                Some(SocketEvent::Text(_)) => continue,
                None => return Err("socket task ended".to_string()),
            }
        }
    })
    .await
    .unwrap_or_else(|_| Err(format!("no handshake within {timeout:?}")));

    let mut connection = LoopringConnection {
        handle,
        events,
        url: url.to_string(),
    };

    match connected {
        Ok(()) => Ok(connection),
        Err(reason) => {
            connection.close().await;
            Err(ScraperError::Connect {
                url: redact(url),
                reason,
            })
        }
    }
}

#[async_trait]
impl Connection for LoopringConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ScraperError> {
        trace!("Loopring: Sending message: {text}");
        self.handle
            .text(text)
            .map(|_| ())
            .map_err(|e| ScraperError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Result<String, ScraperError> {
        loop {
            match self.events.recv().await {
                Some(SocketEvent::Text(text)) => return Ok(text),
                Some(SocketEvent::Connected) => continue,
                Some(SocketEvent::Closed(reason)) => {
                    return Err(ScraperError::Disconnected(reason))
                }
                None => return Err(ScraperError::Disconnected("socket task ended".to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(error) = self.handle.close(None) {
            debug!("Loopring: Socket already gone while closing: {error}");
        }
        self.events.close();
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Strips the query string, which carries the session key.
pub fn redact(url: &str) -> String {
    url.split_once('?')
        .map(|(base, _)| base)
        .unwrap_or(url)
        .to_string()
}
