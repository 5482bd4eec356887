//! Real-time transport session
//!
//! Owns the single WebSocket connection to the pub/sub server, performs the
//! connect handshake, (re)subscribes registered channels and dispatches
//! publications to per-channel handlers in receipt order.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use monitor_core::{FeedError, FeedResult, MonitorConfig, ReconnectConfig};

use crate::protocol::{self, Command, ConnectResult, ServerFrame, PONG};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Callback invoked once per publication on a channel
pub type PublicationHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// How long `close()` waits for the task before aborting it
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Connection lifecycle callbacks
pub trait SessionListener: Send + Sync {
    /// `attempt` is 0 for the first connection, then counts retries
    fn on_connecting(&self, _attempt: u32) {}
    fn on_connected(&self, client_id: &str);
    fn on_disconnected(&self, reason: &str);
    fn on_subscription_error(&self, _channel: &str, _message: &str) {}
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub client_name: String,
    pub token: Option<String>,
    pub handshake_timeout: Duration,
    pub max_ping_delay: Duration,
    pub reconnect: ReconnectConfig,
}

impl From<&MonitorConfig> for SessionConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            url: config.endpoint.url.clone(),
            client_name: config.endpoint.client_name.clone(),
            token: config.endpoint.token.clone(),
            handshake_timeout: config.endpoint.handshake_timeout(),
            max_ping_delay: config.endpoint.max_ping_delay(),
            reconnect: config.reconnect.clone(),
        }
    }
}

/// Routes lifecycle events and publications; goes silent once closed
struct Dispatcher {
    handlers: HashMap<String, Vec<PublicationHandler>>,
    listener: Arc<dyn SessionListener>,
    closed: AtomicBool,
}

impl Dispatcher {
    fn new(handlers: HashMap<String, Vec<PublicationHandler>>, listener: Arc<dyn SessionListener>) -> Self {
        Self {
            handlers,
            listener,
            closed: AtomicBool::new(false),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn channels(&self) -> impl Iterator<Item = &String> {
        self.handlers.keys()
    }

    /// Returns false when the publication was discarded
    fn publish(&self, channel: &str, data: &Value) -> bool {
        if self.is_closed() {
            debug!("Session closed, discarding publication on {}", channel);
            return false;
        }
        match self.handlers.get(channel) {
            Some(handlers) => {
                for handler in handlers {
                    handler(data);
                }
                true
            }
            None => {
                debug!("No handler for channel {}", channel);
                false
            }
        }
    }

    fn connecting(&self, attempt: u32) {
        if !self.is_closed() {
            self.listener.on_connecting(attempt);
        }
    }

    fn connected(&self, client_id: &str) {
        if !self.is_closed() {
            self.listener.on_connected(client_id);
        }
    }

    fn disconnected(&self, reason: &str) {
        if !self.is_closed() {
            self.listener.on_disconnected(reason);
        }
    }

    fn subscription_error(&self, channel: &str, message: &str) {
        if !self.is_closed() {
            self.listener.on_subscription_error(channel, message);
        }
    }
}

/// Transport session manager
pub struct TransportSession {
    config: SessionConfig,
    listener: Arc<dyn SessionListener>,
    handlers: HashMap<String, Vec<PublicationHandler>>,
    dispatcher: Option<Arc<Dispatcher>>,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl TransportSession {
    pub fn new(config: SessionConfig, listener: Arc<dyn SessionListener>) -> Self {
        Self {
            config,
            listener,
            handlers: HashMap::new(),
            dispatcher: None,
            shutdown: None,
            handle: None,
            closed: false,
        }
    }

    /// Register a handler for a channel. Must happen before `open()`.
    pub fn subscribe<F>(&mut self, channel: impl Into<String>, handler: F) -> FeedResult<()>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        if self.closed {
            return Err(FeedError::Closed);
        }
        if self.dispatcher.is_some() {
            return Err(FeedError::AlreadyOpen);
        }

        self.handlers
            .entry(channel.into())
            .or_default()
            .push(Arc::new(handler));
        Ok(())
    }

    /// Spawn the connection task. Requires a tokio runtime.
    pub fn open(&mut self) -> FeedResult<()> {
        if self.closed {
            return Err(FeedError::Closed);
        }
        if self.dispatcher.is_some() {
            return Err(FeedError::AlreadyOpen);
        }

        let dispatcher = Arc::new(Dispatcher::new(
            std::mem::take(&mut self.handlers),
            Arc::clone(&self.listener),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = SessionTask {
            config: self.config.clone(),
            dispatcher: Arc::clone(&dispatcher),
            next_id: 0,
        };
        let handle = tokio::spawn(task.run(shutdown_rx));

        info!("Opened session to {}", self.config.url);
        self.dispatcher = Some(dispatcher);
        self.shutdown = Some(shutdown_tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Close the connection. Idempotent, safe before `open()`. No handler
    /// or listener callback runs once this returns.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.close();
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                warn!("Session task did not stop in {:?}, aborting", CLOSE_GRACE);
                handle.abort();
            }
        }

        info!("Closed session to {}", self.config.url);
    }

    pub fn is_open(&self) -> bool {
        !self.closed && self.dispatcher.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.close();
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Background connection loop
struct SessionTask {
    config: SessionConfig,
    dispatcher: Arc<Dispatcher>,
    next_id: u32,
}

impl SessionTask {
    fn next_id(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.next_id
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut attempts = 0u32;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.dispatcher.connecting(attempts);

            let err = match self.connect_and_listen(&mut shutdown, &mut attempts).await {
                Ok(()) => {
                    info!("Session to {} closed by client", self.config.url);
                    break;
                }
                Err(e) => e,
            };

            if *shutdown.borrow() {
                break;
            }

            let reason = err.reason();
            error!("Session to {} dropped: {}", self.config.url, reason);
            self.dispatcher.disconnected(&reason);

            if err.is_terminal() {
                warn!("Server refused {}, not reconnecting: {}", self.config.url, err);
                break;
            }

            attempts += 1;
            if !self.config.reconnect.allows(attempts) {
                warn!("Giving up on {} after {} attempts", self.config.url, attempts);
                break;
            }

            let delay = self.config.reconnect.delay_for(attempts);
            warn!(
                "Reconnecting to {} in {:?} (attempt {})",
                self.config.url, delay, attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }
    }

    /// `Ok` only when shutdown was requested; every other exit is an error
    /// carrying the disconnect reason.
    async fn connect_and_listen(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
        attempts: &mut u32,
    ) -> FeedResult<()> {
        info!("Connecting to {}", self.config.url);

        let (ws_stream, _) = tokio::time::timeout(
            self.config.handshake_timeout,
            connect_async(self.config.url.as_str()),
        )
        .await
        .map_err(|_| FeedError::Timeout("connection"))?
        .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let connect_id = self.next_id();
        let command = Command::connect(
            connect_id,
            &self.config.client_name,
            self.config.token.as_deref(),
        );
        send_text(&mut write, command.to_json()?).await?;

        let result = tokio::time::timeout(
            self.config.handshake_timeout,
            await_connect_reply(&mut read, &mut write, connect_id),
        )
        .await
        .map_err(|_| FeedError::Timeout("handshake"))??;

        *attempts = 0;
        info!("Connected to {} as client {}", self.config.url, result.client);
        self.dispatcher.connected(&result.client);

        let mut pending: HashMap<u32, String> = HashMap::new();
        let channels: Vec<String> = self.dispatcher.channels().cloned().collect();
        for channel in channels {
            let id = self.next_id();
            send_text(&mut write, Command::subscribe(id, &channel).to_json()?).await?;
            debug!("Subscribing to {} (id {})", channel, id);
            pending.insert(id, channel);
        }

        let idle_limit = (result.ping > 0)
            .then(|| Duration::from_secs(u64::from(result.ping)) + self.config.max_ping_delay);
        let mut deadline = idle_limit.map(|limit| Instant::now() + limit);

        loop {
            let at_deadline = deadline;
            let idle = async move {
                match at_deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = idle => {
                    return Err(FeedError::Disconnected("ping timeout".to_string()));
                }
                msg = read.next() => {
                    if let Some(limit) = idle_limit {
                        deadline = Some(Instant::now() + limit);
                    }

                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(&text, &mut write, &pending, result.pong).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write
                                .send(Message::Pong(data))
                                .await
                                .map_err(|e| FeedError::Disconnected(e.to_string()))?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("WebSocket closed by server");
                            return Err(close_error(frame, FeedError::Disconnected));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            return Err(FeedError::Disconnected(e.to_string()));
                        }
                        None => {
                            return Err(FeedError::Disconnected("connection closed".to_string()));
                        }
                    }
                }
            }
        }
    }

    async fn handle_text(
        &self,
        text: &str,
        write: &mut WsSink,
        pending: &HashMap<u32, String>,
        pong: bool,
    ) -> FeedResult<()> {
        for frame in protocol::decode_message(text) {
            match frame {
                Ok(ServerFrame::Ping) => {
                    if pong {
                        send_text(write, PONG.to_string()).await?;
                    }
                }
                Ok(ServerFrame::Publication { channel, data }) => {
                    self.dispatcher.publish(&channel, &data);
                }
                Ok(ServerFrame::Subscribed { id }) => {
                    if let Some(channel) = pending.get(&id) {
                        info!("Subscribed to {}", channel);
                    }
                }
                Ok(ServerFrame::Error { id, code, message, .. }) => {
                    match id.and_then(|id| pending.get(&id)) {
                        Some(channel) => {
                            warn!("Subscription to {} failed: {} ({})", channel, message, code);
                            self.dispatcher
                                .subscription_error(channel, &format!("{} ({})", message, code));
                        }
                        None => warn!("Server error {}: {}", code, message),
                    }
                }
                Ok(ServerFrame::Disconnect { code, reason }) => {
                    info!("Server requested disconnect: {} ({})", reason, code);
                    return Err(disconnect_error(code, reason));
                }
                Ok(other) => debug!("Ignoring frame {:?}", other),
                Err(e) => warn!("Dropping undecodable frame: {}", e),
            }
        }
        Ok(())
    }
}

async fn send_text(write: &mut WsSink, text: String) -> FeedResult<()> {
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| FeedError::Disconnected(e.to_string()))
}

async fn await_connect_reply(
    read: &mut WsSource,
    write: &mut WsSink,
    connect_id: u32,
) -> FeedResult<ConnectResult> {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                for frame in protocol::decode_message(&text) {
                    match frame {
                        Ok(ServerFrame::Connected { id, result }) if id == connect_id => {
                            return Ok(result);
                        }
                        Ok(ServerFrame::Error {
                            id: Some(id),
                            code,
                            message,
                            temporary,
                        }) if id == connect_id => {
                            if protocol::is_terminal_error(code, temporary) {
                                return Err(FeedError::Terminal { code, reason: message });
                            }
                            return Err(FeedError::Server { code, message });
                        }
                        Ok(ServerFrame::Disconnect { code, reason }) => {
                            return Err(disconnect_error(code, reason));
                        }
                        Ok(other) => debug!("Ignoring frame during handshake: {:?}", other),
                        Err(e) => warn!("Dropping undecodable frame during handshake: {}", e),
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                write
                    .send(Message::Pong(data))
                    .await
                    .map_err(|e| FeedError::HandshakeFailed(e.to_string()))?;
            }
            Ok(Message::Close(frame)) => {
                return Err(close_error(frame, FeedError::HandshakeFailed));
            }
            Ok(_) => {}
            Err(e) => return Err(FeedError::HandshakeFailed(e.to_string())),
        }
    }

    Err(FeedError::HandshakeFailed(
        "connection closed during handshake".to_string(),
    ))
}

/// Map a disconnect push to an error, terminal codes stop the reconnect loop
fn disconnect_error(code: u32, reason: String) -> FeedError {
    let reason = if reason.is_empty() {
        format!("disconnected by server ({})", code)
    } else {
        reason
    };
    if protocol::is_terminal_disconnect(code) {
        FeedError::Terminal { code, reason }
    } else {
        FeedError::Disconnected(reason)
    }
}

/// Same mapping for a WebSocket close frame, which newer servers use to
/// carry the disconnect code
fn close_error(frame: Option<CloseFrame<'static>>, otherwise: fn(String) -> FeedError) -> FeedError {
    let code = frame.as_ref().map(|f| u32::from(u16::from(f.code)));
    let reason = frame
        .map(|f| f.reason.to_string())
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| "connection closed by server".to_string());

    match code {
        Some(code) if protocol::is_terminal_disconnect(code) => FeedError::Terminal { code, reason },
        _ => otherwise(reason),
    }
}
