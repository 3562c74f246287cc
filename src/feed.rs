use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::config::WsConfig;
use crate::types::{ClientMessage, ServerMessage, Stats, Subscription, Transaction};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Events emitted by the feed client to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected,
    Disconnected,
    /// A reconnect attempt is scheduled; fires before the wait.
    Reconnecting { attempt: u32 },
    NewTransaction(Transaction),
    TransactionUpdate(Transaction),
    StatsUpdate(Stats),
    /// Application-level error message pushed by the server.
    ServerError(String),
    /// The reconnect budget is exhausted; emitted exactly once per outage.
    /// The client stays idle until `connect()` is called again.
    ConnectionFailed { attempts: u32 },
}

enum Command {
    Connect,
    Disconnect,
    Subscribe(Subscription),
    Unsubscribe(Subscription),
}

/// Handle to the feed driver task.
///
/// The socket loop, heartbeat, and reconnect timers all live in one spawned
/// task owned by this handle; dropping it (or calling `disconnect`) tears
/// everything down at a well-defined boundary. Events arrive on the
/// receiver returned by [`FeedClient::spawn`].
pub struct FeedClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl FeedClient {
    /// Spawn the driver task. The client starts idle; call `connect()`.
    pub fn spawn(config: WsConfig) -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            config,
            cmd_rx,
            event_tx,
            subscriptions: Vec::new(),
            reconnect_attempts: 0,
        };
        tokio::spawn(driver.run());
        (Self { cmd_tx }, event_rx)
    }

    /// Open the connection. No-op while already open or connecting.
    pub fn connect(&self) {
        let _ = self.cmd_tx.send(Command::Connect);
    }

    /// Intentional close: suppresses auto-reconnect, stops the heartbeat,
    /// cancels any pending reconnect, and clears all subscriptions.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Register a subscription. Sent immediately when the socket is open;
    /// the full set is replayed on every (re)connect. Duplicates (by
    /// structural identity of the serialized pair) are ignored.
    pub fn subscribe(&self, subscription: Subscription) {
        let _ = self.cmd_tx.send(Command::Subscribe(subscription));
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        let _ = self.cmd_tx.send(Command::Unsubscribe(subscription));
    }
}

enum Mode {
    Idle,
    Dial,
    Backoff,
}

enum SessionEnd {
    /// `disconnect()` was called.
    Manual,
    /// Transport error or server-side close.
    Lost,
    /// All client handles are gone; the driver should exit.
    HandleDropped,
}

struct Driver {
    config: WsConfig,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<FeedEvent>,
    /// Active subscriptions in registration order, keyed by serialized
    /// identity.
    subscriptions: Vec<(String, Subscription)>,
    reconnect_attempts: u32,
}

impl Driver {
    async fn run(mut self) {
        let mut mode = Mode::Idle;
        loop {
            mode = match mode {
                Mode::Idle => match self.cmd_rx.recv().await {
                    None => return,
                    Some(Command::Connect) => Mode::Dial,
                    Some(Command::Disconnect) => {
                        self.clear();
                        Mode::Idle
                    }
                    Some(Command::Subscribe(sub)) => {
                        self.add_subscription(sub);
                        Mode::Idle
                    }
                    Some(Command::Unsubscribe(sub)) => {
                        self.remove_subscription(&sub);
                        Mode::Idle
                    }
                },
                Mode::Dial => match connect_async(self.config.url.as_str()).await {
                    Ok((ws, _)) => {
                        info!("WebSocket connected");
                        self.reconnect_attempts = 0;
                        self.emit(FeedEvent::Connected);
                        let end = self.session(ws).await;
                        self.emit(FeedEvent::Disconnected);
                        match end {
                            SessionEnd::Manual => {
                                self.clear();
                                Mode::Idle
                            }
                            SessionEnd::Lost => Mode::Backoff,
                            SessionEnd::HandleDropped => return,
                        }
                    }
                    Err(err) => {
                        warn!("WebSocket connect failed: {err}");
                        Mode::Backoff
                    }
                },
                Mode::Backoff => {
                    if self.reconnect_attempts >= self.config.max_reconnect_attempts {
                        error!(
                            "Giving up after {} reconnect attempts",
                            self.reconnect_attempts
                        );
                        self.emit(FeedEvent::ConnectionFailed {
                            attempts: self.reconnect_attempts,
                        });
                        Mode::Idle
                    } else {
                        self.reconnect_attempts += 1;
                        let attempt = self.reconnect_attempts;
                        self.emit(FeedEvent::Reconnecting { attempt });
                        info!(
                            "Reconnecting in {:?} (attempt {attempt}/{})",
                            self.config.reconnect_interval(),
                            self.config.max_reconnect_attempts
                        );
                        let deadline =
                            tokio::time::Instant::now() + self.config.reconnect_interval();
                        loop {
                            tokio::select! {
                                _ = tokio::time::sleep_until(deadline) => break Mode::Dial,
                                cmd = self.cmd_rx.recv() => match cmd {
                                    None => return,
                                    Some(Command::Disconnect) => {
                                        self.clear();
                                        break Mode::Idle;
                                    }
                                    Some(Command::Connect) => break Mode::Dial,
                                    Some(Command::Subscribe(sub)) => {
                                        self.add_subscription(sub);
                                    }
                                    Some(Command::Unsubscribe(sub)) => {
                                        self.remove_subscription(&sub);
                                    }
                                }
                            }
                        }
                    }
                }
            };
        }
    }

    /// Drive one open connection until it ends.
    async fn session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        // Replay the full subscription set on every (re)connect.
        for (_, sub) in &self.subscriptions {
            if send_json(&mut sink, &ClientMessage::subscribe(sub.clone()))
                .await
                .is_err()
            {
                return SessionEnd::Lost;
            }
        }

        let hb = self.config.heartbeat_interval();
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + hb, hb);

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if send_json(&mut sink, &ClientMessage::ping()).await.is_err() {
                        return SessionEnd::Lost;
                    }
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::HandleDropped;
                    }
                    Some(Command::Connect) => {
                        debug!("Already connected, ignoring connect()");
                    }
                    Some(Command::Disconnect) => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Manual;
                    }
                    Some(Command::Subscribe(sub)) => {
                        if self.add_subscription(sub.clone())
                            && send_json(&mut sink, &ClientMessage::subscribe(sub)).await.is_err()
                        {
                            return SessionEnd::Lost;
                        }
                    }
                    Some(Command::Unsubscribe(sub)) => {
                        if self.remove_subscription(&sub)
                            && send_json(&mut sink, &ClientMessage::unsubscribe(sub)).await.is_err()
                        {
                            return SessionEnd::Lost;
                        }
                    }
                },
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        debug!("WebSocket closed by server: {frame:?}");
                        return SessionEnd::Lost;
                    }
                    Some(Ok(_)) => {} // transport ping/pong/binary frames
                    Some(Err(err)) => {
                        warn!("WebSocket stream error: {err}");
                        return SessionEnd::Lost;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        return SessionEnd::Lost;
                    }
                }
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::NewTransaction(tx)) => self.emit(FeedEvent::NewTransaction(tx)),
            Ok(ServerMessage::TransactionUpdate(tx)) => self.emit(FeedEvent::TransactionUpdate(tx)),
            Ok(ServerMessage::StatsUpdate(stats)) => self.emit(FeedEvent::StatsUpdate(stats)),
            Ok(ServerMessage::Pong) => {
                // Pong receipt is not tracked against a deadline; a stalled
                // connection is only detected when the transport closes.
            }
            Ok(ServerMessage::Error(message)) => {
                warn!("Server error message: {message}");
                self.emit(FeedEvent::ServerError(message));
            }
            Ok(ServerMessage::Unknown(kind)) => {
                warn!("Unknown message type: {kind}");
            }
            Err(err) => {
                warn!("Failed to parse WebSocket message: {err}");
            }
        }
    }

    fn add_subscription(&mut self, sub: Subscription) -> bool {
        let key = sub.key();
        if self.subscriptions.iter().any(|(k, _)| *k == key) {
            return false;
        }
        self.subscriptions.push((key, sub));
        true
    }

    fn remove_subscription(&mut self, sub: &Subscription) -> bool {
        let key = sub.key();
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(k, _)| *k != key);
        before != self.subscriptions.len()
    }

    /// Intentional-close bookkeeping: drop subscriptions and the attempt
    /// counter.
    fn clear(&mut self) {
        self.subscriptions.clear();
        self.reconnect_attempts = 0;
    }

    fn emit(&self, event: FeedEvent) {
        let _ = self.event_tx.send(event);
    }
}

async fn send_json(sink: &mut WsSink, message: &ClientMessage) -> Result<(), tungstenite::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(err) => {
            warn!("Failed to serialize message: {err}");
            Ok(())
        }
    }
}
