// Device link lifecycle
//
// One driver task owns the open session and the single reconnect slot.
// The `DeviceLink` handle talks to it over a command channel, so connect
// attempts, transport loss and reconnect timers are processed one at a time
// and the transition table in `ConnectionState::on` is the only place state
// changes are decided.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::live::Broadcaster;
use crate::streaming::parser::DeviceLineParser;
use crate::streaming::transport::{DeviceStream, DeviceTransport};
use crate::streaming::types::{SerialConfig, StatusLevel, TransportError};

/// Connection state of the device link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Inputs to the link state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    ConnectRequested,
    Opened,
    OpenFailed,
    TransportLost,
    CloseRequested,
    Closed,
}

impl ConnectionState {
    /// Transition table. Events that do not apply leave the state unchanged.
    pub fn on(self, event: LinkEvent) -> ConnectionState {
        use ConnectionState::*;
        use LinkEvent::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Connecting,
            (Connecting, Opened) => Open,
            (Connecting, OpenFailed) => Disconnected,
            (Open, TransportLost) => Disconnected,
            (Open, CloseRequested) | (Connecting, CloseRequested) => Closing,
            (Closing, Closed) => Disconnected,
            (state, _) => state,
        }
    }
}

/// Longest device line kept; longer lines are dropped whole
pub const MAX_LINE_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Delay before an automatic reconnect attempt
    pub reconnect_delay: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

enum LinkCommand {
    Connect {
        config: SerialConfig,
        reply: oneshot::Sender<bool>,
    },
    ReconnectDue {
        generation: u64,
    },
    TransportLost {
        session: u64,
        error: Option<String>,
    },
}

struct LinkShared {
    state: RwLock<ConnectionState>,
    config: RwLock<SerialConfig>,
    reconnect_pending: AtomicBool,
}

/// Clone-able handle to the device link driver
#[derive(Clone)]
pub struct DeviceLink {
    shared: Arc<LinkShared>,
    commands: mpsc::UnboundedSender<LinkCommand>,
    transport: Arc<dyn DeviceTransport>,
    shutdown: CancellationToken,
    driver: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DeviceLink {
    /// Start the link driver. Does not connect; call [`DeviceLink::connect`].
    pub fn spawn(
        transport: Arc<dyn DeviceTransport>,
        broadcaster: Broadcaster,
        initial: SerialConfig,
        settings: LinkSettings,
    ) -> Self {
        let shared = Arc::new(LinkShared {
            state: RwLock::new(ConnectionState::Disconnected),
            config: RwLock::new(initial),
            reconnect_pending: AtomicBool::new(false),
        });
        let (commands, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let driver = LinkDriver {
            shared: Arc::clone(&shared),
            transport: Arc::clone(&transport),
            broadcaster,
            parser: DeviceLineParser::default(),
            commands: commands.clone(),
            settings,
            shutdown: shutdown.clone(),
            session: None,
            reconnect: None,
            next_session: 0,
            next_timer: 0,
        };
        let handle = tokio::spawn(driver.run(rx));

        Self {
            shared,
            commands,
            transport,
            shutdown,
            driver: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Close any open session and open `config`. Returns whether the port
    /// opened; on failure a reconnect is scheduled.
    pub async fn connect(&self, config: SerialConfig) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(LinkCommand::Connect { config, reply })
            .is_err()
        {
            warn!("Device link is stopped, ignoring connect request");
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Reopen the link with new parameters, whatever the current state
    pub async fn update_config(&self, config: SerialConfig) -> bool {
        self.connect(config).await
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    pub fn config(&self) -> SerialConfig {
        self.shared.config.read().clone()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.shared.reconnect_pending.load(Ordering::Acquire)
    }

    /// Available device endpoints; empty when enumeration fails.
    /// Enumeration blocks, so it runs on the blocking pool.
    pub async fn list_endpoints(&self) -> Vec<String> {
        let transport = Arc::clone(&self.transport);
        match tokio::task::spawn_blocking(move || transport.list_endpoints()).await {
            Ok(Ok(ports)) => ports,
            Ok(Err(e)) => {
                warn!("{}", e);
                Vec::new()
            }
            Err(e) => {
                error!("Port enumeration task failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Stop the driver: closes the session and drops any pending reconnect
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let driver = self.driver.lock().take();
        if let Some(handle) = driver {
            if let Err(e) = handle.await {
                error!("Device link driver failed: {}", e);
            }
        }
    }
}

struct Session {
    id: u64,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

struct ReconnectTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct LinkDriver {
    shared: Arc<LinkShared>,
    transport: Arc<dyn DeviceTransport>,
    broadcaster: Broadcaster,
    parser: DeviceLineParser,
    commands: mpsc::UnboundedSender<LinkCommand>,
    settings: LinkSettings,
    shutdown: CancellationToken,
    session: Option<Session>,
    reconnect: Option<ReconnectTimer>,
    next_session: u64,
    next_timer: u64,
}

impl LinkDriver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<LinkCommand>) {
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        self.cancel_reconnect();
        self.close_session();
        info!("Device link stopped");
    }

    async fn handle(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::Connect { config, reply } => {
                let connected = self.connect(config).await;
                let _ = reply.send(connected);
            }

            LinkCommand::ReconnectDue { generation } => {
                if self.reconnect.as_ref().map(|t| t.generation) != Some(generation) {
                    debug!("Ignoring superseded reconnect timer {}", generation);
                    return;
                }
                self.reconnect = None;
                self.shared.reconnect_pending.store(false, Ordering::Release);

                let config = self.shared.config.read().clone();
                info!("Reconnecting to {}", config.port);
                self.connect(config).await;
            }

            LinkCommand::TransportLost { session, error } => {
                if self.session.as_ref().map(|s| s.id) != Some(session) {
                    debug!("Ignoring loss of stale session {}", session);
                    return;
                }
                self.session = None;
                self.transition(LinkEvent::TransportLost);

                let port = self.shared.config.read().port.clone();
                match error {
                    Some(e) => {
                        warn!("Serial port {} error: {}", port, e);
                        self.broadcaster
                            .publish_status(StatusLevel::Error, format!("Serial port {} error: {}", port, e));
                    }
                    None => {
                        warn!("Serial port {} closed", port);
                        self.broadcaster
                            .publish_status(StatusLevel::Warning, format!("Serial port {} closed", port));
                    }
                }
                self.schedule_reconnect();
            }
        }
    }

    async fn connect(&mut self, config: SerialConfig) -> bool {
        self.cancel_reconnect();
        self.close_session();
        *self.shared.config.write() = config.clone();
        self.transition(LinkEvent::ConnectRequested);

        let shutdown = self.shutdown.clone();
        let transport = Arc::clone(&self.transport);
        let opened = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            result = transport.open(&config) => Some(result),
        };

        match opened {
            None => {
                self.transition(LinkEvent::CloseRequested);
                self.transition(LinkEvent::Closed);
                false
            }
            Some(Ok(stream)) => {
                self.transition(LinkEvent::Opened);
                info!("Connected to {} at {} baud", config.port, config.baud_rate);
                self.broadcaster
                    .publish_status(StatusLevel::Info, format!("Connected to {}", config.port));
                self.start_session(stream);
                true
            }
            Some(Err(e)) => {
                self.transition(LinkEvent::OpenFailed);
                error!("{}", e);
                self.broadcaster
                    .publish_status(StatusLevel::Error, e.to_string());
                self.schedule_reconnect();
                false
            }
        }
    }

    fn start_session(&mut self, stream: DeviceStream) {
        self.next_session += 1;
        let id = self.next_session;
        let cancel = self.shutdown.child_token();

        let reader = tokio::spawn(read_lines(
            id,
            stream,
            self.parser.clone(),
            self.broadcaster.clone(),
            cancel.clone(),
            self.commands.clone(),
        ));

        self.session = Some(Session { id, cancel, reader });
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            session.reader.abort();
            self.transition(LinkEvent::CloseRequested);
            self.transition(LinkEvent::Closed);
            info!("Closed device session {}", session.id);
        }
    }

    /// Replace the reconnect slot with a fresh timer
    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();

        self.next_timer += 1;
        let generation = self.next_timer;
        let delay = self.settings.reconnect_delay;
        let commands = self.commands.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = commands.send(LinkCommand::ReconnectDue { generation });
                }
            }
        });

        self.reconnect = Some(ReconnectTimer { generation, handle });
        self.shared.reconnect_pending.store(true, Ordering::Release);
        info!("Reconnect scheduled in {:?}", delay);
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            timer.handle.abort();
            debug!("Cancelled reconnect timer {}", timer.generation);
        }
        self.shared.reconnect_pending.store(false, Ordering::Release);
    }

    fn transition(&self, event: LinkEvent) {
        let mut state = self.shared.state.write();
        let next = state.on(event);
        if next != *state {
            debug!("Device link {:?} -> {:?} on {:?}", *state, next, event);
            *state = next;
        }
    }
}

/// Read newline-delimited device output until EOF, error or cancellation
async fn read_lines(
    session: u64,
    stream: DeviceStream,
    parser: DeviceLineParser,
    broadcaster: Broadcaster,
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<LinkCommand>,
) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);
    let mut overlong = false;

    let error = loop {
        buf.clear();

        tokio::select! {
            biased;

            _ = cancel.cancelled() => return,

            result = read_capped_line(&mut reader, &mut buf) => match result {
                Ok(0) => break None,
                Ok(_) => {
                    let complete = buf.last() == Some(&b'\n');
                    if overlong {
                        // Still inside an oversized line; skip to its end
                        overlong = !complete;
                        continue;
                    }
                    if !complete && buf.len() >= MAX_LINE_BYTES {
                        warn!("Dropping device line longer than {} bytes", MAX_LINE_BYTES);
                        overlong = true;
                        continue;
                    }

                    let line = String::from_utf8_lossy(&buf);
                    if let Some(reading) = parser.process_line(&line) {
                        broadcaster.publish_reading(reading);
                    }
                }
                Err(e) => break Some(TransportError::Read(e).to_string()),
            },
        }
    };

    let _ = commands.send(LinkCommand::TransportLost { session, error });
}

/// Read up to and including the next `\n`, but never more than
/// `MAX_LINE_BYTES` at once
async fn read_capped_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    reader.take(MAX_LINE_BYTES as u64).read_until(b'\n', buf).await
}
