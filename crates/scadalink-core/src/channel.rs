// ── Live data channel ──
//
// One streaming connection scoped to one session token, driven by a
// single owner task. Inputs are connection events, the retry timer,
// queued requests (`reconnect_now`), session token changes, and
// teardown. State is published on a watch channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use scadalink_api::{Frame, StreamEvent, parse_frame};

use crate::error::CoreError;
use crate::model::DeviceSnapshot;
use crate::session::Session;
use crate::store::SnapshotStore;

const REQUEST_QUEUE_SIZE: usize = 8;

// ── Transport seam ───────────────────────────────────────────────────

/// One open streaming connection.
pub trait StreamConnection: Send + 'static {
    /// Wait for the next text frame, close, or failure. Must be
    /// cancel-safe: the channel drops this future to serve other inputs.
    fn next_event(&mut self) -> impl Future<Output = StreamEvent> + Send;

    /// Close the connection from our side.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens streaming connections for a token.
pub trait StreamTransport: Send + Sync + 'static {
    type Connection: StreamConnection;

    /// Open a connection carrying `token`. A rejected handshake must be
    /// reported as [`CoreError::AuthenticationFailed`].
    fn open(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<Self::Connection, CoreError>> + Send;

    /// Fetch the current device list out of band, before the first frame.
    /// `Ok(None)` means the transport has nothing to offer.
    fn initial_snapshot(
        &self,
        _token: &SecretString,
    ) -> impl Future<Output = Result<Option<Vec<DeviceSnapshot>>, CoreError>> + Send {
        async { Ok(None) }
    }
}

// ── ChannelState ─────────────────────────────────────────────────────

/// Observable channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelState {
    /// No token; nothing to do.
    Idle,
    Connecting,
    Connected,
    /// Waiting out the fixed delay after a transient disconnect.
    Reconnecting,
    /// The server rejected the token. Terminal for this channel.
    AuthRejected,
    /// Torn down by its owner.
    Stopped,
}

impl ChannelState {
    /// Status line for display.
    pub fn status_text(self) -> &'static str {
        match self {
            Self::Idle => "Not logged in",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Reconnecting => "Disconnected. Reconnecting...",
            Self::AuthRejected => "Session rejected. Please log in again.",
            Self::Stopped => "Disconnected",
        }
    }

    /// Whether the channel task has finished in this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::AuthRejected | Self::Stopped)
    }
}

/// Tunables for one channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelSettings {
    pub reconnect_delay: Duration,
    pub auth_close_code: u16,
    pub seed_snapshot: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: crate::config::DEFAULT_RECONNECT_DELAY,
            auth_close_code: crate::config::DEFAULT_AUTH_CLOSE_CODE,
            seed_snapshot: true,
        }
    }
}

/// Invoked once when the server rejects the session. Its contract is to
/// clear the session token.
pub type AuthFailedCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
enum ChannelRequest {
    ReconnectNow,
}

// ── LiveChannel ──────────────────────────────────────────────────────

/// Handle to a running channel task.
///
/// Dropping the handle tears the channel down. [`shutdown`](Self::shutdown)
/// does the same and waits for the connection to close.
pub struct LiveChannel {
    state: watch::Receiver<ChannelState>,
    requests: mpsc::Sender<ChannelRequest>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveChannel {
    /// Start a channel for the session's current token.
    ///
    /// If the session has no token the channel settles in `Idle` without
    /// opening anything.
    pub fn spawn<T: StreamTransport>(
        session: Session,
        transport: Arc<T>,
        store: Arc<SnapshotStore>,
        settings: ChannelSettings,
        on_auth_failed: AuthFailedCallback,
    ) -> Self {
        let (state_tx, state) = watch::channel(ChannelState::Idle);
        let (requests, request_rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let cancel = CancellationToken::new();

        let task = ChannelTask {
            session,
            transport,
            store,
            settings,
            on_auth_failed: Some(on_auth_failed),
            state: state_tx,
            requests: request_rx,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run());

        Self {
            state,
            requests,
            cancel,
            task: Some(handle),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Ask for an immediate reconnect. Skips the remaining delay while
    /// reconnecting; ignored while a connection is open or opening.
    pub fn reconnect_now(&self) {
        if self.requests.try_send(ChannelRequest::ReconnectNow).is_err() {
            debug!("reconnect request dropped: queue full or channel finished");
        }
    }

    /// Tear down and wait for the connection to close.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "live channel task panicked");
            }
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Channel task ─────────────────────────────────────────────────────

struct ChannelTask<T: StreamTransport> {
    session: Session,
    transport: Arc<T>,
    store: Arc<SnapshotStore>,
    settings: ChannelSettings,
    on_auth_failed: Option<AuthFailedCallback>,
    state: watch::Sender<ChannelState>,
    requests: mpsc::Receiver<ChannelRequest>,
    cancel: CancellationToken,
}

/// Why a connection attempt or session ended.
enum Exit {
    /// Transient failure; wait and try again.
    Dropped,
    AuthRejected,
    /// The token was cleared or replaced.
    Revoked,
    Cancelled,
}

impl<T: StreamTransport> ChannelTask<T> {
    async fn run(mut self) {
        let Some(token) = self.session.token() else {
            debug!("no session token; live channel idle");
            self.set_state(ChannelState::Idle);
            return;
        };
        let mut token_rx = self.session.subscribe();

        if self.settings.seed_snapshot {
            if let Some(exit) = self.seed(&token, &mut token_rx).await {
                self.finish(exit);
                return;
            }
        }

        loop {
            let exit = self.connect_and_read(&token, &mut token_rx).await;
            match exit {
                Exit::Dropped => {}
                other => {
                    self.finish(other);
                    return;
                }
            }

            self.set_state(ChannelState::Reconnecting);
            info!(
                delay_ms = u64::try_from(self.settings.reconnect_delay.as_millis()).unwrap_or(u64::MAX),
                "live stream lost, reconnecting"
            );

            let wait = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Some(Exit::Cancelled),
                () = token_revoked(&mut token_rx, &token) => Some(Exit::Revoked),
                () = tokio::time::sleep(self.settings.reconnect_delay) => None,
                Some(ChannelRequest::ReconnectNow) = self.requests.recv() => {
                    debug!("reconnect requested, skipping remaining delay");
                    None
                }
            };
            if let Some(exit) = wait {
                self.finish(exit);
                return;
            }

            // The timer may fire after the token went away.
            if !self.session.is_current(&token) {
                self.finish(Exit::Revoked);
                return;
            }

            // An expired token only shows up as a generic close on the
            // stream; the out-of-band fetch reports it as a 401.
            if self.settings.seed_snapshot {
                if let Some(exit) = self.seed(&token, &mut token_rx).await {
                    self.finish(exit);
                    return;
                }
            }
        }
    }

    /// One connection lifetime: open, then read until it ends.
    async fn connect_and_read(
        &mut self,
        token: &SecretString,
        token_rx: &mut watch::Receiver<Option<SecretString>>,
    ) -> Exit {
        self.set_state(ChannelState::Connecting);

        // Created once so a queued request cannot restart the attempt.
        let open = self.transport.open(token);
        tokio::pin!(open);
        let opened = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Exit::Cancelled,
                () = token_revoked(token_rx, token) => return Exit::Revoked,
                Some(request) = self.requests.recv() => {
                    debug!(?request, "ignored: connection already opening");
                }
                result = &mut open => break result,
            }
        };

        let mut conn = match opened {
            Ok(conn) => conn,
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "live stream handshake rejected");
                return Exit::AuthRejected;
            }
            Err(e) => {
                warn!(error = %e, "live stream connection failed");
                return Exit::Dropped;
            }
        };

        self.set_state(ChannelState::Connected);

        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                () = token_revoked(token_rx, token) => {
                    conn.close().await;
                    return Exit::Revoked;
                }
                Some(request) = self.requests.recv() => {
                    debug!(?request, "ignored: already connected");
                    continue;
                }
                event = conn.next_event() => Some(event),
            };

            let Some(event) = event else {
                conn.close().await;
                return Exit::Cancelled;
            };

            match event {
                StreamEvent::Text(text) => self.apply_frame(&text),
                StreamEvent::Closed {
                    code: Some(code), ..
                } if code == self.settings.auth_close_code => {
                    warn!(code, "server rejected session on live stream");
                    return Exit::AuthRejected;
                }
                StreamEvent::Closed { code, reason } => {
                    info!(?code, %reason, "live stream closed");
                    return Exit::Dropped;
                }
                StreamEvent::Failed(reason) => {
                    warn!(%reason, "live stream failed");
                    return Exit::Dropped;
                }
            }
        }
    }

    /// Seed the store out of band. Returns an exit if torn down meanwhile
    /// or if the server rejects the token.
    async fn seed(
        &mut self,
        token: &SecretString,
        token_rx: &mut watch::Receiver<Option<SecretString>>,
    ) -> Option<Exit> {
        self.set_state(ChannelState::Connecting);
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Some(Exit::Cancelled),
            () = token_revoked(token_rx, token) => return Some(Exit::Revoked),
            r = self.transport.initial_snapshot(token) => r,
        };
        match result {
            Ok(Some(devices)) => {
                debug!(devices = devices.len(), "seeded snapshot");
                self.store.replace(devices);
            }
            Ok(None) => {}
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "server rejected session token");
                return Some(Exit::AuthRejected);
            }
            Err(e) => debug!(error = %e, "initial snapshot unavailable"),
        }
        None
    }

    fn apply_frame(&self, text: &str) {
        match parse_frame(text) {
            Ok(Frame::Snapshot(records)) => {
                trace!(devices = records.len(), "frame received");
                self.store
                    .replace(records.into_iter().map(DeviceSnapshot::from).collect());
            }
            Ok(Frame::Keepalive) => trace!("keepalive"),
            Err(e) => debug!(error = %e, "discarding malformed frame"),
        }
    }

    fn finish(&mut self, exit: Exit) {
        match exit {
            Exit::AuthRejected => {
                self.set_state(ChannelState::AuthRejected);
                if let Some(callback) = self.on_auth_failed.take() {
                    callback();
                }
            }
            Exit::Revoked => {
                debug!("session token changed; live channel idle");
                self.set_state(ChannelState::Idle);
            }
            Exit::Cancelled => {
                debug!("live channel torn down");
                self.set_state(ChannelState::Stopped);
            }
            Exit::Dropped => {}
        }
    }

    fn set_state(&self, state: ChannelState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Resolves once the session no longer holds `token`.
async fn token_revoked(rx: &mut watch::Receiver<Option<SecretString>>, token: &SecretString) {
    loop {
        let revoked = !rx
            .borrow_and_update()
            .as_ref()
            .is_some_and(|t| t.expose_secret() == token.expose_secret());
        if revoked {
            return;
        }
        if rx.changed().await.is_err() {
            // Session dropped; the owner tears us down via cancellation.
            std::future::pending::<()>().await;
        }
    }
}
