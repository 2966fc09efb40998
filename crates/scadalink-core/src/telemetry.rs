// ── Telemetry client ──
//
// Owns the session, the snapshot store and the current live channel.
// A supervisor task watches the session token: every change tears the
// old channel down, clears the snapshot, and (if a token is present)
// starts a fresh channel.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scadalink_api::{ApiClient, UserQuery};
use uuid::Uuid;

use crate::channel::{ChannelSettings, ChannelState, LiveChannel, StreamTransport};
use crate::classify::NodeClassifier;
use crate::command::{CommandDispatcher, WriteControl};
use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::model::{CurrentUser, DeviceSnapshot, UserSummary};
use crate::session::Session;
use crate::store::{Snapshot, SnapshotStore};
use crate::stream::SnapshotStream;
use crate::transport::WsTransport;

/// Entry point for consumers.
///
/// Cheaply cloneable via `Arc<TelemetryInner>`. Does nothing until
/// [`start`](Self::start) is called.
pub struct TelemetryClient<T: StreamTransport = WsTransport> {
    inner: Arc<TelemetryInner<T>>,
}

impl<T: StreamTransport> Clone for TelemetryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct TelemetryInner<T: StreamTransport> {
    config: ClientConfig,
    session: Session,
    api: ApiClient,
    transport: Arc<T>,
    store: Arc<SnapshotStore>,
    status: watch::Sender<ChannelState>,
    dispatcher: CommandDispatcher,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryClient<WsTransport> {
    /// Client talking to `config.url` over WebSocket.
    pub fn new(config: ClientConfig, session: Session) -> Result<Self, CoreError> {
        let api = config.api_client()?;
        let transport = WsTransport::new(api.clone());
        Ok(Self::with_transport(config, session, api, Arc::new(transport)))
    }
}

impl<T: StreamTransport> TelemetryClient<T> {
    /// Client with a caller-supplied stream transport.
    pub fn with_transport(
        config: ClientConfig,
        session: Session,
        api: ApiClient,
        transport: Arc<T>,
    ) -> Self {
        let (status, _) = watch::channel(ChannelState::Idle);
        let dispatcher = CommandDispatcher::with_grace(
            session.clone(),
            api.clone(),
            config.toggle_grace,
            config.setpoint_grace,
        );
        Self {
            inner: Arc::new(TelemetryInner {
                config,
                session,
                api,
                transport,
                store: Arc::new(SnapshotStore::new()),
                status,
                dispatcher,
                cancel: CancellationToken::new(),
                supervisor: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn classifier(&self) -> &NodeClassifier {
        &self.inner.config.classifier
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start following the session. Idempotent.
    pub async fn start(&self) {
        let mut guard = self.inner.supervisor.lock().await;
        if guard.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(supervise(inner)));
        debug!("telemetry supervisor started");
    }

    /// Tear down the live channel and cancel pending writes. A stopped
    /// client cannot be started again.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        self.inner.dispatcher.shutdown();
        if let Some(handle) = self.inner.supervisor.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "telemetry supervisor panicked");
            }
        }
        self.inner.status.send_replace(ChannelState::Stopped);
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Exchange credentials for a token and store it in the session.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), CoreError> {
        let token = self.inner.api.login(username, password).await?;
        self.inner.session.set_token(token)?;
        info!(username, "logged in");
        Ok(())
    }

    /// Clear the session; the live channel follows.
    pub fn logout(&self) {
        self.inner.session.clear();
    }

    fn require_token(&self) -> Result<SecretString, CoreError> {
        self.inner.session.token().ok_or(CoreError::NotAuthenticated)
    }

    pub async fn current_user(&self) -> Result<CurrentUser, CoreError> {
        let token = self.require_token()?;
        Ok(self.inner.api.current_user(&token).await?.into())
    }

    /// Fetch the device list over REST and publish it.
    pub async fn refresh(&self) -> Result<Snapshot, CoreError> {
        let token = self.require_token()?;
        let records = self.inner.api.initial_data(&token).await?;
        self.inner
            .store
            .replace(records.into_iter().map(DeviceSnapshot::from).collect());
        Ok(self.inner.store.snapshot())
    }

    // ── Park access ──────────────────────────────────────────────────
    //
    // Superuser only. A park grant decides which PLCs a user sees in
    // `/data` and on the stream; the backend resolves it when a stream
    // connects, so an open stream picks up changes on its next reconnect.

    pub async fn parks(&self) -> Result<Vec<String>, CoreError> {
        let token = self.require_token()?;
        Ok(self.inner.api.list_parks(&token).await?)
    }

    pub async fn users(&self, query: &UserQuery) -> Result<Vec<UserSummary>, CoreError> {
        if !(1..=500).contains(&query.limit) {
            return Err(CoreError::ValidationFailed {
                message: format!("limit must be between 1 and 500, got {}", query.limit),
            });
        }
        let token = self.require_token()?;
        let users = self.inner.api.list_users(&token, query).await?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    pub async fn user_parks(&self, user: Uuid) -> Result<Vec<String>, CoreError> {
        let token = self.require_token()?;
        Ok(self.inner.api.user_parks(&token, user).await?)
    }

    pub async fn grant_park(&self, user: Uuid, park: &str) -> Result<(), CoreError> {
        let park = require_park_id(park)?;
        let token = self.require_token()?;
        self.inner.api.grant_park(&token, user, park).await?;
        info!(%user, park, "park access granted");
        Ok(())
    }

    pub async fn revoke_park(&self, user: Uuid, park: &str) -> Result<(), CoreError> {
        let park = require_park_id(park)?;
        let token = self.require_token()?;
        self.inner.api.revoke_park(&token, user, park).await?;
        info!(%user, park, "park access revoked");
        Ok(())
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn state(&self) -> ChannelState {
        *self.inner.status.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.status.subscribe()
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.store.snapshot()
    }

    pub fn devices(&self) -> SnapshotStream {
        self.inner.store.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.inner.dispatcher
    }

    /// Control for a writable field, if the classifier marks it writable.
    pub fn write_control(&self, target: &str, field: &str) -> Result<WriteControl, CoreError> {
        let kind = self
            .inner
            .config
            .classifier
            .writable_kind(field)
            .ok_or_else(|| CoreError::ValidationFailed {
                message: format!("{field} is not a writable command"),
            })?;
        let control = self.inner.dispatcher.control(target, field, kind);
        if let Some(raw) = self
            .inner
            .store
            .device_by_url(target)
            .and_then(|d| d.node(field).cloned())
        {
            control.observe_stream(&raw);
        }
        Ok(control)
    }
}

// ── Supervisor task ──────────────────────────────────────────────────

struct Active {
    token: SecretString,
    channel: LiveChannel,
    state: watch::Receiver<ChannelState>,
}

async fn supervise<T: StreamTransport>(inner: Arc<TelemetryInner<T>>) {
    let mut token_rx = inner.session.subscribe();
    let mut active: Option<Active> = None;

    loop {
        let token = token_rx.borrow_and_update().clone();
        reconcile(&inner, &mut active, token).await;

        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            changed = next_state(active.as_mut()) => {
                if let Some(state) = changed {
                    inner.status.send_replace(state);
                }
            }
            changed = token_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(a) = active.take() {
        a.channel.shutdown().await;
    }
    debug!("telemetry supervisor exited");
}

/// Bring the active channel in line with `token`.
async fn reconcile<T: StreamTransport>(
    inner: &Arc<TelemetryInner<T>>,
    active: &mut Option<Active>,
    token: Option<SecretString>,
) {
    let unchanged = match (active.as_ref(), token.as_ref()) {
        (Some(a), Some(t)) => a.token.expose_secret() == t.expose_secret(),
        (None, None) => true,
        _ => false,
    };
    if unchanged {
        return;
    }

    if let Some(old) = active.take() {
        let rejected = old.channel.state() == ChannelState::AuthRejected;
        old.channel.shutdown().await;
        inner.store.clear();
        inner.status.send_replace(if rejected {
            ChannelState::AuthRejected
        } else {
            ChannelState::Idle
        });
    }

    let Some(token) = token else {
        return;
    };

    let session = inner.session.clone();
    let settings = ChannelSettings {
        reconnect_delay: inner.config.reconnect_delay,
        auth_close_code: inner.config.auth_close_code,
        seed_snapshot: inner.config.seed_snapshot,
    };
    let on_auth_failed = {
        let session = session.clone();
        Box::new(move || session.clear())
    };
    let channel = LiveChannel::spawn(
        session,
        Arc::clone(&inner.transport),
        Arc::clone(&inner.store),
        settings,
        on_auth_failed,
    );
    let state = channel.subscribe();
    *active = Some(Active {
        token,
        channel,
        state,
    });
}

/// Next state published by the active channel; pending if none.
async fn next_state(active: Option<&mut Active>) -> Option<ChannelState> {
    let Some(a) = active else {
        return std::future::pending().await;
    };
    if a.state.changed().await.is_err() {
        // Channel task finished; its final state was already seen.
        return std::future::pending().await;
    }
    Some(*a.state.borrow_and_update())
}

fn require_park_id(park: &str) -> Result<&str, CoreError> {
    let park = park.trim();
    if park.is_empty() {
        return Err(CoreError::ValidationFailed {
            message: "a park id is required".into(),
        });
    }
    Ok(park)
}
