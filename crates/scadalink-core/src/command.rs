// ── Write dispatch ──
//
// Turns a write intent into one authenticated request and exposes a
// per-control outcome that reverts to idle after a grace period. Writes do
// not go through the live channel; they share only the session token.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scadalink_api::{ApiClient, WriteRequest};

use crate::error::CoreError;
use crate::format::switch_is_on;
use crate::session::Session;

// ── Types ────────────────────────────────────────────────────────────

/// How a writable data point is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ControlKind {
    /// On/off switch, written as a two-element boolean array.
    Toggle,
    /// Numeric setpoint.
    Setpoint,
}

/// Value carried by a write intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteValue {
    Switch(bool),
    Setpoint(f64),
}

impl WriteValue {
    fn kind(self) -> ControlKind {
        match self {
            Self::Switch(_) => ControlKind::Toggle,
            Self::Setpoint(_) => ControlKind::Setpoint,
        }
    }
}

impl From<WriteValue> for scadalink_api::WriteValue {
    fn from(value: WriteValue) -> Self {
        match value {
            WriteValue::Switch(on) => Self::switch(on),
            WriteValue::Setpoint(n) => Self::Number(n),
        }
    }
}

/// (target device, field, value). Consumed by exactly one request.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteIntent {
    /// Source URL of the device.
    pub target: String,
    pub field: String,
    pub value: WriteValue,
}

/// Feedback state of one control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WriteOutcome {
    Idle,
    InFlight,
    Success,
    Failure,
}

/// Everything a view needs to render one control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub outcome: WriteOutcome,
    /// Pending text of a setpoint input; cleared after a successful write.
    pub input: String,
    /// Displayed switch position of a toggle control.
    pub toggle_on: Option<bool>,
    /// Reason for the most recent failure, for logs and tooltips.
    pub last_error: Option<String>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            outcome: WriteOutcome::Idle,
            input: String::new(),
            toggle_on: None,
            last_error: None,
        }
    }
}

impl ControlState {
    /// Controls accept a submission only while idle.
    pub fn is_enabled(&self) -> bool {
        self.outcome == WriteOutcome::Idle
    }
}

// ── CommandDispatcher ────────────────────────────────────────────────

/// Factory for write controls sharing one session and API client.
///
/// Cheaply cloneable. [`shutdown`](Self::shutdown) cancels every control's
/// pending request and reset timer.
#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    session: Session,
    api: ApiClient,
    toggle_grace: Duration,
    setpoint_grace: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("toggle_grace", &self.inner.toggle_grace)
            .field("setpoint_grace", &self.inner.setpoint_grace)
            .finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    pub fn new(session: Session, api: ApiClient) -> Self {
        Self::with_grace(
            session,
            api,
            crate::config::DEFAULT_TOGGLE_GRACE,
            crate::config::DEFAULT_SETPOINT_GRACE,
        )
    }

    pub fn with_grace(
        session: Session,
        api: ApiClient,
        toggle_grace: Duration,
        setpoint_grace: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                session,
                api,
                toggle_grace,
                setpoint_grace,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Create the control for one writable field on one device.
    pub fn control(
        &self,
        target: impl Into<String>,
        field: impl Into<String>,
        kind: ControlKind,
    ) -> WriteControl {
        let (state, _) = watch::channel(ControlState::default());
        WriteControl {
            inner: Arc::new(ControlInner {
                kind,
                target: target.into(),
                field: field.into(),
                state,
                cancel: self.inner.cancel.child_token(),
                dispatcher: Arc::clone(&self.inner),
            }),
        }
    }

    /// Cancel every outstanding request and reset timer.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

// ── WriteControl ─────────────────────────────────────────────────────

/// Handle to one control's write state.
///
/// Clones share state. When the last clone is dropped, any in-flight
/// request and pending reset are cancelled.
#[derive(Clone)]
pub struct WriteControl {
    inner: Arc<ControlInner>,
}

struct ControlInner {
    kind: ControlKind,
    target: String,
    field: String,
    state: watch::Sender<ControlState>,
    cancel: CancellationToken,
    dispatcher: Arc<DispatcherInner>,
}

impl Drop for ControlInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for WriteControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteControl")
            .field("kind", &self.inner.kind)
            .field("target", &self.inner.target)
            .field("field", &self.inner.field)
            .finish_non_exhaustive()
    }
}

impl WriteControl {
    pub fn kind(&self) -> ControlKind {
        self.inner.kind
    }

    pub fn target(&self) -> &str {
        &self.inner.target
    }

    pub fn field(&self) -> &str {
        &self.inner.field
    }

    pub fn state(&self) -> ControlState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.inner.state.subscribe()
    }

    /// Update the pending setpoint text.
    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.inner.state.send_modify(|s| s.input = text);
    }

    /// Feed the latest streamed value of this field. Applied only while
    /// idle, so an optimistic toggle update survives until the reset.
    pub fn observe_stream(&self, raw: &serde_json::Value) {
        if self.inner.kind != ControlKind::Toggle {
            return;
        }
        let on = switch_is_on(raw);
        self.inner.state.send_if_modified(|s| {
            if s.outcome == WriteOutcome::Idle && s.toggle_on != on {
                s.toggle_on = on;
                true
            } else {
                false
            }
        });
    }

    /// Flip a toggle control.
    pub async fn toggle(&self) -> Result<WriteOutcome, CoreError> {
        let current = self.inner.state.borrow().toggle_on.unwrap_or(false);
        self.submit(WriteValue::Switch(!current)).await
    }

    /// Submit the pending setpoint text.
    pub async fn submit_input(&self) -> Result<WriteOutcome, CoreError> {
        let text = self.inner.state.borrow().input.clone();
        let value = parse_setpoint(&text)?;
        self.submit(WriteValue::Setpoint(value)).await
    }

    /// Issue one write and wait for its outcome.
    ///
    /// Returns `Err` only when the submission is refused without a request
    /// (busy control, no session, bad value). A request that fails yields
    /// `Ok(WriteOutcome::Failure)`; the reason is logged and kept in
    /// [`ControlState::last_error`].
    pub async fn submit(&self, value: WriteValue) -> Result<WriteOutcome, CoreError> {
        let inner = &self.inner;
        if value.kind() != inner.kind {
            return Err(CoreError::ValidationFailed {
                message: format!("{} expects a {} value", inner.field, inner.kind),
            });
        }
        if let WriteValue::Setpoint(n) = value {
            if !n.is_finite() {
                return Err(CoreError::ValidationFailed {
                    message: "setpoint must be a finite number".into(),
                });
            }
        }
        let token = inner
            .dispatcher
            .session
            .token()
            .ok_or(CoreError::NotAuthenticated)?;

        self.begin()?;

        let intent = WriteIntent {
            target: inner.target.clone(),
            field: inner.field.clone(),
            value,
        };
        debug!(device = %intent.target, field = %intent.field, ?value, "submitting write");

        let result = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => {
                inner.state.send_modify(|s| s.outcome = WriteOutcome::Idle);
                return Err(CoreError::Cancelled);
            }
            r = send_write(&inner.dispatcher.api, &token, &intent) => r,
        };

        let outcome = match result {
            Ok(()) => {
                info!(device = %intent.target, field = %intent.field, "write accepted");
                inner.state.send_modify(|s| {
                    s.outcome = WriteOutcome::Success;
                    s.last_error = None;
                    match value {
                        WriteValue::Setpoint(_) => s.input.clear(),
                        WriteValue::Switch(on) => s.toggle_on = Some(on),
                    }
                });
                WriteOutcome::Success
            }
            Err(e) => {
                warn!(
                    device = %intent.target,
                    field = %intent.field,
                    error = %e,
                    "write failed"
                );
                let message = e.to_string();
                inner.state.send_modify(|s| {
                    s.outcome = WriteOutcome::Failure;
                    s.last_error = Some(message);
                });
                WriteOutcome::Failure
            }
        };

        self.schedule_reset();
        Ok(outcome)
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Atomically move idle -> in-flight, refusing otherwise.
    fn begin(&self) -> Result<(), CoreError> {
        let mut busy = None;
        self.inner.state.send_if_modified(|s| {
            if s.outcome == WriteOutcome::Idle {
                s.outcome = WriteOutcome::InFlight;
                true
            } else {
                busy = Some(s.outcome);
                false
            }
        });
        match busy {
            Some(outcome) => Err(CoreError::ControlBusy { outcome }),
            None => Ok(()),
        }
    }

    fn schedule_reset(&self) {
        let grace = match self.inner.kind {
            ControlKind::Toggle => self.inner.dispatcher.toggle_grace,
            ControlKind::Setpoint => self.inner.dispatcher.setpoint_grace,
        };
        // Hold only the sender and token: the timer must not keep the
        // control alive.
        let state = self.inner.state.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(grace) => {
                    state.send_modify(|s| s.outcome = WriteOutcome::Idle);
                }
            }
        });
    }
}

async fn send_write(api: &ApiClient, token: &SecretString, intent: &WriteIntent) -> Result<(), CoreError> {
    let request = WriteRequest {
        target_url: intent.target.clone(),
        node_name: intent.field.clone(),
        value: intent.value.into(),
    };
    api.write_value(token, &request).await?;
    Ok(())
}

/// Parse setpoint text. Empty input is refused.
pub fn parse_setpoint(text: &str) -> Result<f64, CoreError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationFailed {
            message: "a setpoint value is required".into(),
        });
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(CoreError::ValidationFailed {
            message: format!("'{trimmed}' is not a number"),
        }),
    }
}
