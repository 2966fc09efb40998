// ── Core error types ──
//
// Domain errors from scadalink-core. Consumers never see raw HTTP or
// WebSocket errors; the `From<scadalink_api::Error>` impl translates
// transport-layer failures into these variants.

use thiserror::Error;

use crate::command::WriteOutcome;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach telemetry server: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Rejected by server (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Control is busy ({outcome})")]
    ControlBusy { outcome: WriteOutcome },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Unexpected server response: {message}")]
    InvalidResponse { message: String },

    // ── Storage / configuration ──────────────────────────────────────
    #[error("Credential storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error means the session token is no longer valid.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::NotAuthenticated)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<scadalink_api::Error> for CoreError {
    fn from(err: scadalink_api::Error) -> Self {
        use scadalink_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- log in again".into(),
            },
            Api::Forbidden { message } => CoreError::Rejected {
                status: 403,
                message,
            },
            Api::Api { status, message } => CoreError::Rejected { status, message },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Transport(e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if let Some(status) = e.status() {
                    CoreError::Rejected {
                        status: status.as_u16(),
                        message: e.to_string(),
                    }
                } else {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                }
            }
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed { reason },
            Api::Tls(message) => CoreError::ConnectionFailed {
                reason: format!("TLS: {message}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid server URL: {e}"),
            },
            Api::Deserialization { message, .. } => CoreError::InvalidResponse { message },
        }
    }
}
