//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use scadalink_config::ConfigError;
use scadalink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const BUSY: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the telemetry server")]
    #[diagnostic(
        code(scadalink::connection_failed),
        help(
            "Check that the server is running and accessible.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(scadalink::auth_failed),
        help("Verify your username and password, then run: scadalink login")
    )]
    AuthFailed { message: String },

    #[error("Not logged in")]
    #[diagnostic(
        code(scadalink::not_logged_in),
        help("Run: scadalink login")
    )]
    NotLoggedIn,

    #[error("Session rejected. Please log in again.")]
    #[diagnostic(
        code(scadalink::session_rejected),
        help("The stored token was discarded. Run: scadalink login")
    )]
    SessionRejected,

    #[error("Permission denied: {message}")]
    #[diagnostic(
        code(scadalink::forbidden),
        help("Writes and park administration require an active superuser account. Check with: scadalink whoami")
    )]
    Forbidden { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(scadalink::not_found),
        help("Run: scadalink {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("'{field}' is not a writable data point")]
    #[diagnostic(
        code(scadalink::not_writable),
        help("Writable points are the toggle and setpoint user-commands of the classifier tables.")
    )]
    NotWritable { field: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Server error (HTTP {status}): {message}")]
    #[diagnostic(code(scadalink::api_error))]
    ApiError { status: u16, message: String },

    #[error("Write of {field} failed: {message}")]
    #[diagnostic(code(scadalink::write_failed))]
    WriteFailed { field: String, message: String },

    #[error("A write to this control is already pending")]
    #[diagnostic(code(scadalink::busy))]
    Busy,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(scadalink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(scadalink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: scadalink config init --server <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(scadalink::no_config),
        help(
            "Create a profile with: scadalink config init --server <URL>\n\
             Or pass --server / set SCADALINK_SERVER.\n\
             Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(scadalink::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(scadalink::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("{0}")]
    #[diagnostic(code(scadalink::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NotLoggedIn | Self::SessionRejected => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Forbidden { .. } => exit_code::PERMISSION,
            Self::Busy => exit_code::BUSY,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NotWritable { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::NotAuthenticated => CliError::NotLoggedIn,

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Rejected { status: 401, .. } => CliError::SessionRejected,

            CoreError::Rejected {
                status: 403,
                message,
            } => CliError::Forbidden { message },

            CoreError::Rejected { status, message } => CliError::ApiError { status, message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "value".into(),
                reason: message,
            },

            CoreError::ControlBusy { .. } => CliError::Busy,

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "Device".into(),
                identifier,
                list_command: "snapshot".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::InvalidResponse { message }
            | CoreError::Storage { message }
            | CoreError::Internal(message) => CliError::Internal(message),

            CoreError::Cancelled => CliError::Internal("operation cancelled".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_exit_codes() {
        let cases = [
            (CoreError::NotAuthenticated, exit_code::AUTH),
            (
                CoreError::Rejected {
                    status: 401,
                    message: String::new(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::Rejected {
                    status: 403,
                    message: "Only superusers can write values".into(),
                },
                exit_code::PERMISSION,
            ),
            (
                CoreError::Rejected {
                    status: 404,
                    message: "PLC not found".into(),
                },
                exit_code::GENERAL,
            ),
            (CoreError::Timeout { timeout_secs: 10 }, exit_code::TIMEOUT),
            (
                CoreError::DeviceNotFound {
                    identifier: "plc9".into(),
                },
                exit_code::NOT_FOUND,
            ),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }
}
