// ── Runtime client configuration ──
//
// These types describe how to reach the telemetry backend and tune the
// live channel and write controls. They never touch disk: the CLI builds a
// `ClientConfig` (usually via scadalink-config) and hands it in.

use std::time::Duration;

use url::Url;

use crate::classify::NodeClassifier;

/// Default fixed reconnect delay.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
/// Close code the backend uses to reject a session on the live stream.
pub const DEFAULT_AUTH_CLOSE_CODE: u16 = 4001;
/// How long a toggle write outcome stays visible before reverting to idle.
pub const DEFAULT_TOGGLE_GRACE: Duration = Duration::from_millis(1500);
/// How long a setpoint write outcome stays visible before reverting to idle.
pub const DEFAULT_SETPOINT_GRACE: Duration = Duration::from_millis(2000);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed plant servers).
    DangerAcceptInvalid,
}

/// Configuration for one telemetry backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (e.g., `https://scada.example.com`).
    pub url: Url,
    pub tls: TlsVerification,
    /// Per-request timeout for REST calls.
    pub timeout: Duration,
    /// Path of the live stream endpoint.
    pub stream_path: String,
    /// Fixed delay between a transient disconnect and the next attempt.
    pub reconnect_delay: Duration,
    /// Close code that signals authentication rejection.
    pub auth_close_code: u16,
    pub toggle_grace: Duration,
    pub setpoint_grace: Duration,
    /// Seed the snapshot from `GET /data` when a channel starts.
    pub seed_snapshot: bool,
    pub classifier: NodeClassifier,
}

impl ClientConfig {
    /// Config for `url` with every tunable at its default.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            stream_path: "/ws".into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            auth_close_code: DEFAULT_AUTH_CLOSE_CODE,
            toggle_grace: DEFAULT_TOGGLE_GRACE,
            setpoint_grace: DEFAULT_SETPOINT_GRACE,
            seed_snapshot: true,
            classifier: NodeClassifier::default(),
        }
    }

    pub(crate) fn transport(&self) -> scadalink_api::TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => scadalink_api::TlsMode::System,
            TlsVerification::CustomCa(path) => scadalink_api::TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => scadalink_api::TlsMode::DangerAcceptInvalid,
        };
        scadalink_api::TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }

    /// Build the REST client this config describes.
    pub fn api_client(&self) -> Result<scadalink_api::ApiClient, crate::CoreError> {
        Ok(
            scadalink_api::ApiClient::new(self.url.clone(), &self.transport())?
                .with_stream_path(self.stream_path.clone()),
        )
    }
}
