//! Domain core for scadalink tools.
//!
//! - [`Session`]: the single owner of the session token, persisted through
//!   a [`TokenStore`].
//! - [`LiveChannel`]: one token-scoped streaming connection with fixed-delay
//!   reconnect and auth-rejection escalation.
//! - [`TelemetryClient`]: follows the session, owning the current channel
//!   and the [`SnapshotStore`].
//! - [`CommandDispatcher`] / [`WriteControl`]: write-back with a
//!   time-bounded per-control outcome.
//! - [`NodeClassifier`] and [`format_value`]: pure presentation helpers.

pub mod channel;
pub mod classify;
pub mod command;
pub mod config;
mod convert;
pub mod error;
pub mod format;
pub mod model;
pub mod session;
pub mod store;
pub mod stream;
pub mod telemetry;
pub mod transport;

pub use channel::{
    AuthFailedCallback, ChannelSettings, ChannelState, LiveChannel, StreamConnection,
    StreamTransport,
};
pub use classify::{Classification, ClassifierTables, NodeCategory, NodeClassifier};
pub use command::{
    CommandDispatcher, ControlKind, ControlState, WriteControl, WriteIntent, WriteOutcome,
    WriteValue,
};
pub use config::{ClientConfig, TlsVerification};
pub use error::CoreError;
pub use format::{DisplayValue, format_value, switch_is_on};
pub use model::{CurrentUser, DeviceSnapshot, DeviceStatus, UserSummary};
pub use session::{MemoryTokenStore, Session, TokenStore};
pub use store::{Snapshot, SnapshotStore};
pub use stream::SnapshotStream;
pub use telemetry::TelemetryClient;
pub use transport::WsTransport;

pub use scadalink_api::{StreamEvent, UserQuery};
