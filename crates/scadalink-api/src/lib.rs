//! Async client for the SCADA telemetry backend.
//!
//! Two surfaces:
//!
//! - **REST** ([`ApiClient`]): login, current user, initial data, node
//!   write-back, and superuser park-access management, authenticated with
//!   a bearer token.
//! - **Live stream** ([`websocket`]): a WebSocket that pushes complete
//!   device snapshots, parsed with [`telemetry::parse_frame`].

pub mod client;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod transport;
pub mod websocket;

pub use client::ApiClient;
pub use error::Error;
pub use models::{
    AdminUserRecord, DeviceRecord, LinkStatus, UserQuery, UserRecord, WriteRequest, WriteValue,
};
pub use telemetry::{Frame, parse_frame};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{LiveStream, StreamEvent};
