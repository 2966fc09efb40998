// ── WebSocket stream transport ──
//
// Production `StreamTransport`: opens the backend's live stream via
// `scadalink_api::websocket` and seeds from `GET /data`.

use secrecy::SecretString;

use scadalink_api::{ApiClient, LiveStream, StreamEvent, websocket};

use crate::channel::{StreamConnection, StreamTransport};
use crate::error::CoreError;
use crate::model::DeviceSnapshot;

/// Live stream over WebSocket, authenticated by query-string token.
pub struct WsTransport {
    api: ApiClient,
}

impl WsTransport {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl StreamTransport for WsTransport {
    type Connection = LiveStream;

    async fn open(&self, token: &SecretString) -> Result<LiveStream, CoreError> {
        let url = self.api.stream_url(token)?;
        Ok(websocket::connect(&url).await?)
    }

    async fn initial_snapshot(
        &self,
        token: &SecretString,
    ) -> Result<Option<Vec<DeviceSnapshot>>, CoreError> {
        let records = self.api.initial_data(token).await?;
        Ok(Some(records.into_iter().map(DeviceSnapshot::from).collect()))
    }
}

impl StreamConnection for LiveStream {
    async fn next_event(&mut self) -> StreamEvent {
        LiveStream::next_event(self).await
    }

    async fn close(self) {
        LiveStream::close(self).await;
    }
}
