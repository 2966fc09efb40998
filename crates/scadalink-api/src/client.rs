// REST client for the telemetry backend.
//
// Wraps `reqwest::Client` with endpoint construction, bearer auth, and the
// backend's `{"detail": ...}` error convention. The live stream is opened
// separately through `websocket::connect` using `stream_url`.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    AdminUserRecord, DataResponse, DeviceRecord, ErrorBody, LoginResponse, UserQuery, UserRecord,
    WriteRequest,
};
use crate::transport::TransportConfig;

const LOGIN_PATH: &str = "/auth/jwt/login";
const ME_PATH: &str = "/me";
const DATA_PATH: &str = "/data";
const WRITE_PATH: &str = "/write_value";
const ADMIN_PARKS_PATH: &str = "/admin/parks";
const ADMIN_USERS_PATH: &str = "/admin/users";
const DEFAULT_STREAM_PATH: &str = "/ws";

/// HTTP client for the backend's REST surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    stream_path: String,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the backend root, e.g. `https://scada.example.com`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            stream_path: DEFAULT_STREAM_PATH.to_owned(),
            timeout: transport.timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            stream_path: DEFAULT_STREAM_PATH.to_owned(),
            timeout: TransportConfig::default().timeout,
        }
    }

    /// Override the live stream path (default `/ws`).
    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL construction ─────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    /// `/admin/users/{user_id}/parks[/{park_id}]`, with `park_id` escaped
    /// as a single path segment.
    fn user_parks_url(&self, user_id: Uuid, park_id: Option<&str>) -> Result<Url, Error> {
        let mut url = self.endpoint(ADMIN_USERS_PATH)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty();
            segments.push(&user_id.to_string()).push("parks");
            if let Some(park) = park_id {
                segments.push(park);
            }
        }
        Ok(url)
    }

    /// WebSocket URL for the live stream, carrying `token` as a query
    /// parameter. `http` maps to `ws` and `https` to `wss`.
    pub fn stream_url(&self, token: &SecretString) -> Result<Url, Error> {
        let mut url = self.endpoint(&self.stream_path)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme).map_err(|()| {
            Error::WebSocketConnect(format!("cannot derive stream URL from {}", self.base_url))
        })?;
        url.query_pairs_mut()
            .append_pair("token", token.expose_secret());
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Exchange credentials for a session token.
    ///
    /// Any rejection collapses to a generic `Authentication` error so the
    /// caller never learns which half of the credential pair was wrong.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString, Error> {
        let url = self.endpoint(LOGIN_PATH)?;
        debug!(%url, "logging in");

        let resp = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password.expose_secret())])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "login rejected");
            return Err(Error::Authentication {
                message: "Login failed".into(),
            });
        }

        let body: LoginResponse = parse_json(resp).await?;
        if body.access_token.is_empty() {
            return Err(Error::Authentication {
                message: "Login failed".into(),
            });
        }
        Ok(SecretString::from(body.access_token))
    }

    /// Fetch the account that owns `token`.
    pub async fn current_user(&self, token: &SecretString) -> Result<UserRecord, Error> {
        self.get_json(ME_PATH, token).await
    }

    /// Fetch the current device list without waiting for a push frame.
    pub async fn initial_data(&self, token: &SecretString) -> Result<Vec<DeviceRecord>, Error> {
        let body: DataResponse = self.get_json(DATA_PATH, token).await?;
        Ok(body.plc_clients)
    }

    /// Write one node value on a PLC.
    pub async fn write_value(&self, token: &SecretString, request: &WriteRequest) -> Result<(), Error> {
        let url = self.endpoint(WRITE_PATH)?;
        debug!(
            %url,
            target = %request.target_url,
            node = %request.node_name,
            "writing node value"
        );

        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        check_status(resp).await.map(drop)
    }

    // ── Park access (superuser only) ─────────────────────────────────

    /// Park ids known to the backend.
    pub async fn list_parks(&self, token: &SecretString) -> Result<Vec<String>, Error> {
        self.get_json(ADMIN_PARKS_PATH, token).await
    }

    /// Accounts matching `query`, ordered by email.
    pub async fn list_users(
        &self,
        token: &SecretString,
        query: &UserQuery,
    ) -> Result<Vec<AdminUserRecord>, Error> {
        let url = self.endpoint(ADMIN_USERS_PATH)?;
        debug!(%url, limit = query.limit, offset = query.offset, "listing users");
        self.fetch_json(self.http.get(url).query(query), token).await
    }

    /// Park ids `user_id` may see. Parks decide which PLCs appear in
    /// `/data` and on the live stream.
    pub async fn user_parks(&self, token: &SecretString, user_id: Uuid) -> Result<Vec<String>, Error> {
        let url = self.user_parks_url(user_id, None)?;
        debug!(%url, "GET");
        self.fetch_json(self.http.get(url), token).await
    }

    /// Give `user_id` access to `park_id`. Granting twice is a no-op.
    pub async fn grant_park(&self, token: &SecretString, user_id: Uuid, park_id: &str) -> Result<(), Error> {
        let url = self.user_parks_url(user_id, Some(park_id))?;
        debug!(%url, "granting park access");
        self.send_empty(self.http.post(url), token).await
    }

    /// Remove `user_id`'s access to `park_id`. Revoking a missing grant is
    /// a no-op.
    pub async fn revoke_park(&self, token: &SecretString, user_id: Uuid, park_id: &str) -> Result<(), Error> {
        let url = self.user_parks_url(user_id, Some(park_id))?;
        debug!(%url, "revoking park access");
        self.send_empty(self.http.delete(url), token).await
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &SecretString) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        self.fetch_json(self.http.get(url), token).await
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: &SecretString,
    ) -> Result<T, Error> {
        let resp = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        parse_json(check_status(resp).await?).await
    }

    async fn send_empty(&self, request: RequestBuilder, token: &SecretString) -> Result<(), Error> {
        let resp = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        check_status(resp).await.map(drop)
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Map non-success statuses onto typed errors, passing successes through.
async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message())
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_owned()
            } else {
                body.clone()
            }
        });

    Err(match status {
        StatusCode::UNAUTHORIZED => Error::SessionExpired,
        StatusCode::FORBIDDEN => Error::Forbidden { message },
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    })
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let body = resp.text().await?;
    trace!(len = body.len(), "response body");
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
