// TelemetryClient supervisor tests: session changes drive the channel.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scadalink_api::{ApiClient, TransportConfig};
use scadalink_core::{
    ChannelState, ClientConfig, CoreError, MemoryTokenStore, Session, TelemetryClient, UserQuery,
};
use uuid::Uuid;

use common::{FakeTransport, LINE1_FRAME, closed, text};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(url: &str) -> ClientConfig {
    let mut config = ClientConfig::new(Url::parse(url).unwrap());
    config.reconnect_delay = Duration::from_secs(60);
    config.seed_snapshot = false;
    config
}

fn fake_client(
    session: Session,
    transport: Arc<FakeTransport>,
) -> TelemetryClient<FakeTransport> {
    let config = config("http://127.0.0.1:9");
    let api = config.api_client().unwrap();
    TelemetryClient::with_transport(config, session, api, transport)
}

async fn wait_state(rx: &mut watch::Receiver<ChannelState>, want: ChannelState) {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want:?}"))
        .unwrap();
}

async fn wait_devices(client: &TelemetryClient<impl scadalink_core::StreamTransport>, n: usize) {
    let mut rx = client.devices();
    tokio::time::timeout(Duration::from_secs(2), async {
        while rx.current().len() != n {
            if rx.changed().await.is_none() {
                break;
            }
        }
    })
    .await
    .unwrap();
}

// ── Session following ───────────────────────────────────────────────

#[tokio::test]
async fn test_starts_channel_for_restored_token() {
    let transport = FakeTransport::new();
    let tx = transport.accept();
    let client = fake_client(
        Session::restore(MemoryTokenStore::with_token("abc123")),
        Arc::clone(&transport),
    );
    let mut state = client.subscribe_state();

    client.start().await;
    wait_state(&mut state, ChannelState::Connected).await;
    assert_eq!(transport.tokens(), ["abc123"]);

    tx.send(text(LINE1_FRAME)).unwrap();
    wait_devices(&client, 1).await;
    assert_eq!(client.snapshot()[0].name, "Line1");

    client.stop().await;
    assert_eq!(client.state(), ChannelState::Stopped);
}

#[tokio::test]
async fn test_no_token_stays_idle() {
    let transport = FakeTransport::new();
    let client = fake_client(Session::in_memory(), Arc::clone(&transport));

    client.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.state(), ChannelState::Idle);
    assert_eq!(transport.opens(), 0);
    client.stop().await;
}

#[tokio::test]
async fn test_logout_clears_snapshot_and_goes_idle() {
    let transport = FakeTransport::new();
    let tx = transport.accept();
    let client = fake_client(
        Session::restore(MemoryTokenStore::with_token("abc123")),
        Arc::clone(&transport),
    );
    let mut state = client.subscribe_state();
    client.start().await;
    wait_state(&mut state, ChannelState::Connected).await;
    tx.send(text(LINE1_FRAME)).unwrap();
    wait_devices(&client, 1).await;

    client.logout();
    wait_state(&mut state, ChannelState::Idle).await;

    assert!(client.snapshot().is_empty());
    assert!(!client.session().is_authenticated());
    assert_eq!(transport.closes(), 1);
    client.stop().await;
}

#[tokio::test]
async fn test_auth_rejection_clears_session_and_stays_rejected() {
    let transport = FakeTransport::new();
    let tx = transport.accept();
    let client = fake_client(
        Session::restore(MemoryTokenStore::with_token("stale")),
        Arc::clone(&transport),
    );
    let mut state = client.subscribe_state();
    client.start().await;
    wait_state(&mut state, ChannelState::Connected).await;

    tx.send(closed(4001)).unwrap();
    wait_state(&mut state, ChannelState::AuthRejected).await;

    let mut session = client.session().subscribe();
    tokio::time::timeout(Duration::from_secs(2), session.wait_for(Option::is_none))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.state(), ChannelState::AuthRejected);
    assert_eq!(
        client.state().status_text(),
        "Session rejected. Please log in again."
    );
    assert_eq!(transport.opens(), 1);
    client.stop().await;
}

#[tokio::test]
async fn test_new_token_starts_fresh_channel() {
    let transport = FakeTransport::new();
    let first = transport.accept();
    let _second = transport.accept();
    let client = fake_client(
        Session::restore(MemoryTokenStore::with_token("one")),
        Arc::clone(&transport),
    );
    let mut state = client.subscribe_state();
    client.start().await;
    wait_state(&mut state, ChannelState::Connected).await;
    first.send(text(LINE1_FRAME)).unwrap();
    wait_devices(&client, 1).await;

    client
        .session()
        .set_token(SecretString::from("two"))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while transport.opens() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    wait_state(&mut state, ChannelState::Connected).await;

    assert_eq!(transport.tokens(), ["one", "two"]);
    assert!(client.snapshot().is_empty());
    client.stop().await;
}

#[tokio::test]
async fn test_write_control_rejects_non_writable_field() {
    let client = fake_client(Session::in_memory(), FakeTransport::new());

    let err = client
        .write_control("plc1", "Active_Power_kW")
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
    assert!(client.write_control("plc1", "CMD_Instant_Cutoff").is_ok());
}

// ── REST ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_sets_token_and_refresh_publishes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/jwt/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "jwt-1", "token_type": "bearer" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plc_clients": [
                { "url": "plc1", "name": "Line1", "status": "CONNECTED", "nodes": {} },
                { "url": "plc2", "name": "Line2", "status": "DISCONNECTED", "error": "timeout", "nodes": {} }
            ]
        })))
        .mount(&server)
        .await;

    let config = config(&server.uri());
    let api = ApiClient::new(config.url.clone(), &TransportConfig::default()).unwrap();
    let client = TelemetryClient::with_transport(config, Session::in_memory(), api, FakeTransport::new());

    client
        .login("operator", &SecretString::from("hunter2"))
        .await
        .unwrap();
    assert!(client.session().is_authenticated());

    let snapshot = client.refresh().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_refresh_without_session_is_rejected() {
    let client = fake_client(Session::in_memory(), FakeTransport::new());
    let err = client.refresh().await.unwrap_err();
    assert!(matches!(err, CoreError::NotAuthenticated));
}

#[tokio::test]
async fn test_expired_stored_token_is_discarded_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Unauthorized" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server.uri());
    config.seed_snapshot = true;
    let client = TelemetryClient::new(config, Session::restore(MemoryTokenStore::with_token("expired")))
        .unwrap();
    let mut state = client.subscribe_state();
    client.start().await;

    wait_state(&mut state, ChannelState::AuthRejected).await;
    let mut session = client.session().subscribe();
    tokio::time::timeout(Duration::from_secs(2), session.wait_for(Option::is_none))
        .await
        .unwrap()
        .unwrap();
    client.stop().await;
}

// ── Park access ─────────────────────────────────────────────────────

const USER_ID: &str = "6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f";

fn admin_client(server: &MockServer) -> TelemetryClient<FakeTransport> {
    let config = config(&server.uri());
    let api = ApiClient::new(config.url.clone(), &TransportConfig::default()).unwrap();
    let session = Session::restore(MemoryTokenStore::with_token("root-token"));
    TelemetryClient::with_transport(config, session, api, FakeTransport::new())
}

#[tokio::test]
async fn test_users_are_converted_to_summaries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": USER_ID,
            "email": "ops@ridge.example",
            "is_superuser": false,
            "is_active": true
        }])))
        .mount(&server)
        .await;

    let client = admin_client(&server);
    let users = client.users(&UserQuery::default()).await.unwrap();
    assert_eq!(users[0].id, Uuid::parse_str(USER_ID).unwrap());
    assert_eq!(users[0].email, "ops@ridge.example");
    assert!(users[0].organization_id.is_none());
}

#[tokio::test]
async fn test_out_of_range_limit_is_refused_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = admin_client(&server);
    let query = UserQuery {
        limit: 0,
        ..UserQuery::default()
    };
    let err = client.users(&query).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_grant_trims_park_id_and_rejects_blank() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/admin/users/{USER_ID}/parks/north_ridge").as_str()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = admin_client(&server);
    let user = Uuid::parse_str(USER_ID).unwrap();
    client.grant_park(user, " north_ridge ").await.unwrap();

    let err = client.revoke_park(user, "   ").await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));
}

#[tokio::test]
async fn test_park_access_requires_session() {
    let client = fake_client(Session::in_memory(), FakeTransport::new());
    let err = client.parks().await.unwrap_err();
    assert!(matches!(err, CoreError::NotAuthenticated));
}

// ── End to end over WebSocket ───────────────────────────────────────

#[tokio::test]
async fn test_websocket_frames_reach_the_store() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::text(r#"{"type":"keepalive"}"#)).await.unwrap();
        ws.send(Message::text(format!(
            r#"{{"type":"telemetry_update","data":{{"plc_clients":{LINE1_FRAME}}}}}"#
        )))
        .await
        .unwrap();
        // Hold the connection open until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let client = TelemetryClient::new(
        config(&format!("http://{addr}")),
        Session::restore(MemoryTokenStore::with_token("abc123")),
    )
    .unwrap();
    let mut state = client.subscribe_state();
    client.start().await;

    wait_state(&mut state, ChannelState::Connected).await;
    wait_devices(&client, 1).await;
    let device = client.store().device_by_url("plc1").unwrap();
    assert_eq!(device.name, "Line1");

    client.stop().await;
    tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();
}
