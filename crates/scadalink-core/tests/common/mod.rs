// Shared test doubles for the live channel.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;

use scadalink_core::{
    CoreError, DeviceSnapshot, DeviceStatus, StreamConnection, StreamEvent, StreamTransport,
};

/// What the next `open` call does.
enum Script {
    Accept(mpsc::UnboundedReceiver<StreamEvent>),
    Refuse(CoreError),
}

/// In-memory transport. Each `accept()` queues one connection and hands
/// back the sender that feeds it. With nothing queued, `open` hangs.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<VecDeque<Script>>,
    tokens: Mutex<Vec<String>>,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    seed: Mutex<Option<Vec<DeviceSnapshot>>>,
    seed_error: Mutex<Option<fn() -> CoreError>>,
    seeds: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept(&self) -> mpsc::UnboundedSender<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(Script::Accept(rx));
        tx
    }

    pub fn refuse(&self, err: CoreError) {
        self.scripts.lock().unwrap().push_back(Script::Refuse(err));
    }

    pub fn seed_with(&self, devices: Vec<DeviceSnapshot>) {
        *self.seed.lock().unwrap() = Some(devices);
    }

    /// Make every later `initial_snapshot` call fail with `make()`.
    pub fn fail_seed(&self, make: fn() -> CoreError) {
        *self.seed_error.lock().unwrap() = Some(make);
    }

    pub fn seeds(&self) -> usize {
        self.seeds.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

pub struct FakeConnection {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    closes: Arc<AtomicUsize>,
}

impl StreamConnection for FakeConnection {
    async fn next_event(&mut self) -> StreamEvent {
        match self.rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    async fn close(self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl StreamTransport for FakeTransport {
    type Connection = FakeConnection;

    async fn open(&self, token: &SecretString) -> Result<FakeConnection, CoreError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .push(token.expose_secret().to_owned());
        let next = self.scripts.lock().unwrap().pop_front();
        match next {
            Some(Script::Accept(rx)) => Ok(FakeConnection {
                rx,
                closes: Arc::clone(&self.closes),
            }),
            Some(Script::Refuse(err)) => Err(err),
            None => std::future::pending().await,
        }
    }

    async fn initial_snapshot(
        &self,
        _token: &SecretString,
    ) -> Result<Option<Vec<DeviceSnapshot>>, CoreError> {
        self.seeds.fetch_add(1, Ordering::SeqCst);
        let failing = *self.seed_error.lock().unwrap();
        if let Some(make) = failing {
            return Err(make());
        }
        Ok(self.seed.lock().unwrap().clone())
    }
}

// ── Frames ──────────────────────────────────────────────────────────

pub fn text(frame: &str) -> StreamEvent {
    StreamEvent::Text(frame.to_owned())
}

pub fn closed(code: u16) -> StreamEvent {
    StreamEvent::Closed {
        code: Some(code),
        reason: String::new(),
    }
}

pub const LINE1_FRAME: &str = r#"[{"url":"plc1","name":"Line1","status":"CONNECTED","nodes":{"CMD_Instant_Cutoff":"[True, False]"}}]"#;

pub fn device(url: &str, name: &str) -> DeviceSnapshot {
    DeviceSnapshot {
        url: url.into(),
        name: name.into(),
        status: DeviceStatus::Connected,
        error: None,
        nodes: IndexMap::new(),
    }
}
