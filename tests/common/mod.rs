#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use signwire::core::device::StaticDeviceId;
use signwire::core::kernel::{ByteStream, Transport};
use signwire::core::notify::Notifier;
use signwire::core::session::MemorySessionStore;
use signwire::{ClientConfig, Envelope, PipelineError, RawResponse, SignedClient};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Transport that answers from a script and records what it was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<RawResponse, PipelineError>>>,
    streams: Mutex<VecDeque<Result<ByteStream, PipelineError>>>,
    sent: Mutex<Vec<(String, Envelope)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, reply: Result<RawResponse, PipelineError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_ok(&self, result: Value) {
        self.reply(Ok(RawResponse::new(
            200,
            json!({"success": true, "code": 200, "result": result}).to_string(),
        )));
    }

    pub fn reply_code(&self, code: i64, message: &str) {
        self.reply(Ok(RawResponse::new(
            200,
            json!({"success": false, "errorCode": code, "errorMessages": message}).to_string(),
        )));
    }

    pub fn stream_parts(&self, parts: &[&'static str]) {
        let items: Vec<Result<Bytes, PipelineError>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(futures_util::stream::iter(items).boxed()));
    }

    /// Stream fed by the returned sender; ends when the sender is dropped
    pub fn stream_channel(&self) -> mpsc::UnboundedSender<Result<Bytes, PipelineError>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let body = futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)).boxed();
        self.streams.lock().unwrap().push_back(Ok(body));
        tx
    }

    pub fn stream_fail(&self, err: PipelineError) {
        self.streams.lock().unwrap().push_back(Err(err));
    }

    pub fn sent(&self) -> Vec<(String, Envelope)> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, endpoint: &str, envelope: &Envelope) {
        self.sent
            .lock()
            .unwrap()
            .push((endpoint.to_string(), envelope.clone()));
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, endpoint: &str, envelope: &Envelope) -> Result<RawResponse, PipelineError> {
        self.record(endpoint, envelope);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::Transport("no scripted reply".into())))
    }

    async fn open_stream(
        &self,
        endpoint: &str,
        envelope: &Envelope,
    ) -> Result<ByteStream, PipelineError> {
        self.record(endpoint, envelope);
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::Transport("no scripted stream".into())))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

pub struct Harness {
    pub client: SignedClient,
    pub transport: Arc<ScriptedTransport>,
    pub session: Arc<MemorySessionStore>,
    pub notifications: Arc<RecordingNotifier>,
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new("https://api.test.local").debounce_window(Duration::from_millis(800))
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: ClientConfig) -> Harness {
    let transport = ScriptedTransport::new();
    let session = Arc::new(MemorySessionStore::new());
    let notifications = Arc::new(RecordingNotifier::default());

    let client = SignedClient::builder(config)
        .with_transport(transport.clone())
        .with_session_store(session.clone())
        .with_device_id(Arc::new(StaticDeviceId::new("device-test")))
        .with_notifier(notifications.clone())
        .build()
        .expect("client builds with injected transport");

    Harness {
        client,
        transport,
        session,
        notifications,
    }
}

/// Let any debounce window elapse (tests run with a paused clock)
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(2)).await;
}
