//! Recording test doubles shared by the unit tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

use crate::hub::Client;
use crate::message::Payload;
use crate::states::ConnectionState;
use crate::types::ClientId;

/// One observed capability call on a [`RecordingClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Initialized(ClientId),
    Dispatched(ClientId, Payload),
    SendToSelf(Payload),
    SendAs(Payload, ClientId),
    PassToPeer(Payload, ClientId),
    Broadcast(Payload),
    OutboundPumpStarted,
    InboundPumpStarted,
    Closed(String),
}

/// Client double that records every capability call instead of touching a
/// socket
pub struct RecordingClient {
    id: AtomicU64,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self {
            id: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_id(id: ClientId) -> Self {
        let client = Self::new();
        client.id.store(id.0, Ordering::Relaxed);
        client
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Just the dispatched messages, as (sender, payload) pairs
    pub fn dispatched(&self) -> Vec<(ClientId, Payload)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Dispatched(sender, payload) => Some((sender, payload)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Client for RecordingClient {
    fn id(&self) -> ClientId {
        ClientId(self.id.load(Ordering::Relaxed))
    }

    fn initialize(&self, id: ClientId) {
        self.record(RecordedCall::Initialized(id));
        self.id.store(id.0, Ordering::Relaxed);
    }

    fn set_state(&self, _next: Option<Box<dyn ConnectionState>>) {}

    fn dispatch(&self, sender: ClientId, payload: Payload) {
        self.record(RecordedCall::Dispatched(sender, payload));
    }

    fn send_to_self(&self, payload: Payload) {
        self.record(RecordedCall::SendToSelf(payload));
    }

    fn send_as(&self, payload: Payload, sender: ClientId) {
        self.record(RecordedCall::SendAs(payload, sender));
    }

    fn pass_to_peer(&self, payload: Payload, peer: ClientId) {
        self.record(RecordedCall::PassToPeer(payload, peer));
    }

    fn broadcast(&self, payload: Payload) {
        self.record(RecordedCall::Broadcast(payload));
    }

    async fn outbound_pump(self: Arc<Self>) {
        self.record(RecordedCall::OutboundPumpStarted);
    }

    async fn inbound_pump(self: Arc<Self>) {
        self.record(RecordedCall::InboundPumpStarted);
    }

    fn close(&self, reason: &str) {
        self.record(RecordedCall::Closed(reason.to_string()));
    }
}

/// State double that appends its hook invocations to a shared log
pub struct RecordingState {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingState {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { name, log }
    }
}

impl ConnectionState for RecordingState {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_enter(&mut self, _client: &dyn Client) {
        self.log.lock().unwrap().push(format!("enter {}", self.name));
    }

    fn on_exit(&mut self, _client: &dyn Client) {
        self.log.lock().unwrap().push(format!("exit {}", self.name));
    }

    fn handle_message(&mut self, _client: &dyn Client, sender: ClientId, _payload: Payload) {
        self.log
            .lock()
            .unwrap()
            .push(format!("message from {} in {}", sender, self.name));
    }
}

/// Poll `condition` every 10ms for up to two seconds
pub async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A connected (server side, client side) TCP stream pair over loopback
pub async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
    let connected = TcpStream::connect(addr).await.unwrap();
    (accept.await.unwrap(), connected)
}
