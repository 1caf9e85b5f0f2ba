//! WebSocket client actor
//!
//! One `WebSocketClient` exists per accepted connection. It owns the
//! bounded outbound queue, the split socket halves and the active
//! connection state, and runs the two pumps that bridge the socket and
//! the hub for the connection's lifetime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, trace, warn};

use crate::error::RelayError;
use crate::hub::{Client, ClientHandle, HubHandle};
use crate::message::{Envelope, Payload};
use crate::states::{Connected, ConnectionState};
use crate::types::ClientId;

/// Capacity of the per-client outbound queue
///
/// When the queue is full, the newest envelope is dropped rather than
/// blocking the sender.
pub const SEND_QUEUE_CAPACITY: usize = 256;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Bookkeeping around the active connection state
///
/// `active` marks the thread currently running a hook or handler. While
/// it is set, transition and dispatch requests from inside that callback
/// land in the queues and are applied, in order, once the callback
/// returns; other threads wait for the cell to go idle instead.
struct StateCell {
    state: Option<Box<dyn ConnectionState>>,
    active: Option<ThreadId>,
    queued_transitions: VecDeque<Option<Box<dyn ConnectionState>>>,
    queued_messages: VecDeque<(ClientId, Payload)>,
}

/// Per-connection actor bridging one WebSocket and the hub
pub struct WebSocketClient {
    id: AtomicU64,
    hub: HubHandle,
    self_ref: Weak<WebSocketClient>,
    state: Mutex<StateCell>,
    state_idle: Condvar,
    outbound_tx: Mutex<Option<mpsc::Sender<Envelope>>>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    sink: Mutex<Option<WsSink>>,
    stream: Mutex<Option<WsStream>>,
    shutdown: Notify,
    closed: AtomicBool,
}

impl WebSocketClient {
    /// Factory for [`HubHandle::serve`]: upgrade the TCP stream to a
    /// WebSocket and build the actor on top of it
    pub async fn accept(hub: HubHandle, stream: TcpStream) -> Result<ClientHandle, RelayError> {
        let socket = tokio_tungstenite::accept_async(stream).await?;
        Ok(Self::new(hub, socket))
    }

    /// Build the actor on an already-upgraded socket
    pub fn new(hub: HubHandle, socket: WebSocketStream<TcpStream>) -> Arc<WebSocketClient> {
        let (sink, stream) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(SEND_QUEUE_CAPACITY);

        Arc::new_cyclic(|me| WebSocketClient {
            id: AtomicU64::new(0),
            hub,
            self_ref: me.clone(),
            state: Mutex::new(StateCell {
                state: None,
                active: None,
                queued_transitions: VecDeque::new(),
                queued_messages: VecDeque::new(),
            }),
            state_idle: Condvar::new(),
            outbound_tx: Mutex::new(Some(outbound_tx)),
            outbound_rx: Mutex::new(Some(outbound_rx)),
            sink: Mutex::new(Some(sink)),
            stream: Mutex::new(Some(stream)),
            shutdown: Notify::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Non-blocking enqueue; a full queue drops the envelope
    fn enqueue(&self, envelope: Envelope) {
        let guard = self.outbound_tx.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            debug!("Client {}: closed, dropping outbound message", self.id());
            return;
        };
        match tx.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                warn!(
                    "Client {}: send queue full, dropping {} message",
                    self.id(),
                    envelope.payload.kind()
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Client {}: send queue closed, dropping outbound message", self.id());
            }
        }
    }

    /// Submit our own handle to the hub's unregister channel
    fn unregister_self(&self) {
        if let Some(me) = self.self_ref.upgrade() {
            self.hub.unregister(me);
        }
    }

    /// Claim exclusive use of the state cell, waiting out another
    /// thread's in-flight callbacks, and take the parked state
    ///
    /// Returns `None` when this thread already holds the claim, meaning
    /// the caller sits inside one of this client's own hooks or handlers
    /// and must queue its request instead of recursing.
    fn claim_state(&self) -> Option<Option<Box<dyn ConnectionState>>> {
        let mut cell = self.state.lock().unwrap();
        if cell.active == Some(thread::current().id()) {
            return None;
        }
        while cell.active.is_some() {
            cell = self.state_idle.wait(cell).unwrap();
        }
        cell.active = Some(thread::current().id());
        Some(cell.state.take())
    }

    /// Run one transition: exit hook, then enter hook, both with the cell
    /// lock released
    fn run_swap(
        &self,
        current: Option<Box<dyn ConnectionState>>,
        mut next: Option<Box<dyn ConnectionState>>,
    ) -> Option<Box<dyn ConnectionState>> {
        let leaving = current.as_ref().map(|state| state.name()).unwrap_or("none");
        let entering = next.as_ref().map(|state| state.name()).unwrap_or("none");
        debug!("Client {}: switching from state {} to {}", self.id(), leaving, entering);

        if let Some(mut old) = current {
            old.on_exit(self);
        }
        if let Some(state) = next.as_mut() {
            state.on_enter(self);
        }
        next
    }

    /// Apply the work queued by re-entrant calls, then park the state and
    /// release the claim
    ///
    /// Transitions settle before queued messages run. The queues only
    /// fill while this thread holds the claim, so once both read empty
    /// the cell can be parked without another check.
    fn settle(&self, mut current: Option<Box<dyn ConnectionState>>) {
        loop {
            let mut cell = self.state.lock().unwrap();
            if let Some(next) = cell.queued_transitions.pop_front() {
                drop(cell);
                current = self.run_swap(current.take(), next);
            } else if let Some((sender, payload)) = cell.queued_messages.pop_front() {
                drop(cell);
                match current.as_mut() {
                    Some(state) => state.handle_message(self, sender, payload),
                    None => trace!("Client {}: no active state, dropping message", self.id()),
                }
            } else {
                cell.state = current.take();
                cell.active = None;
                drop(cell);
                self.state_idle.notify_all();
                return;
            }
        }
    }
}

#[async_trait]
impl Client for WebSocketClient {
    fn id(&self) -> ClientId {
        ClientId(self.id.load(Ordering::Relaxed))
    }

    fn initialize(&self, id: ClientId) {
        self.id.store(id.0, Ordering::Relaxed);
        if self.closed.load(Ordering::SeqCst) {
            // Closed while the registration was still queued: withdraw
            // the fresh entry instead of attaching a state to a dead
            // connection.
            self.unregister_self();
            return;
        }
        self.set_state(Some(Box::new(Connected)));
        if self.closed.load(Ordering::SeqCst) {
            // close() landed during the attach; its own detach may have
            // run before the attach did, so detach here.
            self.set_state(None);
        }
    }

    fn set_state(&self, next: Option<Box<dyn ConnectionState>>) {
        let Some(current) = self.claim_state() else {
            // Requested from inside a hook or handler; applied once the
            // running callback returns.
            self.state.lock().unwrap().queued_transitions.push_back(next);
            return;
        };

        let settled = self.run_swap(current, next);
        self.settle(settled);
    }

    fn dispatch(&self, sender: ClientId, payload: Payload) {
        let Some(mut current) = self.claim_state() else {
            // Re-entered from this client's own running handler, as peer
            // cycles do; runs once that handler returns.
            self.state.lock().unwrap().queued_messages.push_back((sender, payload));
            return;
        };

        match current.as_mut() {
            Some(state) => state.handle_message(self, sender, payload),
            None => trace!("Client {}: no active state, dropping message", self.id()),
        }
        self.settle(current);
    }

    fn send_to_self(&self, payload: Payload) {
        self.send_as(payload, self.id());
    }

    fn send_as(&self, payload: Payload, sender: ClientId) {
        self.enqueue(Envelope {
            sender_id: sender,
            payload,
        });
    }

    fn pass_to_peer(&self, payload: Payload, peer: ClientId) {
        if let Some(target) = self.hub.clients().get(peer) {
            target.dispatch(self.id(), payload);
        }
    }

    fn broadcast(&self, payload: Payload) {
        self.hub.broadcast(Envelope {
            sender_id: self.id(),
            payload,
        });
    }

    async fn outbound_pump(self: Arc<Self>) {
        let taken = {
            let rx = self.outbound_rx.lock().unwrap().take();
            let sink = self.sink.lock().unwrap().take();
            rx.zip(sink)
        };
        let Some((mut rx, mut sink)) = taken else {
            error!("Client {}: outbound pump already started", self.id());
            return;
        };

        while let Some(envelope) = rx.recv().await {
            let bytes = match envelope.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!(
                        "Client {}: error encoding {} message: {}",
                        self.id(),
                        envelope.payload.kind(),
                        e
                    );
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Binary(bytes)).await {
                error!("Client {}: error writing message: {}", self.id(), e);
                self.close("write error");
                break;
            }
        }

        // Queue closed: every previously accepted envelope has been
        // written. Shut the write side down.
        let _ = sink.close().await;
        debug!("Client {}: closing write pump", self.id());
    }

    async fn inbound_pump(self: Arc<Self>) {
        let taken = self.stream.lock().unwrap().take();
        let Some(mut stream) = taken else {
            error!("Client {}: inbound pump already started", self.id());
            return;
        };

        loop {
            tokio::select! {
                received = stream.next() => {
                    let message = match received {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            debug!("Client {}: read error: {}", self.id(), e);
                            break;
                        }
                        None => break,
                    };

                    let data = match message {
                        Message::Binary(data) => data,
                        Message::Text(text) => text.into_bytes(),
                        Message::Close(_) => break,
                        // Pings are answered by tungstenite itself.
                        _ => continue,
                    };

                    match Envelope::decode(&data) {
                        Ok(mut envelope) => {
                            if envelope.sender_id.is_unset() {
                                envelope.sender_id = self.id();
                            }
                            self.dispatch(envelope.sender_id, envelope.payload);
                        }
                        Err(e) => {
                            warn!("Client {}: dropping malformed frame: {}", self.id(), e);
                        }
                    }
                }
                _ = self.shutdown.notified() => break,
            }
        }

        debug!("Client {}: closing read pump", self.id());
        self.close("read pump closed");
    }

    fn close(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Client {}: closing client: {}", self.id(), reason);

        self.set_state(None);
        // The hub reads the identity when it processes the event, so an
        // id assigned after this point is still the one removed.
        self.unregister_self();
        // Dropping the sender lets the outbound pump drain what is queued
        // and then close the socket's write side.
        self.outbound_tx.lock().unwrap().take();
        self.shutdown.notify_one();
    }
}
