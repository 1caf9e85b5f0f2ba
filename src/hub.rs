//! Hub actor and the client capability set
//!
//! The hub is the central point of coordination between all connected
//! clients. It owns the registry and three channels (register,
//! unregister, broadcast) and drains them one event at a time on a single
//! loop, so registry membership has exactly one writer.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::RelayError;
use crate::message::{Envelope, Payload};
use crate::registry::Registry;
use crate::states::ConnectionState;
use crate::types::ClientId;

/// Shared, type-erased handle to a connected client
pub type ClientHandle = Arc<dyn Client>;

/// Capability set of a connected client
///
/// Everything the hub and the connection states may ask of a client. The
/// synchronous methods are non-blocking: a slow peer must never stall the
/// hub loop or another client's pump. The two pumps are the only async
/// entry points; the hub spawns each exactly once per connection.
#[async_trait]
pub trait Client: Send + Sync {
    /// Identity assigned by the hub; unset (zero) before registration
    fn id(&self) -> ClientId;

    /// Store the assigned identity and activate the initial state
    fn initialize(&self, id: ClientId);

    /// Swap the active state, running exit and enter hooks in order
    ///
    /// `None` detaches the current state (only its exit hook runs) and is
    /// the terminal transition used during close.
    fn set_state(&self, next: Option<Box<dyn ConnectionState>>);

    /// Hand a message to the active state's handler
    fn dispatch(&self, sender: ClientId, payload: Payload);

    /// Queue a payload for delivery to this client's own socket
    fn send_to_self(&self, payload: Payload);

    /// Queue a payload for this client's socket with another client's
    /// identity as the sender
    fn send_as(&self, payload: Payload, sender: ClientId);

    /// Hand a payload directly to a peer's dispatch, with this client as
    /// the sender; silently dropped if the peer is gone
    fn pass_to_peer(&self, payload: Payload, peer: ClientId);

    /// Submit a payload to the hub for delivery to every other client
    fn broadcast(&self, payload: Payload);

    /// Drain the outbound queue into the socket until the queue closes
    async fn outbound_pump(self: Arc<Self>);

    /// Read the socket and dispatch inbound envelopes until it closes
    async fn inbound_pump(self: Arc<Self>);

    /// Tear the client down: detach state, unregister, release the socket
    fn close(&self, reason: &str);
}

/// The central hub actor
///
/// Owns the receiving ends of the three coordination channels and the
/// client registry. [`Hub::run`] consumes the hub; everything else talks
/// to it through a [`HubHandle`].
pub struct Hub {
    registry: Arc<Registry<ClientHandle>>,
    register_rx: mpsc::UnboundedReceiver<ClientHandle>,
    unregister_rx: mpsc::UnboundedReceiver<ClientHandle>,
    broadcast_rx: mpsc::UnboundedReceiver<Envelope>,
}

/// Cloneable handle for talking to a [`Hub`]
///
/// Holds the sending ends of the coordination channels plus shared read
/// access to the registry. One hub is built at process start and its
/// handle is passed to the acceptance loop and into every client actor;
/// there is no ambient singleton.
#[derive(Clone)]
pub struct HubHandle {
    registry: Arc<Registry<ClientHandle>>,
    register_tx: mpsc::UnboundedSender<ClientHandle>,
    unregister_tx: mpsc::UnboundedSender<ClientHandle>,
    broadcast_tx: mpsc::UnboundedSender<Envelope>,
}

impl Hub {
    /// Create a hub and the handle used to reach it
    pub fn new() -> (Hub, HubHandle) {
        let registry = Arc::new(Registry::new());
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();

        let hub = Hub {
            registry: Arc::clone(&registry),
            register_rx,
            unregister_rx,
            broadcast_rx,
        };
        let handle = HubHandle {
            registry,
            register_tx,
            unregister_tx,
            broadcast_tx,
        };
        (hub, handle)
    }

    /// Run the hub event loop
    ///
    /// Processes one coordination event at a time, with no priority
    /// between the channels. Returns once every [`HubHandle`] has been
    /// dropped.
    pub async fn run(mut self) {
        info!("Hub started, awaiting client registrations");

        loop {
            tokio::select! {
                Some(client) = self.register_rx.recv() => {
                    let id = self.registry.add(Arc::clone(&client));
                    info!("Client {} registered", id);
                    client.initialize(id);
                }
                Some(client) = self.unregister_rx.recv() => {
                    let id = client.id();
                    debug!("Client {} unregistered", id);
                    self.registry.remove(id);
                }
                Some(envelope) = self.broadcast_rx.recv() => {
                    self.registry.for_each(|id, client| {
                        if id != envelope.sender_id {
                            client.dispatch(envelope.sender_id, envelope.payload.clone());
                        }
                    });
                }
                else => break,
            }
        }

        info!("Hub stopped");
    }
}

impl HubHandle {
    /// Accept one new connection
    ///
    /// Builds a client through the injected `factory`, submits it for
    /// registration and starts its two pumps. A factory failure (say, a
    /// failed WebSocket handshake) is logged and the attempt abandoned.
    pub async fn serve<F, Fut>(&self, factory: F, stream: TcpStream)
    where
        F: FnOnce(HubHandle, TcpStream) -> Fut,
        Fut: Future<Output = Result<ClientHandle, RelayError>>,
    {
        match factory(self.clone(), stream).await {
            Ok(client) => {
                if !self.register(Arc::clone(&client)) {
                    return;
                }
                tokio::spawn(Arc::clone(&client).outbound_pump());
                tokio::spawn(client.inbound_pump());
            }
            Err(e) => {
                error!("Error obtaining client for new connection: {}", e);
            }
        }
    }

    /// Submit a client for registration
    ///
    /// Reports whether the hub accepted the submission; a stopped hub
    /// refuses, and the client must not be started.
    pub fn register(&self, client: ClientHandle) -> bool {
        let accepted = self.register_tx.send(client).is_ok();
        if !accepted {
            debug!("Hub is gone, dropping registration");
        }
        accepted
    }

    /// Submit a client for removal; harmless if it was never registered
    ///
    /// The identity is read when the hub processes the event, so a client
    /// that closed before its registration was processed still removes
    /// whichever entry it ended up with.
    pub fn unregister(&self, client: ClientHandle) {
        if self.unregister_tx.send(client).is_err() {
            debug!("Hub is gone, dropping unregistration");
        }
    }

    /// Submit an envelope for delivery to every client except its sender
    pub fn broadcast(&self, envelope: Envelope) {
        if self.broadcast_tx.send(envelope).is_err() {
            debug!("Hub is gone, dropping broadcast");
        }
    }

    /// Shared view of the live-client registry
    pub fn clients(&self) -> &Registry<ClientHandle> {
        &self.registry
    }
}
