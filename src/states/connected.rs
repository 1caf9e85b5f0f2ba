//! Initial state of every registered client

use crate::hub::Client;
use crate::message::Payload;
use crate::types::ClientId;

use super::ConnectionState;

/// The phase a client enters right after registration
///
/// On entry the client is told its assigned identity. Messages the client
/// itself produced are re-broadcast to everyone else; messages arriving
/// from other clients are queued for delivery with their original sender
/// preserved.
pub struct Connected;

impl ConnectionState for Connected {
    fn name(&self) -> &'static str {
        "Connected"
    }

    fn on_enter(&mut self, client: &dyn Client) {
        client.send_to_self(Payload::Id { id: client.id() });
    }

    fn handle_message(&mut self, client: &dyn Client, sender: ClientId, payload: Payload) {
        if sender == client.id() {
            client.broadcast(payload);
        } else {
            client.send_as(payload, sender);
        }
    }
}
