//! Connection state machine
//!
//! Per-connection behavior that changes over the connection's lifetime.
//! Exactly one state is active per client at a time; transitions run
//! through `Client::set_state`, which guarantees the exit hook of the
//! outgoing state runs before the enter hook of the incoming one.

mod connected;

pub use connected::Connected;

use crate::hub::Client;
use crate::message::Payload;
use crate::types::ClientId;

/// Phase-specific message handling for a client
///
/// States form an open set; [`Connected`] is the initial phase. The client
/// driving the state is passed into every hook, so states keep no
/// back-reference of their own. Hooks and handlers run synchronously on
/// the caller's task and must not block.
pub trait ConnectionState: Send {
    /// Human-readable state name, used in transition logs
    fn name(&self) -> &'static str;

    /// Hook run immediately after this state becomes active
    fn on_enter(&mut self, _client: &dyn Client) {}

    /// Hook run immediately before this state is detached
    fn on_exit(&mut self, _client: &dyn Client) {}

    /// React to a message dispatched to the owning client
    fn handle_message(&mut self, client: &dyn Client, sender: ClientId, payload: Payload);
}
