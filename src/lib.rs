//! Real-Time WebSocket Relay Hub Library
//!
//! A relay hub mediating typed-message delivery between many concurrently
//! connected WebSocket clients, built with tokio-tungstenite using the
//! Actor pattern.
//!
//! # Features
//! - Single-writer client registry with monotonic identity assignment
//! - Identity announcement on registration
//! - Broadcast to every client except the sender
//! - Direct point-to-point relay between clients
//! - Bounded per-client outbound queues that drop instead of block
//! - Per-connection state machine with enter/exit hooks
//! - Disconnection handling isolated per client
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` is the central actor looping over three coordination channels
//!   (register, unregister, broadcast); it is the only writer of registry
//!   membership
//! - Each connection runs a `WebSocketClient` actor with two pumps, one
//!   reading the socket into the state machine and one draining the
//!   outbound queue back to the socket
//! - A slow consumer only ever loses its own messages
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use relay_hub::{Hub, WebSocketClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (hub, handle) = Hub::new();
//!     tokio::spawn(hub.run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let handle = handle.clone();
//!         tokio::spawn(async move {
//!             handle.serve(WebSocketClient::accept, stream).await;
//!         });
//!     }
//! }
//! ```

pub mod client;
pub mod error;
pub mod hub;
pub mod message;
pub mod registry;
pub mod states;
pub mod types;

#[cfg(test)]
mod testutil;

// Re-export main types for convenience
pub use client::{SEND_QUEUE_CAPACITY, WebSocketClient};
pub use error::RelayError;
pub use hub::{Client, ClientHandle, Hub, HubHandle};
pub use message::{Envelope, Payload};
pub use registry::Registry;
pub use states::{Connected, ConnectionState};
pub use types::ClientId;
