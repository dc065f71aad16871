//! WebSocket layer
//!
//! [`WsServer`] accepts subscribers and hands them to the broadcaster;
//! [`SnapshotClient`] is the matching consumer with automatic reconnection.

mod client;
mod server;
mod types;

pub use client::SnapshotClient;
pub use server::{WsServer, WsSubscriber};
pub use types::{ClientEvent, WsConfig, WsError};
