//! mc_peer — Connection management and protocol orchestration for Meshchat
//!
//! Owns the set of live peer connections, drives each one through its
//! lifecycle (`Opening → KeyPending → Secure → Closed`), starts a key
//! exchange the moment a connection opens, and relays envelopes across the
//! room so every participant sees every message. The transport (WebRTC,
//! in-memory, anything that moves bytes and verifies peer identity) and the
//! rendering layer sit behind the `Transport` and `UiEvents` traits; this
//! crate performs no IO of its own and never spawns a thread.
//!
//! The one security invariant everything else leans on: a displayed
//! message's sender is ALWAYS the transport-verified peer id of the
//! connection it arrived on. Nothing a payload claims about its origin is
//! ever believed.
//!
//! # Modules
//! - `manager`    — `ConnectionManager`: commands, transport events, relay
//! - `connection` — per-peer entry + lifecycle state machine
//! - `session`    — per-process key material (agreement keypair + channel)
//! - `events`     — rendering boundary: `UiEvents`, `DisplayMessage`
//! - `transport`  — transport boundary traits
//! - `config`     — tunables (connect timeout, media size ceiling)
//! - `error`      — unified error type

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod manager;
pub mod session;
pub mod transport;

pub use config::PeerConfig;
pub use error::PeerError;
pub use events::{DisplayMessage, MessageKind, Severity, UiEvents};
pub use manager::ConnectionManager;
pub use transport::{Connection, Transport, TransportError};
