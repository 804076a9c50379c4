//! roster-server: TCP configuration distribution for game server rosters
//!
//! This crate provides a minimal TCP service that hands connecting clients
//! the advertised server roster as JSON. It exists as an alternative to an
//! HTTP config API for clients whose HTTP traffic is classified or blocked.
//!
//! # Architecture
//!
//! - Worker threads sharing one listening socket
//! - mio-based event loop for cross-platform non-blocking I/O
//! - One request, one response, then close: clients detect end-of-response
//!   via end-of-stream
//! - Immutable roster frozen at startup, shared read-only across workers

/// Configuration management for the server
pub mod config;

/// Error types and result aliases
pub mod error;

/// Network layer: listener setup and per-connection state
pub mod network;

/// Wire protocol: request parsing and JSON response encoding
pub mod protocol;

/// The advertised server roster
pub mod registry;

/// Core server implementation
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use registry::{Registry, ServerEntry};
pub use server::Server;
