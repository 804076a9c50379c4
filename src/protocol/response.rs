use crate::registry::{Registry, ServerEntry};
use serde::Serialize;

#[derive(Serialize)]
struct ServerList<'a> {
    servers: &'a [ServerEntry],
}

/// Encode the success payload: `{"servers":[...]}` in roster order
///
/// Names and URLs are emitted as UTF-8 without escaping to ASCII, so
/// localized text round-trips exactly. The registry is frozen at startup,
/// so repeated calls yield byte-identical payloads for a process lifetime.
pub fn encode_server_list(registry: &Registry) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&ServerList {
        servers: registry.entries(),
    })
}

/// Encode the error payload sent for unrecognized commands
pub fn encode_error() -> Vec<u8> {
    br#"{"error":"Unknown request"}"#.to_vec()
}
