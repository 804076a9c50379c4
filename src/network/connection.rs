use crate::protocol::{self, Request};
use crate::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// State for one accepted connection
///
/// Owns the full request/response lifecycle: one bounded read, one
/// response, then close. Never shared across workers; the socket is
/// released on every exit path.
pub struct Connection {
    registry: Arc<Registry>,
    peer_addr: SocketAddr,
    deadline: Option<Instant>,

    // Single consolidated write buffer, drained by the worker
    write_buffer: Vec<u8>,
    write_position: usize,

    request_handled: bool,
    closed: bool,
}

impl Connection {
    /// Create state for a newly accepted connection
    pub fn new(
        registry: Arc<Registry>,
        peer_addr: SocketAddr,
        io_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            peer_addr,
            deadline: io_timeout.map(|t| Instant::now() + t),
            write_buffer: Vec::new(),
            write_position: 0,
            request_handled: false,
            closed: false,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Whether the single permitted read has been consumed
    pub fn request_handled(&self) -> bool {
        self.request_handled
    }

    /// Handle the first (and only) read of this connection
    ///
    /// Queues exactly one response, or closes without a response for
    /// undecodable input. An empty read (peer closed without sending)
    /// still gets the error payload.
    pub fn handle_request(&mut self, data: &[u8]) {
        self.request_handled = true;

        match protocol::parse_request(data) {
            Some(Request::GetServers) => {
                debug!("Request from {}: GET_SERVERS", self.peer_addr);
                match protocol::encode_server_list(&self.registry) {
                    Ok(payload) => self.write_buffer = payload,
                    Err(e) => {
                        error!("Failed to encode server list for {}: {}", self.peer_addr, e);
                        self.closed = true;
                    }
                }
            }
            Some(Request::Unknown(command)) => {
                warn!("Unknown request from {}: {:?}", self.peer_addr, command);
                self.write_buffer = protocol::encode_error();
            }
            None => {
                warn!(
                    "Undecodable request from {}, closing without response",
                    self.peer_addr
                );
                self.closed = true;
            }
        }
    }

    /// Response bytes not yet written to the socket
    pub fn pending_writes(&self) -> Option<&[u8]> {
        if self.write_position < self.write_buffer.len() {
            Some(&self.write_buffer[self.write_position..])
        } else {
            None
        }
    }

    /// Mark bytes as written
    pub fn consume_writes(&mut self, n: usize) {
        self.write_position += n;
    }

    /// Total response bytes flushed so far
    pub fn bytes_written(&self) -> usize {
        self.write_position
    }

    /// Whether the exchange is finished and the socket should close
    pub fn is_done(&self) -> bool {
        self.closed || (self.request_handled && self.write_position >= self.write_buffer.len())
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!("Connection closed: {}", self.peer_addr);
        }
    }

    /// Whether the I/O deadline has passed
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServerEntry;

    fn test_connection(io_timeout: Option<Duration>) -> Connection {
        let registry = Arc::new(
            Registry::new(vec![ServerEntry {
                id: 1,
                name: "A".to_string(),
                game_server_ip: "10.0.0.1".to_string(),
                tunnel_server_ip: "10.0.0.2".to_string(),
                tunnel_port: 1000,
                download_url: "http://x/a".to_string(),
            }])
            .unwrap(),
        );
        Connection::new(registry, "127.0.0.1:40000".parse().unwrap(), io_timeout)
    }

    #[test]
    fn get_servers_queues_roster_payload() {
        let mut conn = test_connection(None);
        conn.handle_request(b"GET_SERVERS\n");

        assert!(conn.request_handled());
        assert!(!conn.is_done());
        let pending = conn.pending_writes().unwrap();
        assert!(pending.starts_with(br#"{"servers":["#));
    }

    #[test]
    fn unknown_command_queues_error_payload() {
        let mut conn = test_connection(None);
        conn.handle_request(b"PING\n");

        assert_eq!(conn.pending_writes().unwrap(), br#"{"error":"Unknown request"}"#);
    }

    #[test]
    fn empty_read_queues_error_payload() {
        let mut conn = test_connection(None);
        conn.handle_request(b"");

        assert_eq!(conn.pending_writes().unwrap(), br#"{"error":"Unknown request"}"#);
    }

    #[test]
    fn undecodable_read_aborts_without_response() {
        let mut conn = test_connection(None);
        conn.handle_request(&[0xff, 0xfe]);

        assert!(conn.is_done());
        assert!(conn.pending_writes().is_none());
        assert_eq!(conn.bytes_written(), 0);
    }

    #[test]
    fn done_once_response_fully_consumed() {
        let mut conn = test_connection(None);
        conn.handle_request(b"PING\n");

        let len = conn.pending_writes().unwrap().len();
        conn.consume_writes(len - 3);
        assert!(!conn.is_done());
        assert_eq!(conn.pending_writes().unwrap().len(), 3);

        conn.consume_writes(3);
        assert!(conn.is_done());
        assert!(conn.pending_writes().is_none());
    }

    #[test]
    fn not_done_before_request() {
        let conn = test_connection(None);
        assert!(!conn.is_done());
        assert!(conn.pending_writes().is_none());
    }

    #[test]
    fn deadline_expiry() {
        let conn = test_connection(Some(Duration::from_millis(1)));
        let later = Instant::now() + Duration::from_millis(50);
        assert!(conn.is_expired(later));

        let conn = test_connection(None);
        assert!(!conn.is_expired(later));
    }
}
