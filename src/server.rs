use crate::config::Config;
use crate::error::Result;
use crate::network::{bind_listener, Connection};
use crate::protocol::MAX_REQUEST_BYTES;
use crate::registry::Registry;
use mio::net::TcpStream as MioTcpStream;
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// TCP roster distribution server
pub struct Server {
    config: Config,
    registry: Arc<Registry>,
    shutdown: AtomicBool,
    active_connections: AtomicUsize,
    local_addr: OnceLock<SocketAddr>,
}

impl Server {
    /// Create a new server with the given configuration
    ///
    /// Validates the configuration and freezes the roster. Malformed
    /// roster data aborts startup here; no partial service is started.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mut entries = config.servers.clone();
        if let Some(ref tunnel_ip) = config.tunnel_ip_override {
            for entry in &mut entries {
                entry.tunnel_server_ip = tunnel_ip.clone();
            }
        }
        let registry = Arc::new(Registry::new(entries)?);

        Ok(Self {
            config,
            registry,
            shutdown: AtomicBool::new(false),
            active_connections: AtomicUsize::new(0),
            local_addr: OnceLock::new(),
        })
    }

    /// Run the server, spawning worker threads
    ///
    /// This method blocks until the server is shut down.
    pub fn run(self: Arc<Self>) -> Result<()> {
        let listener = bind_listener(&self.config.bind_addr, self.config.port)?;
        let addr = listener.local_addr()?;
        let _ = self.local_addr.set(addr);

        info!(
            "Server listening on {}, advertising {} servers",
            addr,
            self.registry.len()
        );
        if self.registry.is_empty() {
            warn!("Roster is empty, GET_SERVERS will return no servers");
        }

        let mut handles = Vec::new();

        for thread_id in 0..self.config.threads {
            let server = Arc::clone(&self);
            let listener = listener.try_clone()?;

            let handle = thread::spawn(move || {
                if let Err(e) = server.run_worker(thread_id, listener) {
                    error!("Worker {} failed: {}", thread_id, e);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            let _ = handle.join();
        }

        Ok(())
    }

    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        info!("Initiating server shutdown");
        self.shutdown.store(true, Ordering::Release);
    }

    /// Address the listener is bound to, available once `run` has bound it
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Get the number of active client connections
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    fn run_worker(self: &Arc<Self>, thread_id: usize, listener: TcpListener) -> Result<()> {
        use mio::net::TcpListener as MioTcpListener;
        use mio::{Events, Interest, Poll, Token};

        let mut poll = Poll::new()?;
        let mut events = Events::with_capacity(1024);

        listener.set_nonblocking(true)?;
        let mut listener = MioTcpListener::from_std(listener);

        const SERVER: Token = Token(0);
        poll.registry()
            .register(&mut listener, SERVER, Interest::READABLE)?;

        let mut connections: HashMap<Token, (MioTcpStream, Connection)> = HashMap::new();
        let mut next_token = 1usize;

        // One bounded read per connection, so one reusable buffer per worker
        let mut read_buf = vec![0u8; MAX_REQUEST_BYTES];

        let io_timeout = match self.config.io_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        info!("Worker {} started", thread_id);

        while !self.shutdown.load(Ordering::Acquire) {
            if let Err(e) = poll.poll(&mut events, Some(Duration::from_millis(100))) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            for event in events.iter() {
                match event.token() {
                    SERVER => {
                        // Accept new connections until the queue drains
                        loop {
                            match listener.accept() {
                                Ok((mut stream, addr)) => {
                                    debug!("New connection from {}", addr);

                                    if let Err(e) = stream.set_nodelay(self.config.tcp_nodelay) {
                                        debug!("Failed to set nodelay for {}: {}", addr, e);
                                    }

                                    let token = Token(next_token);
                                    next_token += 1;

                                    if let Err(e) = poll.registry().register(
                                        &mut stream,
                                        token,
                                        Interest::READABLE,
                                    ) {
                                        error!("Failed to register {}: {}", addr, e);
                                        continue;
                                    }

                                    let connection = Connection::new(
                                        Arc::clone(&self.registry),
                                        addr,
                                        io_timeout,
                                    );
                                    connections.insert(token, (stream, connection));
                                    self.active_connections.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                                Err(e) => {
                                    error!("Error accepting connection: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                    token => {
                        let should_close = if let Some((stream, connection)) =
                            connections.get_mut(&token)
                        {
                            if event.is_readable() && !connection.request_handled() {
                                match stream.read(&mut read_buf) {
                                    Ok(n) => connection.handle_request(&read_buf[..n]),
                                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                                    Err(e) => {
                                        error!(
                                            "Error reading from {}: {}",
                                            connection.peer_addr(),
                                            e
                                        );
                                        connection.close();
                                    }
                                }
                            }

                            // Drain the response; a partial write parks the
                            // connection on WRITABLE until the rest flushes.
                            if connection.request_handled() && !connection.is_done() {
                                match flush_writes(stream, connection) {
                                    Ok(true) => {}
                                    Ok(false) => {
                                        if let Err(e) = poll.registry().reregister(
                                            stream,
                                            token,
                                            Interest::WRITABLE,
                                        ) {
                                            error!(
                                                "Failed to reregister {}: {}",
                                                connection.peer_addr(),
                                                e
                                            );
                                            connection.close();
                                        }
                                    }
                                    Err(e) => {
                                        error!(
                                            "Error writing to {}: {}",
                                            connection.peer_addr(),
                                            e
                                        );
                                        connection.close();
                                    }
                                }
                            }

                            connection.is_done()
                        } else {
                            false
                        };

                        if should_close {
                            self.close_connection(&poll, &mut connections, token);
                        }
                    }
                }
            }

            // Close connections that ran past their I/O deadline
            if io_timeout.is_some() {
                let now = Instant::now();
                let expired: Vec<Token> = connections
                    .iter()
                    .filter(|(_, (_, connection))| connection.is_expired(now))
                    .map(|(token, _)| *token)
                    .collect();

                for token in expired {
                    if let Some((_, connection)) = connections.get(&token) {
                        warn!("Connection from {} timed out", connection.peer_addr());
                    }
                    self.close_connection(&poll, &mut connections, token);
                }
            }
        }

        // Cleanup
        for (_, (mut stream, mut connection)) in connections {
            let _ = poll.registry().deregister(&mut stream);
            connection.close();
            self.active_connections.fetch_sub(1, Ordering::Relaxed);
        }

        info!("Worker {} shutting down", thread_id);
        Ok(())
    }

    fn close_connection(
        &self,
        poll: &mio::Poll,
        connections: &mut HashMap<mio::Token, (MioTcpStream, Connection)>,
        token: mio::Token,
    ) {
        if let Some((mut stream, mut connection)) = connections.remove(&token) {
            let _ = poll.registry().deregister(&mut stream);

            if connection.bytes_written() > 0 {
                debug!(
                    "Sent {} bytes to {}",
                    connection.bytes_written(),
                    connection.peer_addr()
                );
            }

            connection.close();
            self.active_connections.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// Write pending response bytes until drained or the socket would block
///
/// Returns `Ok(true)` once the buffer is fully flushed.
fn flush_writes(stream: &mut MioTcpStream, connection: &mut Connection) -> io::Result<bool> {
    while let Some(data) = connection.pending_writes() {
        match stream.write(data) {
            Ok(0) => return Err(ErrorKind::WriteZero.into()),
            Ok(n) => connection.consume_writes(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
