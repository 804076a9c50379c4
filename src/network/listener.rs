use nix::sys::socket::{
    self, sockopt, AddressFamily, Backlog, SockFlag, SockType, SockaddrIn, SockaddrIn6,
};
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::os::fd::AsRawFd;

/// Pending-connection queue size
///
/// Connections beyond this are refused by the transport, not by the
/// application.
const BACKLOG: i32 = 5;

/// Bind the listening socket with address reuse
///
/// `SO_REUSEADDR` is set before bind so the server can rebind immediately
/// after a restart. The returned listener is non-blocking.
pub fn bind_listener(bind_addr: &str, port: u16) -> io::Result<TcpListener> {
    let addr = resolve(bind_addr, port)?;

    let family = match addr {
        SocketAddr::V4(_) => AddressFamily::Inet,
        SocketAddr::V6(_) => AddressFamily::Inet6,
    };

    let fd = socket::socket(family, SockType::Stream, SockFlag::empty(), None)
        .map_err(io::Error::from)?;
    socket::setsockopt(&fd, sockopt::ReuseAddr, &true).map_err(io::Error::from)?;

    match addr {
        SocketAddr::V4(v4) => socket::bind(fd.as_raw_fd(), &SockaddrIn::from(v4)),
        SocketAddr::V6(v6) => socket::bind(fd.as_raw_fd(), &SockaddrIn6::from(v6)),
    }
    .map_err(io::Error::from)?;

    socket::listen(&fd, Backlog::new(BACKLOG).map_err(io::Error::from)?)
        .map_err(io::Error::from)?;

    let listener = TcpListener::from(fd);
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn resolve(bind_addr: &str, port: u16) -> io::Result<SocketAddr> {
    (bind_addr, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("cannot resolve bind address {bind_addr}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_ephemeral_port() {
        let listener = bind_listener("127.0.0.1", 0).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn rebinds_same_port_after_close() {
        let listener = bind_listener("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let listener = bind_listener("127.0.0.1", port).unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    #[test]
    fn unresolvable_address_is_rejected() {
        assert!(bind_listener("", 0).is_err());
    }
}
