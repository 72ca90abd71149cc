/// Builds the listening sockets workers accept from.
use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream},
    os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::BACKLOG;
use crate::error::{Error, Result, Stage};

pub const LISTEN_IP: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// A non-blocking TCP socket listening on `0.0.0.0:port`. Closed when
/// dropped, which in practice means when the owning process exits.
#[derive(Debug)]
pub struct ListeningSocket {
    inner: TcpListener,
}

impl ListeningSocket {
    /// Creates, binds and starts listening. With `reuse_port` the socket
    /// gets `SO_REUSEPORT` so sibling processes can bind the same port, each
    /// with a backlog of its own.
    pub fn create(port: u16, reuse_port: bool) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|err| Error::os(Stage::Socket, err))?;

        socket
            .set_nonblocking(true)
            .map_err(|err| Error::os(Stage::NonBlocking, err))?;

        if reuse_port {
            socket
                .set_reuse_port(true)
                .map_err(|err| Error::os(Stage::ReusePort, err))?;
        }

        let addr = SocketAddr::V4(SocketAddrV4::new(LISTEN_IP, port));
        socket
            .bind(&addr.into())
            .map_err(|err| Error::os(Stage::Bind { port }, err))?;
        socket
            .listen(BACKLOG)
            .map_err(|err| Error::os(Stage::Listen, err))?;

        let listener = Self {
            inner: socket.into(),
        };
        let bound_port = listener.local_addr().map_or(port, |addr| addr.port());
        log::info!("begin listening at {LISTEN_IP}:{bound_port}");

        Ok(listener)
    }

    /// Never blocks; an empty backlog shows up as `ErrorKind::WouldBlock`.
    pub fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.inner.accept()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

impl AsFd for ListeningSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl AsRawFd for ListeningSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}
