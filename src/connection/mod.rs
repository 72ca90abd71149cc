/// What happens to a connection once a worker has accepted it.
pub mod outbound;

#[cfg(test)]
pub mod mock_tcp_stream;

use std::net::{SocketAddr, TcpStream};

/// A freshly accepted connection. It lives only until the responder is
/// done with it; nothing about it is kept afterwards.
#[derive(Debug)]
pub struct AcceptedConnection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
}
