use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{IoEngineError, IoResult};

/// Owns the listening socket a [`crate::server::TcpServer`] accepts
/// connections on.
///
/// Always IPv4, bound to `INADDR_ANY:port`, with `SO_REUSEADDR` set so a
/// restarted server doesn't trip over a socket still draining in
/// `TIME_WAIT`. Submitting the actual accept is the `EventQueue`'s job
/// (`submit_accept`); this type only owns the fd.
pub struct Acceptor {
    socket: Socket,
}

impl Acceptor {
    pub fn bind(port: u16, backlog: i32) -> IoResult<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(IoEngineError::Internal)?;
        socket.set_reuse_address(true).map_err(IoEngineError::Internal)?;
        let addr: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into();
        socket.bind(&addr.into()).map_err(IoEngineError::Internal)?;
        socket.listen(backlog).map_err(IoEngineError::Internal)?;
        Ok(Self { socket })
    }

    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    /// The port actually bound, useful when the caller requested port 0.
    pub fn local_port(&self) -> IoResult<u16> {
        let addr = self.socket.local_addr().map_err(IoEngineError::Internal)?;
        Ok(addr.as_socket().map(|s| s.port()).unwrap_or(0))
    }
}
