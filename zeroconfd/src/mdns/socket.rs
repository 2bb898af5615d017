use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use super::error::ConnectorError;

/// Other responders on the host (avahi, mDNSResponder) hold the same port
#[cfg(unix)]
fn reuse_port(socket: &Socket) -> io::Result<()> {
    socket.set_reuse_port(true)
}

#[cfg(not(unix))]
fn reuse_port(_socket: &Socket) -> io::Result<()> {
    Ok(())
}

fn open(group: SocketAddr) -> io::Result<Socket> {
    let domain = match group {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    reuse_port(&socket)?;
    socket.set_nonblocking(true)?;

    let wildcard = match group {
        SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), group.port()),
        SocketAddr::V6(_) => {
            socket.set_only_v6(true)?;
            SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), group.port())
        }
    };
    socket.bind(&SockAddr::from(wildcard))?;
    Ok(socket)
}

fn join(socket: &Socket, group: SocketAddr) -> io::Result<()> {
    match group {
        SocketAddr::V4(v4) => {
            socket.join_multicast_v4(v4.ip(), &Ipv4Addr::UNSPECIFIED)?;
            socket.set_multicast_loop_v4(true)
        }
        SocketAddr::V6(v6) => {
            socket.join_multicast_v6(v6.ip(), 0)?;
            socket.set_multicast_loop_v6(true)
        }
    }
}

/// Bind a UDP socket on the wildcard address of the group's family and join
/// the multicast group. Must be called from within a tokio runtime.
pub fn bind_multicast(group: SocketAddr) -> Result<UdpSocket, ConnectorError> {
    let socket = open(group).map_err(|source| ConnectorError::Bind { group, source })?;
    join(&socket, group).map_err(|source| ConnectorError::Join { group, source })?;

    UdpSocket::from_std(socket.into()).map_err(|source| ConnectorError::Bind { group, source })
}
