use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Well-known mDNS port
pub const MDNS_PORT: u16 = 5353;

/// IPv4 link-local multicast group for mDNS
pub const MDNS_IPV4: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(224, 0, 0, 251), MDNS_PORT));

/// IPv6 link-local multicast group for mDNS
pub const MDNS_IPV6: SocketAddr = SocketAddr::V6(SocketAddrV6::new(
    Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb),
    MDNS_PORT,
    0,
    0,
));

/// Domain used when a host does not configure one
pub const DEFAULT_DOMAIN: &str = "local.";

/// Lifetime in seconds given to every published record
pub const DEFAULT_TTL: u32 = 3600;

/// Inbound datagram buffer. mDNS allows packets larger than the Ethernet MTU.
pub const RECV_BUFFER_SIZE: usize = 9000;

/// API path prefix
pub const API_PREFIX: &str = "/v1";
