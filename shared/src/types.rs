use std::fmt;
use std::net::{IpAddr, SocketAddr};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// The machine offering one or more services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Host label, e.g. "nas"
    pub name: String,

    /// Domain the host lives in, e.g. "local."
    pub domain: String,

    /// Addresses advertised for the host
    pub addresses: Vec<IpAddr>,
}

impl Host {
    /// `domain` is made absolute if it lacks the trailing dot.
    pub fn new(name: impl Into<String>, domain: impl Into<String>, addresses: Vec<IpAddr>) -> Self {
        let mut domain = domain.into();
        if !domain.ends_with('.') {
            domain.push('.');
        }

        Self {
            name: name.into(),
            domain,
            addresses,
        }
    }

    /// Fully-qualified host name, e.g. "nas.local."
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.name, self.domain)
    }
}

/// Transport protocol a service is reachable over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// DNS-SD label for the protocol
    pub const fn label(&self) -> &'static str {
        match self {
            Protocol::Tcp => "_tcp",
            Protocol::Udp => "_udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A symbolic service name plus its transport, e.g. "_ssh" over TCP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceType {
    pub name: String,
    pub protocol: Protocol,
}

impl ServiceType {
    pub fn new(name: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            protocol,
        }
    }

    /// Remote shell access
    pub fn ssh() -> Self {
        Self::new("_ssh", Protocol::Tcp)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.protocol)
    }
}

/// A service offered by a host on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub host: Host,
    pub service_type: ServiceType,
    pub port: u16,
}

impl Service {
    pub fn new(host: Host, service_type: ServiceType, port: u16) -> Self {
        Self {
            host,
            service_type,
            port,
        }
    }

    /// Fully-qualified name of the offering host, e.g. "foo.local."
    pub fn fqdn(&self) -> String {
        self.host.fqdn()
    }

    /// Fully-qualified service type, e.g. "_ssh._tcp.local."
    pub fn service_type_name(&self) -> String {
        format!(
            "{}.{}.{}",
            self.service_type.name,
            self.service_type.protocol.label(),
            self.host.domain
        )
    }

    /// Fully-qualified instance name, e.g. "foo._ssh._tcp.local."
    pub fn instance_name(&self) -> String {
        format!("{}.{}", self.host.name, self.service_type_name())
    }
}

/// A zone entry as exposed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordView {
    /// Owner name, e.g. "foo._ssh._tcp.local."
    pub name: String,

    /// Record type mnemonic, e.g. "SRV"
    pub record_type: String,

    /// TTL in seconds as stored
    pub ttl: u32,

    /// Presentation form of the record data
    pub data: String,

    /// Whether this entry is answered on the network
    pub publish: bool,

    /// When a learned entry stops being valid
    pub expires: Option<DateTime<Utc>>,

    /// Sender of a learned entry
    pub source: Option<SocketAddr>,
}

/// Counters kept by one multicast responder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderStats {
    pub group: String,
    pub received: u64,
    pub decode_errors: u64,
    pub responses_sent: u64,
    pub encode_errors: u64,
    pub send_errors: u64,
    pub records_learned: u64,
    pub restarts: u64,
}
