use std::collections::HashMap;
use crate::types::{Protocol, ServiceType};

/// Service types every registry starts with, keyed by their short name.
const WELL_KNOWN: &[(&str, &str, Protocol)] = &[
    ("ssh", "_ssh", Protocol::Tcp),
    ("sftp-ssh", "_sftp-ssh", Protocol::Tcp),
    ("http", "_http", Protocol::Tcp),
    ("https", "_https", Protocol::Tcp),
    ("ftp", "_ftp", Protocol::Tcp),
    ("smb", "_smb", Protocol::Tcp),
    ("afpovertcp", "_afpovertcp", Protocol::Tcp),
    ("nfs", "_nfs", Protocol::Tcp),
    ("ipp", "_ipp", Protocol::Tcp),
    ("printer", "_printer", Protocol::Tcp),
    ("workstation", "_workstation", Protocol::Tcp),
    ("device-info", "_device-info", Protocol::Tcp),
    ("rtsp", "_rtsp", Protocol::Tcp),
    ("sip", "_sip", Protocol::Udp),
];

/// Maps symbolic names ("ssh", "http", ...) to service types.
#[derive(Debug, Clone)]
pub struct ServiceTypeRegistry {
    types: HashMap<String, ServiceType>,
}

impl ServiceTypeRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// A registry seeded with the well-known service types
    pub fn with_well_known() -> Self {
        let mut registry = Self::new();
        for (key, name, protocol) in WELL_KNOWN {
            registry.register(*key, ServiceType::new(*name, *protocol));
        }
        registry
    }

    /// Register a service type, returning the one it replaced
    pub fn register(&mut self, key: impl Into<String>, service_type: ServiceType) -> Option<ServiceType> {
        self.types.insert(key.into(), service_type)
    }

    pub fn get(&self, key: &str) -> Option<&ServiceType> {
        self.types.get(key)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for ServiceTypeRegistry {
    fn default() -> Self {
        Self::with_well_known()
    }
}
