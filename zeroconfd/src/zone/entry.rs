use std::net::SocketAddr;
use chrono::{DateTime, Utc};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use shared::types::RecordView;

/// A resource record held by the zone.
#[derive(Debug, Clone)]
pub struct Entry {
    /// When a learned record stops being valid. Published records never expire.
    pub expires: Option<DateTime<Utc>>,

    /// Whether this record is ours to answer with on the network
    pub publish: bool,

    pub record: Record,

    /// Sender of a learned record
    pub source: Option<SocketAddr>,
}

impl Entry {
    /// A locally authoritative record.
    pub fn published(record: Record) -> Self {
        Self {
            expires: None,
            publish: true,
            record,
            source: None,
        }
    }

    /// A record observed on the wire, valid for its TTL from `received`.
    pub fn learned(record: Record, source: SocketAddr, received: DateTime<Utc>) -> Self {
        let expires = received + chrono::Duration::seconds(i64::from(record.ttl()));
        Self {
            expires: Some(expires),
            publish: false,
            record,
            source: Some(source),
        }
    }

    pub fn name(&self) -> &Name {
        self.record.name()
    }

    pub fn record_type(&self) -> RecordType {
        self.record.record_type()
    }

    pub fn data(&self) -> &RData {
        self.record.data()
    }

    /// Whether both entries hold the same record: same name, type and data.
    /// An ANY record is the same as every record under its name.
    pub fn is_same_record(&self, other: &Entry) -> bool {
        if self.name() != other.name() {
            return false;
        }
        if self.record_type() == RecordType::ANY || other.record_type() == RecordType::ANY {
            return true;
        }
        self.record_type() == other.record_type() && self.data() == other.data()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    pub fn to_view(&self) -> RecordView {
        RecordView {
            name: self.name().to_string(),
            record_type: self.record_type().to_string(),
            ttl: self.record.ttl(),
            data: self.data().to_string(),
            publish: self.publish,
            expires: self.expires,
            source: self.source,
        }
    }
}
