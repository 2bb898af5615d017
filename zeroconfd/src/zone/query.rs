use std::fmt;
use hickory_proto::op::Query;
use hickory_proto::rr::{DNSClass, Name, RecordType};
use tokio::sync::mpsc;
use super::entry::Entry;

/// What a caller is looking for in the zone.
///
/// A question without a name matches entries under every name; subscriptions
/// are always nameless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: Option<Name>,
    pub record_type: RecordType,
    pub class: DNSClass,
}

impl Question {
    pub fn new(name: Name, record_type: RecordType) -> Self {
        Self {
            name: Some(name),
            record_type,
            class: DNSClass::IN,
        }
    }

    pub fn any_name(record_type: RecordType) -> Self {
        Self {
            name: None,
            record_type,
            class: DNSClass::IN,
        }
    }

    /// The single predicate used for both lookups and subscriber fan-out.
    pub fn matches(&self, entry: &Entry) -> bool {
        let type_matches =
            self.record_type == RecordType::ANY || self.record_type == entry.record_type();
        let name_matches = match &self.name {
            Some(name) => name == entry.name(),
            None => true,
        };
        type_matches && name_matches
    }
}

impl From<&Query> for Question {
    fn from(query: &Query) -> Self {
        Self {
            name: Some(query.name().clone()),
            record_type: query.query_type(),
            class: query.query_class(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving side of a zone subscription. Never closed by the zone while
/// subscribed; dropping it lets the zone forget the subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Entry>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, rx: mpsc::UnboundedReceiver<Entry>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next matching entry. Returns None once the zone is gone.
    pub async fn recv(&mut self) -> Option<Entry> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Entry> {
        self.rx.try_recv().ok()
    }
}
