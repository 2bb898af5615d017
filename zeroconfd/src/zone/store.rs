use std::collections::{BTreeMap, VecDeque};
use chrono::{DateTime, Utc};
use hickory_proto::rr::{LowerName, Name, RData, RecordType};
use tokio::sync::mpsc;
use super::entry::Entry;
use super::query::{Question, SubscriptionId};

/// Result of adding an entry to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New record, delivered to matching subscribers
    Inserted,
    /// Identical record already held; its lifetime or authority was updated
    Refreshed,
    /// Identical record already held and left untouched
    Duplicate,
}

struct Subscriber {
    id: SubscriptionId,
    filter: Question,
    sink: mpsc::UnboundedSender<Entry>,
}

/// Record storage owned by the zone worker. Not shared; every access goes
/// through the worker's mailbox.
#[derive(Default)]
pub struct ZoneStore {
    entries: BTreeMap<LowerName, Vec<Entry>>,
    subscribers: Vec<Subscriber>,
}

impl ZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, keeping insertion order per name.
    pub fn add(&mut self, entry: Entry) -> AddOutcome {
        let list = self.entries.entry(LowerName::new(entry.name())).or_default();

        if let Some(existing) = list.iter_mut().find(|e| e.is_same_record(&entry)) {
            return match (existing.publish, entry.publish) {
                // learned again: extend its life
                (false, false) => {
                    existing.expires = entry.expires;
                    existing.source = entry.source;
                    existing.record.set_ttl(entry.record.ttl());
                    AddOutcome::Refreshed
                }
                // we now own a record we had only heard about
                (false, true) => {
                    *existing = entry;
                    AddOutcome::Refreshed
                }
                _ => AddOutcome::Duplicate,
            };
        }

        list.push(entry.clone());
        self.fan_out(&entry);
        AddOutcome::Inserted
    }

    fn fan_out(&mut self, entry: &Entry) {
        self.subscribers.retain(|sub| {
            if !sub.filter.matches(entry) {
                return true;
            }
            if sub.sink.send(entry.clone()).is_err() {
                tracing::debug!("Dropping closed subscription {}", sub.id);
                return false;
            }
            true
        });
    }

    /// Entries matching `question`, in insertion order.
    pub fn query(&self, question: &Question) -> Vec<Entry> {
        match &question.name {
            Some(name) => self
                .entries
                .get(&LowerName::new(name))
                .map(|list| list.iter().filter(|e| question.matches(e)).cloned().collect())
                .unwrap_or_default(),
            None => self
                .entries
                .values()
                .flatten()
                .filter(|e| question.matches(e))
                .cloned()
                .collect(),
        }
    }

    /// Matching entries plus the records needed to use them: a PTR pulls the
    /// instance's SRV and TXT, an SRV pulls its target's addresses.
    pub fn query_additional(&self, question: &Question) -> (Vec<Entry>, Vec<Entry>) {
        let answers = self.query(question);
        let mut additionals: Vec<Entry> = Vec::new();
        let mut pending: VecDeque<Entry> = answers.iter().cloned().collect();

        while let Some(entry) = pending.pop_front() {
            for related in self.related(&entry) {
                let known = answers
                    .iter()
                    .chain(additionals.iter())
                    .any(|e| e.is_same_record(&related));
                if !known {
                    additionals.push(related.clone());
                    pending.push_back(related);
                }
            }
        }

        (answers, additionals)
    }

    fn related(&self, entry: &Entry) -> Vec<Entry> {
        match entry.data() {
            RData::PTR(ptr) => self.lookup(&ptr.0, &[RecordType::SRV, RecordType::TXT]),
            RData::SRV(srv) => self.lookup(srv.target(), &[RecordType::A, RecordType::AAAA]),
            _ => Vec::new(),
        }
    }

    fn lookup(&self, name: &Name, types: &[RecordType]) -> Vec<Entry> {
        self.entries
            .get(&LowerName::new(name))
            .map(|list| {
                list.iter()
                    .filter(|e| types.contains(&e.record_type()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subscribe(&mut self, id: SubscriptionId, record_type: RecordType, sink: mpsc::UnboundedSender<Entry>) {
        self.subscribers.push(Subscriber {
            id,
            filter: Question::any_name(record_type),
            sink,
        });
    }

    /// Returns false if no such subscription was registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|sub| sub.id != id);
        self.subscribers.len() != before
    }

    /// Drop learned entries whose lifetime ended at or before `now`.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, list| {
            let before = list.len();
            list.retain(|e| !e.is_expired(now));
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};
    use hickory_proto::rr::rdata::{SRV, TXT};
    use hickory_proto::rr::Record;
    use crate::zone::entry::tests::{a_record, ptr_record};

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    fn source() -> SocketAddr {
        "192.168.1.20:5353".parse().unwrap()
    }

    fn srv_record(name_: &str, port: u16, target: &str) -> Record {
        Record::from_rdata(name(name_), 3600, RData::SRV(SRV::new(0, 0, port, name(target))))
    }

    fn txt_record(name_: &str) -> Record {
        Record::from_rdata(name(name_), 3600, RData::TXT(TXT::new(vec![String::new()])))
    }

    fn ssh_store() -> ZoneStore {
        let mut store = ZoneStore::new();
        store.add(Entry::published(a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 4))));
        store.add(Entry::published(ptr_record("_ssh._tcp.local.", "foo._ssh._tcp.local.")));
        store.add(Entry::published(srv_record("foo._ssh._tcp.local.", 22, "foo.local.")));
        store.add(Entry::published(txt_record("foo._ssh._tcp.local.")));
        store
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = ZoneStore::new();
        let record = a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 4));

        assert_eq!(store.add(Entry::published(record.clone())), AddOutcome::Inserted);
        assert_eq!(store.add(Entry::published(record)), AddOutcome::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_distinct_data_under_one_name_kept_in_order() {
        let mut store = ZoneStore::new();
        store.add(Entry::published(a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 4))));
        store.add(Entry::published(a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 5))));

        let found = store.query(&Question::new(name("foo.local."), RecordType::A));
        let addrs: Vec<String> = found.iter().map(|e| e.data().to_string()).collect();
        assert_eq!(addrs, vec!["1.2.3.4", "1.2.3.5"]);
    }

    #[test]
    fn test_query_by_name_and_type() {
        let store = ssh_store();

        let srv = store.query(&Question::new(name("foo._ssh._tcp.local."), RecordType::SRV));
        assert_eq!(srv.len(), 1);
        assert_eq!(srv[0].record_type(), RecordType::SRV);

        let both = store.query(&Question::new(name("foo._ssh._tcp.local."), RecordType::ANY));
        assert_eq!(both.len(), 2);

        let miss = store.query(&Question::new(name("bar.local."), RecordType::ANY));
        assert!(miss.is_empty());

        let wrong_type = store.query(&Question::new(name("foo.local."), RecordType::AAAA));
        assert!(wrong_type.is_empty());
    }

    #[test]
    fn test_query_is_case_insensitive() {
        let store = ssh_store();
        let found = store.query(&Question::new(name("FOO.local."), RecordType::A));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_nameless_query_spans_all_names() {
        let store = ssh_store();
        assert_eq!(store.query(&Question::any_name(RecordType::ANY)).len(), 4);
        assert_eq!(store.query(&Question::any_name(RecordType::PTR)).len(), 1);
    }

    #[test]
    fn test_query_additional_follows_ptr_and_srv() {
        let store = ssh_store();
        let (answers, additionals) =
            store.query_additional(&Question::new(name("_ssh._tcp.local."), RecordType::PTR));

        assert_eq!(answers.len(), 1);
        let mut types: Vec<RecordType> = additionals.iter().map(Entry::record_type).collect();
        types.sort_by_key(|t| u16::from(*t));
        assert_eq!(types, vec![RecordType::A, RecordType::TXT, RecordType::SRV]);
    }

    #[test]
    fn test_query_additional_skips_records_already_answered() {
        let store = ssh_store();
        let (answers, additionals) =
            store.query_additional(&Question::new(name("foo._ssh._tcp.local."), RecordType::ANY));

        assert_eq!(answers.len(), 2);
        assert_eq!(additionals.len(), 1);
        assert_eq!(additionals[0].record_type(), RecordType::A);
    }

    #[test]
    fn test_query_additional_empty_for_plain_address() {
        let store = ssh_store();
        let (answers, additionals) =
            store.query_additional(&Question::new(name("foo.local."), RecordType::A));
        assert_eq!(answers.len(), 1);
        assert!(additionals.is_empty());
    }

    #[test]
    fn test_subscription_receives_matching_adds_in_order() {
        let mut store = ZoneStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.subscribe(SubscriptionId(1), RecordType::A, tx);

        store.add(Entry::published(a_record("one.local.", Ipv4Addr::new(10, 0, 0, 1))));
        store.add(Entry::published(ptr_record("_ssh._tcp.local.", "one._ssh._tcp.local.")));
        store.add(Entry::published(a_record("two.local.", Ipv4Addr::new(10, 0, 0, 2))));

        assert_eq!(rx.try_recv().unwrap().name(), &name("one.local."));
        assert_eq!(rx.try_recv().unwrap().name(), &name("two.local."));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscription_does_not_see_existing_or_duplicate_entries() {
        let mut store = ZoneStore::new();
        let record = a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 4));
        store.add(Entry::published(record.clone()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        store.subscribe(SubscriptionId(1), RecordType::ANY, tx);
        store.add(Entry::published(record));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = ZoneStore::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.subscribe(SubscriptionId(7), RecordType::ANY, tx);

        assert!(store.unsubscribe(SubscriptionId(7)));
        assert!(!store.unsubscribe(SubscriptionId(7)));
        assert_eq!(store.subscriber_count(), 0);

        store.add(Entry::published(a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 4))));
        // sender dropped with the subscription
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_subscription_pruned_on_fan_out() {
        let mut store = ZoneStore::new();
        let (tx, rx) = mpsc::unbounded_channel();
        store.subscribe(SubscriptionId(1), RecordType::ANY, tx);
        drop(rx);

        store.add(Entry::published(a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 4))));
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_relearning_refreshes_expiry() {
        let mut store = ZoneStore::new();
        let record = a_record("peer.local.", Ipv4Addr::new(10, 0, 0, 9));
        let first = Utc::now();
        let later = first + chrono::Duration::seconds(600);

        assert_eq!(store.add(Entry::learned(record.clone(), source(), first)), AddOutcome::Inserted);
        assert_eq!(store.add(Entry::learned(record, source(), later)), AddOutcome::Refreshed);

        let found = store.query(&Question::new(name("peer.local."), RecordType::A));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].expires, Some(later + chrono::Duration::seconds(3600)));
    }

    #[test]
    fn test_publishing_takes_over_learned_record() {
        let mut store = ZoneStore::new();
        let record = a_record("foo.local.", Ipv4Addr::new(1, 2, 3, 4));

        store.add(Entry::learned(record.clone(), source(), Utc::now()));
        store.add(Entry::published(record.clone()));
        // a learned copy never demotes a published one
        assert_eq!(store.add(Entry::learned(record, source(), Utc::now())), AddOutcome::Duplicate);

        let found = store.query(&Question::new(name("foo.local."), RecordType::A));
        assert_eq!(found.len(), 1);
        assert!(found[0].publish);
        assert!(found[0].expires.is_none());
    }

    #[test]
    fn test_sweep_removes_only_expired_learned_entries() {
        let mut store = ssh_store();
        let now = Utc::now();
        let mut short = a_record("peer.local.", Ipv4Addr::new(10, 0, 0, 9));
        short.set_ttl(10);
        store.add(Entry::learned(short, source(), now));
        store.add(Entry::learned(a_record("other.local.", Ipv4Addr::new(10, 0, 0, 8)), source(), now));

        assert_eq!(store.sweep(now + chrono::Duration::seconds(60)), 1);
        assert_eq!(store.len(), 5);
        assert!(store.query(&Question::new(name("peer.local."), RecordType::ANY)).is_empty());
    }
}
