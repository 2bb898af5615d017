pub mod entry;
pub mod query;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;
use hickory_proto::rr::RecordType;

pub use entry::Entry;
pub use query::{Question, Subscription, SubscriptionId};

/// The operations publishers and responders may perform on a zone.
///
/// Implementations must linearize every call: a query issued after an add has
/// been accepted observes that add.
#[async_trait]
pub trait Zone: Send + Sync {
    /// Store an entry unless an identical record already exists under its name.
    async fn add(&self, entry: Entry) -> Result<()>;

    /// Snapshot of the stored entries matching `question`.
    async fn query(&self, question: Question) -> Result<Vec<Entry>>;

    /// Matching entries plus the records a response should carry alongside them.
    async fn query_additional(&self, question: Question) -> Result<(Vec<Entry>, Vec<Entry>)>;

    /// Receive every entry of `record_type` added from now on.
    async fn subscribe(&self, record_type: RecordType) -> Result<Subscription>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}
