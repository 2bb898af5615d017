use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use hickory_proto::rr::RecordType;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use crate::config::ZoneConfig;
use crate::zone::store::{AddOutcome, ZoneStore};
use crate::zone::{Entry, Question, Subscription, SubscriptionId, Zone};

/// Commands sent to the zone thread
pub enum ZoneCommand {
    Add(Entry),
    Query(Question, oneshot::Sender<Vec<Entry>>),
    QueryAdditional(Question, oneshot::Sender<(Vec<Entry>, Vec<Entry>)>),
    Subscribe {
        id: SubscriptionId,
        record_type: RecordType,
        sink: mpsc::UnboundedSender<Entry>,
    },
    Unsubscribe(SubscriptionId),
    Sweep(oneshot::Sender<usize>),
    Shutdown,
}

/// Handle to the zone thread. The thread is the only owner of the records.
#[derive(Clone)]
pub struct ZoneHandle {
    tx: mpsc::Sender<ZoneCommand>,
    next_subscription: Arc<AtomicU64>,
}

impl ZoneHandle {
    /// Spawn the zone thread with a mailbox of `capacity` commands (at least one)
    pub fn spawn(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<ZoneCommand>(capacity.max(1));

        thread::spawn(move || {
            let mut store = ZoneStore::new();

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    ZoneCommand::Add(entry) => {
                        let name = entry.name().clone();
                        let record_type = entry.record_type();
                        if store.add(entry) == AddOutcome::Inserted {
                            tracing::debug!(%name, %record_type, "Added record");
                        }
                    }
                    ZoneCommand::Query(question, reply) => {
                        let _ = reply.send(store.query(&question));
                    }
                    ZoneCommand::QueryAdditional(question, reply) => {
                        let _ = reply.send(store.query_additional(&question));
                    }
                    ZoneCommand::Subscribe { id, record_type, sink } => {
                        store.subscribe(id, record_type, sink);
                        tracing::debug!(
                            "Registered subscription {} for {} ({} active)",
                            id,
                            record_type,
                            store.subscriber_count()
                        );
                    }
                    ZoneCommand::Unsubscribe(id) => {
                        if !store.unsubscribe(id) {
                            tracing::debug!("Unsubscribe for unknown subscription {}", id);
                        }
                    }
                    ZoneCommand::Sweep(reply) => {
                        let removed = store.sweep(Utc::now());
                        tracing::debug!("Swept {} records, {} remain", removed, store.len());
                        let _ = reply.send(removed);
                    }
                    ZoneCommand::Shutdown => {
                        tracing::info!("Zone thread shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            tx,
            next_subscription: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Remove learned records whose lifetime has ended. Returns how many.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ZoneCommand::Sweep(reply)).await?;
        Ok(rx.await?)
    }

    /// Shutdown the zone thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(ZoneCommand::Shutdown).await?;
        Ok(())
    }
}

#[async_trait]
impl Zone for ZoneHandle {
    async fn add(&self, entry: Entry) -> Result<()> {
        self.tx.send(ZoneCommand::Add(entry)).await?;
        Ok(())
    }

    async fn query(&self, question: Question) -> Result<Vec<Entry>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ZoneCommand::Query(question, reply)).await?;
        Ok(rx.await?)
    }

    async fn query_additional(&self, question: Question) -> Result<(Vec<Entry>, Vec<Entry>)> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ZoneCommand::QueryAdditional(question, reply)).await?;
        Ok(rx.await?)
    }

    async fn subscribe(&self, record_type: RecordType) -> Result<Subscription> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (sink, rx) = mpsc::unbounded_channel();
        self.tx
            .send(ZoneCommand::Subscribe { id, record_type, sink })
            .await?;
        Ok(Subscription::new(id, rx))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.tx.send(ZoneCommand::Unsubscribe(id)).await?;
        Ok(())
    }
}

/// Zone maintenance loop - periodically sweeps expired learned records
pub async fn run(zone: ZoneHandle, config: ZoneConfig, cancel: CancellationToken) -> Result<()> {
    let mut maintenance_interval = tokio::time::interval(
        std::time::Duration::from_secs(config.maintenance_interval_secs.max(1))
    );

    loop {
        tokio::select! {
            _ = maintenance_interval.tick() => {
                match zone.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Swept {} expired records", removed),
                    Err(e) => tracing::error!("Failed to sweep zone: {}", e),
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Zone maintenance shutting down");
                break;
            }
        }
    }

    Ok(())
}
