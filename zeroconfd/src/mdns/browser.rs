use anyhow::Result;
use hickory_proto::rr::RecordType;
use tokio_util::sync::CancellationToken;
use crate::zone::{Entry, Zone};

/// Log every record learned from the network until cancelled. Returns how
/// many learned records were seen.
pub async fn run_browser<Z: Zone + ?Sized>(zone: &Z, cancel: CancellationToken) -> Result<usize> {
    tracing::info!("Starting mDNS browser");

    let mut subscription = zone.subscribe(RecordType::ANY).await?;
    let mut discovered = 0;

    loop {
        tokio::select! {
            // drain what is already queued before honouring cancel
            biased;

            entry = subscription.recv() => {
                match entry {
                    Some(entry) if !entry.publish => {
                        discovered += 1;
                        log_discovery(&entry);
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!("Zone closed subscription {}", subscription.id());
                        return Ok(discovered);
                    }
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("mDNS browser shutting down");
                break;
            }
        }
    }

    zone.unsubscribe(subscription.id()).await?;
    Ok(discovered)
}

fn log_discovery(entry: &Entry) {
    let source = entry
        .source
        .map(|addr| addr.to_string())
        .unwrap_or_default();

    match entry.record_type() {
        RecordType::PTR => tracing::info!(
            source = %source,
            "Discovered service {} -> {}",
            entry.name(),
            entry.data()
        ),
        RecordType::SRV => tracing::info!(source = %source, "Resolved service {}: {}", entry.name(), entry.data()),
        _ => tracing::debug!(
            source = %source,
            "Discovered {} {} {}",
            entry.name(),
            entry.record_type(),
            entry.data()
        ),
    }
}
