use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::Result;
use chrono::Utc;
use hickory_proto::op::{Message, MessageType, OpCode};
use shared::protocol::RECV_BUFFER_SIZE;
use shared::types::ResponderStats;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use crate::zone::{Entry, Question, Zone};
use super::error::ConnectorError;
use super::socket::bind_multicast;

/// Counters for one responder, shared with the API.
#[derive(Debug)]
pub struct ConnectorStats {
    group: SocketAddr,
    received: AtomicU64,
    decode_errors: AtomicU64,
    responses_sent: AtomicU64,
    encode_errors: AtomicU64,
    send_errors: AtomicU64,
    records_learned: AtomicU64,
    restarts: AtomicU64,
}

impl ConnectorStats {
    pub fn new(group: SocketAddr) -> Self {
        Self {
            group,
            received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            responses_sent: AtomicU64::new(0),
            encode_errors: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            records_learned: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ResponderStats {
        ResponderStats {
            group: self.group.to_string(),
            received: self.received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            records_learned: self.records_learned.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }
}

/// Delay between attempts to reopen a failed responder socket
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// Both bounds are at least one second and `max` never drops below `initial`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_secs(1));
        Self {
            initial,
            max: max.max(initial),
        }
    }

    fn next(&self, delay: Duration) -> Duration {
        (delay * 2).clamp(self.initial, self.max)
    }
}

struct Inbound {
    message: Message,
    from: SocketAddr,
}

/// Answers questions and learns answers for one multicast group.
pub struct Connector<Z> {
    group: SocketAddr,
    zone: Z,
    stats: Arc<ConnectorStats>,
    queue_capacity: usize,
}

impl<Z: Zone> Connector<Z> {
    pub fn new(group: SocketAddr, zone: Z, queue_capacity: usize) -> Self {
        Self {
            group,
            zone,
            stats: Arc::new(ConnectorStats::new(group)),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn stats(&self) -> Arc<ConnectorStats> {
        self.stats.clone()
    }

    /// Process one decoded message, returning the packed response to send
    /// back to `from`, if any.
    pub async fn handle(&self, message: &Message, from: SocketAddr) -> Option<Vec<u8>> {
        match message.message_type() {
            MessageType::Query => {
                let response = match self.respond(message).await {
                    Ok(Some(response)) => response,
                    Ok(None) => return None,
                    Err(e) => {
                        tracing::error!(group = %self.group, "Zone lookup failed: {}", e);
                        return None;
                    }
                };
                match encode(&response) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        ConnectorStats::bump(&self.stats.encode_errors);
                        tracing::warn!(group = %self.group, peer = %from, "{}", e);
                        None
                    }
                }
            }
            MessageType::Response => {
                if let Err(e) = self.ingest(message, from).await {
                    tracing::error!(group = %self.group, "Failed to store learned records: {}", e);
                }
                None
            }
        }
    }

    async fn respond(&self, message: &Message) -> Result<Option<Message>> {
        let mut answers: Vec<Entry> = Vec::new();
        let mut additionals: Vec<Entry> = Vec::new();

        for query in message.queries() {
            let (found, extra) = self.zone.query_additional(Question::from(query)).await?;
            for entry in found.into_iter().filter(|e| e.publish) {
                push_unique(&mut answers, entry);
            }
            for entry in extra.into_iter().filter(|e| e.publish) {
                push_unique(&mut additionals, entry);
            }
        }

        if answers.is_empty() {
            return Ok(None);
        }
        additionals.retain(|extra| !answers.iter().any(|e| e.is_same_record(extra)));

        let mut response = Message::new();
        response
            .set_id(message.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_authoritative(true);
        response.add_answers(answers.into_iter().map(|e| e.record));
        response.add_additionals(additionals.into_iter().map(|e| e.record));

        Ok(Some(response))
    }

    async fn ingest(&self, message: &Message, from: SocketAddr) -> Result<()> {
        let received = Utc::now();
        for record in message.answers() {
            tracing::debug!(
                group = %self.group,
                peer = %from,
                name = %record.name(),
                record_type = %record.record_type(),
                "Learned record"
            );
            self.zone.add(Entry::learned(record.clone(), from, received)).await?;
            ConnectorStats::bump(&self.stats.records_learned);
        }
        Ok(())
    }

    async fn send(&self, socket: &UdpSocket, bytes: &[u8], to: SocketAddr) {
        match socket.send_to(bytes, to).await {
            Ok(_) => {
                ConnectorStats::bump(&self.stats.responses_sent);
                tracing::debug!(group = %self.group, peer = %to, "Sent response");
            }
            Err(e) => {
                ConnectorStats::bump(&self.stats.send_errors);
                tracing::warn!(group = %self.group, peer = %to, "Failed to send response: {}", e);
            }
        }
    }

    /// Serve on `socket` until cancelled or the socket fails. Receiving runs
    /// on its own task so that answering never holds up the next read.
    pub async fn run(&self, socket: Arc<UdpSocket>, cancel: &CancellationToken) -> Result<(), ConnectorError> {
        let (tx, mut rx) = mpsc::channel(self.queue_capacity);
        let mut reader = tokio::spawn(read_loop(socket.clone(), tx, self.stats.clone()));

        loop {
            tokio::select! {
                Some(inbound) = rx.recv() => {
                    if let Some(response) = self.handle(&inbound.message, inbound.from).await {
                        self.send(&socket, &response, inbound.from).await;
                    }
                }
                joined = &mut reader => {
                    return match joined {
                        Ok(result) => result,
                        Err(e) => Err(ConnectorError::Task(e.to_string())),
                    };
                }
                _ = cancel.cancelled() => {
                    reader.abort();
                    return Ok(());
                }
            }
        }
    }

    /// Run the responder, reopening its socket with backoff whenever it
    /// fails. Only this group is affected by a failure.
    pub async fn supervise(self, socket: UdpSocket, backoff: Backoff, cancel: CancellationToken) {
        let mut socket = Arc::new(socket);
        let mut delay = backoff.initial;
        tracing::info!(group = %self.group, "Responder listening");

        loop {
            let started = Instant::now();
            match self.run(socket.clone(), &cancel).await {
                Ok(()) => break,
                Err(e) => tracing::error!(group = %self.group, "Responder failed: {}", e),
            }
            if started.elapsed() > backoff.max {
                delay = backoff.initial;
            }

            socket = loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        tracing::info!(group = %self.group, "Responder shutting down");
                        return;
                    }
                }
                delay = backoff.next(delay);
                match bind_multicast(self.group) {
                    Ok(socket) => break Arc::new(socket),
                    Err(e) => tracing::warn!(group = %self.group, "Failed to reopen socket: {}", e),
                }
            };
            ConnectorStats::bump(&self.stats.restarts);
            tracing::info!(group = %self.group, "Responder restarted");
        }

        tracing::info!(group = %self.group, "Responder shutting down");
    }
}

fn push_unique(list: &mut Vec<Entry>, entry: Entry) {
    if !list.iter().any(|e| e.is_same_record(&entry)) {
        list.push(entry);
    }
}

fn encode(message: &Message) -> Result<Vec<u8>, ConnectorError> {
    Ok(message.to_vec()?)
}

/// Receive and decode datagrams. Malformed datagrams are counted and dropped;
/// only a socket error ends the loop.
async fn read_loop(
    socket: Arc<UdpSocket>,
    tx: mpsc::Sender<Inbound>,
    stats: Arc<ConnectorStats>,
) -> Result<(), ConnectorError> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let (len, from) = socket.recv_from(&mut buf).await.map_err(ConnectorError::Read)?;
        ConnectorStats::bump(&stats.received);

        match Message::from_vec(&buf[..len]) {
            Ok(message) => {
                if tx.send(Inbound { message, from }).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => {
                ConnectorStats::bump(&stats.decode_errors);
                tracing::warn!(group = %stats.group, peer = %from, "Discarding malformed message: {}", e);
            }
        }
    }
}
