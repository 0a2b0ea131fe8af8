use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use flyweight_api::NetAddress;
use flyweight_api::packet::{AckData, Packet};
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// ACK-IDs cycle through 1..=127; 0 means "no ACK wanted".
pub const MAX_ACK_ID: u8 = 127;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckState {
    #[default]
    Invalid,
    Pending,
    Succeeded,
    NoResponse,
}

#[derive(Debug, Default)]
struct Delivery {
    state: AckState,
    ack_data: Option<AckData>,
    send_count: u32,
}

/// An outbound packet waiting for its ACK.
#[derive(Debug)]
pub struct PendingPacket {
    packet: Packet,
    created_at: OffsetDateTime,
    delivery: Mutex<Delivery>,
}

impl PendingPacket {
    fn new(packet: Packet) -> Self {
        Self {
            packet,
            created_at: OffsetDateTime::now_utc(),
            delivery: Mutex::new(Delivery {
                state: AckState::Pending,
                ..Default::default()
            }),
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn ack_id(&self) -> u8 {
        self.packet.ack_id
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub async fn state(&self) -> AckState {
        self.delivery.lock().await.state
    }

    pub async fn ack_data(&self) -> Option<AckData> {
        self.delivery.lock().await.ack_data
    }

    pub async fn send_count(&self) -> u32 {
        self.delivery.lock().await.send_count
    }

    pub(crate) async fn record_send(&self) {
        self.delivery.lock().await.send_count += 1;
    }

    /// Gives up on the packet; used by issuers whose retries ran out.
    pub async fn mark_no_response(&self) {
        let mut delivery = self.delivery.lock().await;
        if delivery.state == AckState::Pending {
            delivery.state = AckState::NoResponse;
        }
    }

    async fn complete(&self, data: AckData) {
        let mut delivery = self.delivery.lock().await;
        delivery.ack_data = Some(data);
        delivery.state = AckState::Succeeded;
    }
}

type AckQueue = Arc<Mutex<VecDeque<Arc<PendingPacket>>>>;

/// Per-destination bounded queues of packets awaiting acknowledgment.
///
/// Each destination has its own lock so one congested device does not hold
/// up bookkeeping for the others. A full queue evicts its oldest entry and
/// marks it `NoResponse`. A queue never holds more entries than there are
/// ACK-IDs, and no two entries in one queue share an ACK-ID.
#[derive(Debug)]
pub struct AckService {
    capacity: usize,
    next_ack_id: AtomicU8,
    queues: RwLock<HashMap<NetAddress, AckQueue>>,
}

impl AckService {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.clamp(1, MAX_ACK_ID as usize),
            next_ack_id: AtomicU8::new(1),
            queues: RwLock::new(HashMap::new()),
        }
    }

    /// Hands out the next ACK-ID, wrapping from 127 back to 1.
    pub fn next_ack_id(&self) -> u8 {
        self.next_ack_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| {
                Some(if id >= MAX_ACK_ID { 1 } else { id + 1 })
            })
            .unwrap_or(1)
    }

    async fn queue_for(&self, address: NetAddress) -> AckQueue {
        if let Some(queue) = self.queues.read().await.get(&address) {
            return queue.clone();
        }
        self.queues
            .write()
            .await
            .entry(address)
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity))))
            .clone()
    }

    /// Next ACK-ID not already outstanding in `queue`.
    fn free_ack_id(&self, queue: &VecDeque<Arc<PendingPacket>>) -> u8 {
        let first = self.next_ack_id();
        let mut ack_id = first;
        // The queue is below capacity here, so some id in 1..=127 is free
        while queue.iter().any(|p| p.ack_id() == ack_id) {
            ack_id = self.next_ack_id();
            if ack_id == first {
                break;
            }
        }
        ack_id
    }

    /// Stamps the packet with a fresh ACK-ID and queues it for its destination.
    pub async fn enqueue(&self, packet: Packet) -> Arc<PendingPacket> {
        let dst = packet.dst;
        let queue = self.queue_for(dst).await;
        let mut queue = queue.lock().await;

        if queue.len() >= self.capacity {
            if let Some(evicted) = queue.pop_front() {
                warn!(
                    "Dropping packet because pending ACK queue for {} is full: ackid {} queued {}s ago",
                    dst,
                    evicted.ack_id(),
                    (OffsetDateTime::now_utc() - evicted.created_at()).whole_seconds()
                );
                evicted.mark_no_response().await;
            }
        }

        let ack_id = self.free_ack_id(&queue);
        let pending = Arc::new(PendingPacket::new(packet.with_ack_id(ack_id)));
        queue.push_back(pending.clone());
        debug!("Queued ackid {} for {} ({} pending)", ack_id, dst, queue.len());

        pending
    }

    /// Matches an inbound ACK against the source's queue.
    ///
    /// The matched entry is removed and marked `Succeeded`. Unmatched ACKs
    /// leave every queue untouched.
    pub async fn reconcile(
        &self,
        src: NetAddress,
        ack_id: u8,
        data: AckData,
    ) -> Option<Arc<PendingPacket>> {
        let queue = self.queues.read().await.get(&src).cloned()?;
        let pending = {
            let mut queue = queue.lock().await;
            let index = queue.iter().position(|p| p.ack_id() == ack_id)?;
            queue.remove(index)?
        };

        pending.complete(data).await;
        debug!("ACK {} from {} succeeded", ack_id, src);
        Some(pending)
    }

    /// Drops everything queued for `address`, returning how many were pending.
    pub async fn clear(&self, address: NetAddress) -> usize {
        let Some(queue) = self.queues.read().await.get(&address).cloned() else {
            return 0;
        };
        let mut queue = queue.lock().await;
        let cleared = queue.len();
        queue.clear();
        if cleared > 0 {
            debug!("Cleared {} pending ACKs for {}", cleared, address);
        }
        cleared
    }

    pub async fn pending(&self, address: NetAddress) -> Vec<Arc<PendingPacket>> {
        let Some(queue) = self.queues.read().await.get(&address).cloned() else {
            return Vec::new();
        };
        let queue = queue.lock().await;
        queue.iter().cloned().collect()
    }
}
