use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use crate::room::RoomRegistry;
use crate::types::ChatMessage;

/// A generated response waiting to become visible in its room.
#[derive(Debug)]
pub struct PendingDelivery {
    pub room_id: String,
    pub persona_id: String,
    pub content: String,
    /// How long to hold the message before appending, simulating typing time.
    pub delay: Duration,
}

/// Single-lane, time-ordered release of generated messages into room history.
///
/// The consumer task processes items strictly in enqueue order — it never
/// reorders by delay across batches — so callers that want delay ordering
/// must pre-sort before enqueueing (the orchestrator does).
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<PendingDelivery>,
}

impl DeliveryQueue {
    /// Spawn the consumer task against the shared room registry.
    pub fn spawn(rooms: Arc<RwLock<RoomRegistry>>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PendingDelivery>();

        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                tokio::time::sleep(item.delay).await;

                let mut rooms = rooms.write().await;
                match rooms.get_mut(&item.room_id) {
                    Some(room) => {
                        debug!(
                            room = %item.room_id,
                            persona = %item.persona_id,
                            delay_ms = item.delay.as_millis() as u64,
                            "delivering agent message"
                        );
                        room.append(ChatMessage::agent(&item.persona_id, item.content));
                    }
                    None => {
                        warn!(room = %item.room_id, "dropping delivery for unknown room");
                    }
                }
            }
        });

        Self { tx }
    }

    /// Hand a response to the queue. Never blocks; delivery happens after the
    /// item's delay, in strict enqueue order.
    pub fn enqueue(&self, item: PendingDelivery) {
        if self.tx.send(item).is_err() {
            warn!("delivery queue is closed, message dropped");
        }
    }
}
