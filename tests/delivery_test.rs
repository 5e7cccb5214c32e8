use banter::delivery::{DeliveryQueue, PendingDelivery};
use banter::room::{RoomRegistry, RoomSession};
use banter::types::MessageKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

fn registry_with_room(id: &str) -> Arc<RwLock<RoomRegistry>> {
    let mut registry = RoomRegistry::new();
    registry.insert(RoomSession::new(id, "Test Room", ""));
    Arc::new(RwLock::new(registry))
}

async fn wait_for_history(rooms: &Arc<RwLock<RoomRegistry>>, room_id: &str, len: usize) {
    for _ in 0..100 {
        {
            let rooms = rooms.read().await;
            if rooms.get(room_id).expect("room exists").history_len() >= len {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("history never reached {len} messages");
}

#[tokio::test]
async fn delivers_after_delay_as_agent_message() {
    let rooms = registry_with_room("lounge");
    let queue = DeliveryQueue::spawn(Arc::clone(&rooms));

    queue.enqueue(PendingDelivery {
        room_id: "lounge".into(),
        persona_id: "nova".into(),
        content: "hello from nova".into(),
        delay: Duration::from_millis(20),
    });

    wait_for_history(&rooms, "lounge", 1).await;
    let rooms = rooms.read().await;
    let room = rooms.get("lounge").expect("room exists");
    let message = &room.page()[0];
    assert_eq!(message.author, "nova");
    assert_eq!(message.content, "hello from nova");
    assert_eq!(message.kind, MessageKind::Agent);
}

#[tokio::test]
async fn enqueue_order_wins_over_delay_order() {
    let rooms = registry_with_room("lounge");
    let queue = DeliveryQueue::spawn(Arc::clone(&rooms));

    // The first item has the longer delay; strict FIFO still delivers it first.
    queue.enqueue(PendingDelivery {
        room_id: "lounge".into(),
        persona_id: "slow".into(),
        content: "queued first".into(),
        delay: Duration::from_millis(50),
    });
    queue.enqueue(PendingDelivery {
        room_id: "lounge".into(),
        persona_id: "fast".into(),
        content: "queued second".into(),
        delay: Duration::from_millis(0),
    });

    wait_for_history(&rooms, "lounge", 2).await;
    let rooms = rooms.read().await;
    let room = rooms.get("lounge").expect("room exists");
    let authors: Vec<&str> = room.page().iter().map(|m| m.author.as_str()).collect();
    assert_eq!(authors, vec!["slow", "fast"]);
}

#[tokio::test]
async fn unknown_room_deliveries_are_dropped() {
    let rooms = registry_with_room("lounge");
    let queue = DeliveryQueue::spawn(Arc::clone(&rooms));

    queue.enqueue(PendingDelivery {
        room_id: "nowhere".into(),
        persona_id: "nova".into(),
        content: "lost".into(),
        delay: Duration::from_millis(0),
    });
    queue.enqueue(PendingDelivery {
        room_id: "lounge".into(),
        persona_id: "nova".into(),
        content: "arrives".into(),
        delay: Duration::from_millis(0),
    });

    wait_for_history(&rooms, "lounge", 1).await;
    let rooms = rooms.read().await;
    assert_eq!(rooms.get("lounge").expect("room").history_len(), 1);
}
