use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use quizroom_common::protocol::ServerMessage;
use quizroom_common::room::{RoomId, RoomStatus};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    ParticipantsChanged,
    StatusChanged(RoomStatus),
}

impl RoomEvent {
    fn into_message(self, room_id: RoomId) -> ServerMessage {
        match self {
            RoomEvent::ParticipantsChanged => ServerMessage::ParticipantsChanged { room_id },
            RoomEvent::StatusChanged(status) => ServerMessage::RoomStatusChanged { room_id, status },
        }
    }
}

/// Per-room fan-out of membership and status changes.
pub struct Notifier {
    channels: Mutex<HashMap<RoomId, broadcast::Sender<RoomEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<RoomId, broadcast::Sender<RoomEvent>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe(&self, room_id: RoomId) -> broadcast::Receiver<RoomEvent> {
        self.channels()
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, room_id: RoomId, event: RoomEvent) {
        let mut channels = self.channels();
        let Some(tx) = channels.get(&room_id) else {
            return;
        };
        match tx.send(event) {
            Ok(n) => tracing::debug!("Room {} event {:?} -> {} subscribers", room_id, event, n),
            // Everyone left; drop the channel so idle rooms don't accumulate.
            Err(_) => {
                channels.remove(&room_id);
            }
        }
    }

    /// Drops the room's channel. Subscribers drain what is buffered and
    /// then see the channel close.
    pub fn close_room(&self, room_id: RoomId) {
        self.channels().remove(&room_id);
    }

    /// Removes the room's channel if nobody is listening any more.
    fn prune(&self, room_id: RoomId) {
        let mut channels = self.channels();
        if channels
            .get(&room_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            channels.remove(&room_id);
            tracing::debug!("Dropped idle channel for room {}", room_id);
        }
    }

    #[cfg(test)]
    fn has_channel(&self, room_id: RoomId) -> bool {
        self.channels().contains_key(&room_id)
    }

    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.channels()
            .get(&room_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Forwards the room's events into a connection's outbound queue until
    /// the returned handle is dropped.
    pub fn attach(
        self: &Arc<Self>,
        room_id: RoomId,
        tx: mpsc::Sender<ServerMessage>,
    ) -> Subscription {
        let mut listener = Listener {
            rx: Some(self.subscribe(room_id)),
            notifier: Arc::clone(self),
            room_id,
        };
        let task = tokio::spawn(async move {
            loop {
                let event = match listener.recv().await {
                    Ok(event) => event,
                    // Missed some; a refresh re-derives everything.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscriber for room {} lagged by {}", room_id, skipped);
                        RoomEvent::ParticipantsChanged
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if tx.send(event.into_message(room_id)).await.is_err() {
                    break;
                }
            }
        });
        tracing::info!("Subscription opened for room {}", room_id);
        Subscription { room_id, task }
    }
}

pub type SharedNotifier = Arc<Notifier>;

/// Receiving end owned by a forwarding task. Dropped with the task,
/// whether it finished or was aborted.
struct Listener {
    rx: Option<broadcast::Receiver<RoomEvent>>,
    notifier: SharedNotifier,
    room_id: RoomId,
}

impl Listener {
    async fn recv(&mut self) -> Result<RoomEvent, broadcast::error::RecvError> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => Err(broadcast::error::RecvError::Closed),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        // The receiver must be gone before the count is checked.
        drop(self.rx.take());
        self.notifier.prune(self.room_id);
    }
}

/// A live room subscription. Dropping it stops delivery.
pub struct Subscription {
    room_id: RoomId,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::info!("Subscription released for room {}", self.room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    async fn next(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let notifier = Arc::new(Notifier::new());
        let room_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        let _sub = notifier.attach(room_id, tx);

        notifier.publish(room_id, RoomEvent::ParticipantsChanged);
        notifier.publish(room_id, RoomEvent::StatusChanged(RoomStatus::Active));

        assert!(matches!(
            next(&mut rx).await,
            ServerMessage::ParticipantsChanged { room_id: id } if id == room_id
        ));
        assert!(matches!(
            next(&mut rx).await,
            ServerMessage::RoomStatusChanged { status: RoomStatus::Active, .. }
        ));
    }

    #[tokio::test]
    async fn test_other_rooms_are_not_delivered() {
        let notifier = Arc::new(Notifier::new());
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        let _sub = notifier.attach(mine, tx);
        let (other_tx, _other_rx) = mpsc::channel(8);
        let _other_sub = notifier.attach(other, other_tx);

        notifier.publish(other, RoomEvent::ParticipantsChanged);
        notifier.publish(mine, RoomEvent::StatusChanged(RoomStatus::Ended));

        assert!(matches!(
            next(&mut rx).await,
            ServerMessage::RoomStatusChanged { room_id, status: RoomStatus::Ended } if room_id == mine
        ));
    }

    #[tokio::test]
    async fn test_dropping_subscription_stops_delivery() {
        let notifier = Arc::new(Notifier::new());
        let room_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        let sub = notifier.attach(room_id, tx);
        assert_eq!(sub.room_id(), room_id);
        drop(sub);

        // The aborted task drops the only sender clone.
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out");
        assert!(closed.is_none());

        notifier.publish(room_id, RoomEvent::ParticipantsChanged);
        assert_eq!(notifier.subscriber_count(room_id), 0);
    }

    #[tokio::test]
    async fn test_close_room_ends_forwarding() {
        let notifier = Arc::new(Notifier::new());
        let room_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        let _sub = notifier.attach(room_id, tx);

        notifier.publish(room_id, RoomEvent::StatusChanged(RoomStatus::Ended));
        notifier.close_room(room_id);

        assert!(matches!(
            next(&mut rx).await,
            ServerMessage::RoomStatusChanged { status: RoomStatus::Ended, .. }
        ));
        let closed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out");
        assert!(closed.is_none());
    }

    async fn wait_for_prune(notifier: &Notifier, room_id: RoomId) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while notifier.has_channel(room_id) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("channel was not dropped");
    }

    #[tokio::test]
    async fn test_last_unsubscribe_drops_channel() {
        let notifier = Arc::new(Notifier::new());
        let room_id = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(8);
        let first = notifier.attach(room_id, tx.clone());
        let second = notifier.attach(room_id, tx);
        assert_eq!(notifier.subscriber_count(room_id), 2);

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), async {
            while notifier.subscriber_count(room_id) != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first subscription still counted");
        assert!(notifier.has_channel(room_id));

        // No publish needed for the idle room to be forgotten.
        drop(second);
        wait_for_prune(&notifier, room_id).await;
        assert_eq!(notifier.subscriber_count(room_id), 0);
    }

    #[tokio::test]
    async fn test_resubscribe_after_prune() {
        let notifier = Arc::new(Notifier::new());
        let room_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        drop(notifier.attach(room_id, tx.clone()));
        wait_for_prune(&notifier, room_id).await;

        let _sub = notifier.attach(room_id, tx);
        notifier.publish(room_id, RoomEvent::ParticipantsChanged);
        assert!(matches!(
            next(&mut rx).await,
            ServerMessage::ParticipantsChanged { .. }
        ));
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let notifier = Notifier::new();
        let room_id = Uuid::new_v4();
        notifier.publish(room_id, RoomEvent::ParticipantsChanged);
        assert_eq!(notifier.subscriber_count(room_id), 0);
    }
}
