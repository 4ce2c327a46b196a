//! Fan-out of leaderboard updates to connected observers.

use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::LeaderboardUpdate;

/// Per-observer backlog before the oldest update is dropped.
pub const DEFAULT_CAPACITY: usize = 64;

/// Publish/subscribe hub between the coordinator and its observers.
///
/// Delivery is fire-and-forget per observer: publishing never blocks on a
/// slow or disconnected subscriber. Each observer owns a bounded backlog with
/// a drop-oldest policy; one that falls more than [`DEFAULT_CAPACITY`] updates
/// behind sees a `Lagged` notice and resumes at the oldest retained update.
/// Dropping the receiver unsubscribes; both directions are idempotent.
pub struct BroadcastHub {
    tx: broadcast::Sender<LeaderboardUpdate>,
    last: RwLock<Option<LeaderboardUpdate>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            last: RwLock::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LeaderboardUpdate> {
        self.tx.subscribe()
    }

    /// Delivers `update` to every current subscriber and retains it as the
    /// snapshot for late joiners. Having no subscribers is not an error.
    pub async fn publish(&self, update: LeaderboardUpdate) {
        *self.last.write().await = Some(update.clone());
        match self.tx.send(update) {
            Ok(observers) => debug!("Leaderboard update delivered to {observers} observers"),
            Err(_) => debug!("No observers subscribed, update retained as snapshot"),
        }
    }

    /// Most recent published update; `None` before any update has occurred.
    pub async fn snapshot(&self) -> Option<LeaderboardUpdate> {
        self.last.read().await.clone()
    }

    pub fn observers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::leaderboard::RankEntry;

    fn update(user: &str, score: i64) -> LeaderboardUpdate {
        LeaderboardUpdate {
            leaderboard: vec![RankEntry {
                username: user.to_owned(),
                score,
            }],
            updated_user: Some(user.to_owned()),
            points_earned: Some(score),
            challenge_name: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn snapshot_is_none_before_first_publish() {
        let hub = BroadcastHub::default();
        assert!(hub.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn publish_reaches_subscriber_and_updates_snapshot() {
        let hub = BroadcastHub::default();
        let mut rx = hub.subscribe();

        hub.publish(update("alice", 10)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.updated_user.as_deref(), Some("alice"));
        assert_eq!(
            hub.snapshot().await.unwrap().updated_user.as_deref(),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_still_snapshots() {
        let hub = BroadcastHub::default();
        hub.publish(update("bob", 20)).await;
        assert_eq!(hub.observers(), 0);
        assert_eq!(
            hub.snapshot().await.unwrap().updated_user.as_deref(),
            Some("bob")
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_at_oldest_retained() {
        let hub = BroadcastHub::new(4);
        let mut rx = hub.subscribe();

        for i in 0..10 {
            hub.publish(update("alice", i)).await;
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => assert_eq!(skipped, 6),
            other => panic!("expected lagged notice, got {other:?}"),
        }
        let next = rx.recv().await.unwrap();
        assert_eq!(next.points_earned, Some(6));
    }
}
