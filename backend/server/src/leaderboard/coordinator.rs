//! Applies score deltas across both stores and publishes the updated view.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{BroadcastHub, LeaderboardUpdate, RankCache, RankEntry, ScoreStore};
use crate::error::{AppError, AppResult};

pub const DEFAULT_POINTS: i64 = 10;
pub const DEFAULT_CHALLENGE: &str = "Unknown Challenge";

/// Owner of the dual-store consistency invariant.
///
/// All mutations flow through [`complete_challenge`]: durable write first,
/// cache propagation second, so a storage failure leaves the cache untouched
/// and the inconsistency window is bounded to the gap between the two writes
/// inside the per-username critical section. Deltas for the same username are
/// mutually exclusive; distinct usernames never block each other.
///
/// [`complete_challenge`]: LeaderboardCoordinator::complete_challenge
pub struct LeaderboardCoordinator {
    store: Arc<dyn ScoreStore>,
    cache: Option<Arc<dyn RankCache>>,
    hub: Arc<BroadcastHub>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    top_size: usize,
    op_timeout: Duration,
}

impl LeaderboardCoordinator {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        cache: Option<Arc<dyn RankCache>>,
        hub: Arc<BroadcastHub>,
        top_size: usize,
        op_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            hub,
            locks: DashMap::new(),
            top_size,
            op_timeout,
        }
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Applies a challenge completion for `username` and returns the snapshot
    /// that was fanned out to all observers, as the caller's acknowledgment.
    ///
    /// `points` defaults to 10; zero and negative deltas are accepted. The
    /// only hard failure is the durable write: a cache failure degrades to
    /// store-backed rankings and never aborts the operation.
    pub async fn complete_challenge(
        &self,
        username: &str,
        points: Option<i64>,
        challenge_name: Option<String>,
    ) -> AppResult<LeaderboardUpdate> {
        if username.trim().is_empty() {
            return Err(AppError::Validation("Username is required".to_owned()));
        }
        let points = points.unwrap_or(DEFAULT_POINTS);
        let challenge = challenge_name.unwrap_or_else(|| DEFAULT_CHALLENGE.to_owned());

        let lock = self.user_lock(username);
        let update = {
            let _serial = lock.lock().await;

            let write = timeout(self.op_timeout, self.store.upsert_delta(username, points))
                .await
                .map_err(|_| AppError::Storage(format!("score write for {username} timed out")))??;

            if let Some(cache) = &self.cache {
                // A brand-new record may have been clamped to zero by the
                // store's seed rule; pushing the seeded value instead of the
                // raw delta keeps both stores in agreement from write one.
                let propagate = async {
                    if write.created {
                        cache.set_score(username, write.user.score).await?;
                        Ok(write.user.score)
                    } else {
                        cache.increment_score(username, points).await
                    }
                };
                match timeout(self.op_timeout, propagate).await {
                    Ok(Ok(score)) => {
                        debug!("Updated {username} score to {score}");
                    }
                    Ok(Err(e)) => {
                        warn!("Rank cache write for {username} failed, serving from durable store: {e}");
                    }
                    Err(_) => {
                        warn!("Rank cache write for {username} timed out, serving from durable store");
                    }
                }
            }

            let leaderboard = self.ranked_view(self.top_size).await?;
            LeaderboardUpdate {
                leaderboard,
                updated_user: Some(username.to_owned()),
                points_earned: Some(points),
                challenge_name: Some(challenge),
                timestamp: Utc::now(),
            }
        };

        self.hub.publish(update.clone()).await;
        Ok(update)
    }

    /// Read-only top-N; works before any update has ever occurred.
    pub async fn leaderboard(&self, n: usize) -> AppResult<Vec<RankEntry>> {
        self.ranked_view(n).await
    }

    /// Current view for a late joiner: the last published snapshot when one
    /// exists, otherwise a view computed fresh from the stores.
    pub async fn join(&self) -> AppResult<LeaderboardUpdate> {
        if let Some(update) = self.hub.snapshot().await {
            return Ok(update);
        }
        let leaderboard = self.ranked_view(self.top_size).await?;
        Ok(LeaderboardUpdate {
            leaderboard,
            updated_user: None,
            points_earned: None,
            challenge_name: None,
            timestamp: Utc::now(),
        })
    }

    fn user_lock(&self, username: &str) -> Arc<Mutex<()>> {
        self.locks.entry(username.to_owned()).or_default().clone()
    }

    async fn ranked_view(&self, n: usize) -> AppResult<Vec<RankEntry>> {
        if let Some(cache) = &self.cache {
            match timeout(self.op_timeout, cache.top_n(n)).await {
                Ok(Ok(entries)) => return Ok(entries),
                Ok(Err(e)) => {
                    warn!("Rank cache read failed, falling back to durable store: {e}");
                }
                Err(_) => {
                    warn!("Rank cache read timed out, falling back to durable store");
                }
            }
        }
        timeout(self.op_timeout, self.store.top_n(n))
            .await
            .map_err(|_| AppError::Storage("ranked read timed out".to_owned()))?
    }
}
