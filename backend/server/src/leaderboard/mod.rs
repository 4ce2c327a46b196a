//! # Leaderboard
//!
//! The ranking subsystem behind challenge completions.
//!
//! Two stores hold the scores. The durable [`ScoreStore`] is authoritative and
//! survives restarts; the [`RankCache`] is an ordered in-memory index that
//! answers top-N queries without touching durable storage on every read. The
//! [`LeaderboardCoordinator`] owns the invariant that both agree: it applies
//! every delta to the durable store first, propagates it to the cache second,
//! and serializes writes per username so no two deltas for the same player can
//! interleave. The [`BroadcastHub`] fans the resulting snapshot out to every
//! connected observer.
//!
//! The cache is optional. When it is not provisioned, or a call to it fails or
//! times out, ranked reads fall back to the durable store. The only observable
//! difference on the fallback path is tie-break ordering among equal scores,
//! since the durable store has no recency signal.

pub mod broadcast;
pub mod coordinator;
pub mod rank_cache;
pub mod score_store;

pub use broadcast::BroadcastHub;
pub use coordinator::{DEFAULT_CHALLENGE, DEFAULT_POINTS, LeaderboardCoordinator};
pub use rank_cache::{MemoryRankCache, RankCache, RedisRankCache};
pub use score_store::{MeiliScoreStore, MemoryScoreStore, ScoreStore, ScoreWrite};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authoritative per-user score record.
///
/// Created implicitly on the first score-changing event for an unseen
/// username; never deleted by this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScore {
    pub username: String,
    pub score: i64,
    pub challenges_completed: u32,
}

/// One row of a ranked view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub username: String,
    pub score: i64,
}

/// Immutable point-in-time snapshot of the top-N scores, regenerated on every
/// accepted delta. Rank is the 1-based position in `leaderboard`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardUpdate {
    pub leaderboard: Vec<RankEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}
