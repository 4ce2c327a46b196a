//! Fast ranked index over usernames.
//!
//! [`RedisRankCache`] maps onto a Redis sorted set, the same shape the rest of
//! the platform's ephemeral state uses. [`MemoryRankCache`] keeps the ranking
//! in-process in an ordered set and is the backend that honors the
//! deterministic most-recent-wins tie-break for equal scores; Redis keeps its
//! lexical member ordering for ties, which callers accept as the documented
//! behavioral difference between the two.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::Mutex;

use super::RankEntry;
use crate::error::{AppError, AppResult};

/// Sorted-set key shared with the original deployment's tooling.
pub const LEADERBOARD_KEY: &str = "leaderboard";

/// Ordered, associative ranking keyed by username.
///
/// Every operation is atomic with respect to concurrent calls for the same or
/// different usernames. `increment_score` avoids the read-then-write race of
/// `get` + `set_score`. A failing cache is never fatal to callers: the
/// coordinator degrades to the durable store on any [`AppError::Cache`].
#[async_trait]
pub trait RankCache: Send + Sync {
    async fn set_score(&self, username: &str, score: i64) -> AppResult<()>;

    /// Adds `delta` to the username's score (inserting at `delta` when the
    /// entry is new) and returns the new score.
    async fn increment_score(&self, username: &str, delta: i64) -> AppResult<i64>;

    /// Top `n` entries, descending by score.
    async fn top_n(&self, n: usize) -> AppResult<Vec<RankEntry>>;

    async fn get(&self, username: &str) -> AppResult<Option<i64>>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// Ranking key ordered so that iteration order equals display order: higher
/// scores first, and among equal scores the most recently updated entry first.
#[derive(Debug, PartialEq, Eq)]
struct RankKey {
    score: i64,
    seq: u64,
    username: String,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| other.seq.cmp(&self.seq))
            .then_with(|| self.username.cmp(&other.username))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct RankTable {
    /// username -> (score, sequence of last update)
    entries: HashMap<String, (i64, u64)>,
    ordered: BTreeSet<RankKey>,
    next_seq: u64,
}

impl RankTable {
    fn put(&mut self, username: &str, score: i64) {
        if let Some((old_score, old_seq)) = self.entries.get(username) {
            self.ordered.remove(&RankKey {
                score: *old_score,
                seq: *old_seq,
                username: username.to_owned(),
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(username.to_owned(), (score, seq));
        self.ordered.insert(RankKey {
            score,
            seq,
            username: username.to_owned(),
        });
    }
}

#[derive(Default)]
pub struct MemoryRankCache {
    table: Mutex<RankTable>,
}

impl MemoryRankCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RankCache for MemoryRankCache {
    async fn set_score(&self, username: &str, score: i64) -> AppResult<()> {
        self.table.lock().await.put(username, score);
        Ok(())
    }

    async fn increment_score(&self, username: &str, delta: i64) -> AppResult<i64> {
        let mut table = self.table.lock().await;
        let current = table.entries.get(username).map(|(score, _)| *score).unwrap_or(0);
        let new_score = current + delta;
        table.put(username, new_score);
        Ok(new_score)
    }

    async fn top_n(&self, n: usize) -> AppResult<Vec<RankEntry>> {
        let table = self.table.lock().await;
        Ok(table
            .ordered
            .iter()
            .take(n)
            .map(|key| RankEntry {
                username: key.username.clone(),
                score: key.score,
            })
            .collect())
    }

    async fn get(&self, username: &str) -> AppResult<Option<i64>> {
        let table = self.table.lock().await;
        Ok(table.entries.get(username).map(|(score, _)| *score))
    }
}

// ---------------------------------------------------------------------------
// Redis backend
// ---------------------------------------------------------------------------

/// Sorted-set ranking over the shared [`ConnectionManager`]. `ZINCRBY` gives
/// the atomic relative update, `ZREVRANGE WITHSCORES` the ranked read.
pub struct RedisRankCache {
    conn: ConnectionManager,
    key: String,
}

impl RedisRankCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key: LEADERBOARD_KEY.to_owned(),
        }
    }
}

fn cache_err(e: redis::RedisError) -> AppError {
    AppError::Cache(e.to_string())
}

#[async_trait]
impl RankCache for RedisRankCache {
    async fn set_score(&self, username: &str, score: i64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(&self.key, username, score).await.map_err(cache_err)?;
        Ok(())
    }

    async fn increment_score(&self, username: &str, delta: i64) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        let new_score: f64 = conn.zincr(&self.key, username, delta).await.map_err(cache_err)?;
        Ok(new_score as i64)
    }

    async fn top_n(&self, n: usize) -> AppResult<Vec<RankEntry>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let entries: Vec<(String, f64)> = conn
            .zrevrange_withscores(&self.key, 0, n as isize - 1)
            .await
            .map_err(cache_err)?;
        Ok(entries
            .into_iter()
            .map(|(username, score)| RankEntry {
                username,
                score: score as i64,
            })
            .collect())
    }

    async fn get(&self, username: &str) -> AppResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn.zscore(&self.key, username).await.map_err(cache_err)?;
        Ok(score.map(|s| s as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn orders_descending_by_score() {
        let cache = MemoryRankCache::new();
        cache.set_score("alice", 15).await.unwrap();
        cache.set_score("bob", 20).await.unwrap();
        cache.set_score("carol", 5).await.unwrap();

        let top = cache.top_n(10).await.unwrap();
        let names: Vec<&str> = top.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["bob", "alice", "carol"]);
    }

    #[tokio::test]
    async fn equal_scores_rank_most_recent_first() {
        let cache = MemoryRankCache::new();
        cache.set_score("alice", 10).await.unwrap();
        cache.set_score("bob", 10).await.unwrap();

        let top = cache.top_n(2).await.unwrap();
        assert_eq!(top[0].username, "bob");

        // Touching alice (even with an unchanged score) makes her the most
        // recent entry again.
        cache.set_score("alice", 10).await.unwrap();
        let top = cache.top_n(2).await.unwrap();
        assert_eq!(top[0].username, "alice");
    }

    #[tokio::test]
    async fn increment_starts_from_zero_and_accumulates() {
        let cache = MemoryRankCache::new();
        assert_eq!(cache.increment_score("alice", 7).await.unwrap(), 7);
        assert_eq!(cache.increment_score("alice", -2).await.unwrap(), 5);
        assert_eq!(cache.get("alice").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn update_moves_entry_to_new_rank() {
        let cache = MemoryRankCache::new();
        cache.set_score("alice", 5).await.unwrap();
        cache.set_score("bob", 20).await.unwrap();
        cache.increment_score("alice", 30).await.unwrap();

        let top = cache.top_n(2).await.unwrap();
        assert_eq!(top[0].username, "alice");
        assert_eq!(top[0].score, 35);

        // No stale duplicate entry survives the move.
        assert_eq!(cache.top_n(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn top_n_truncates() {
        let cache = MemoryRankCache::new();
        for (i, name) in ["a", "b", "c", "d"].into_iter().enumerate() {
            cache.set_score(name, i as i64).await.unwrap();
        }
        assert_eq!(cache.top_n(2).await.unwrap().len(), 2);
        assert!(cache.top_n(0).await.unwrap().is_empty());
    }
}
