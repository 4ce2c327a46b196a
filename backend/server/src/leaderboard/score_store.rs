//! Durable score records.
//!
//! [`MeiliScoreStore`] is the production backend: one document per user in the
//! `users` index, sortable by score. [`MemoryScoreStore`] backs tests and
//! cacheless development setups.

use std::collections::HashMap;

use async_trait::async_trait;
use meilisearch_sdk::client::Client;
use meilisearch_sdk::errors::{Error as MeiliError, ErrorCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{RankEntry, UserScore};
use crate::error::{AppError, AppResult};
use crate::search::USER_INDEX;

/// Outcome of a score write. `created` distinguishes the first-ever write for
/// a username, whose seed value may have been clamped to zero.
#[derive(Debug, Clone)]
pub struct ScoreWrite {
    pub user: UserScore,
    pub created: bool,
}

/// The authoritative per-user score record.
///
/// `upsert_delta` has create-on-first-write semantics: an unseen username gets
/// `score = max(delta, 0)` and a completed-challenge count of 1. An existing
/// record has the delta added as-is (totals are not floored) and its counter
/// incremented. `top_n` is the cold-start/fallback ranking path; its tie-break
/// among equal scores is implementation-defined.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn upsert_delta(&self, username: &str, delta: i64) -> AppResult<ScoreWrite>;

    async fn top_n(&self, n: usize) -> AppResult<Vec<RankEntry>>;

    async fn get(&self, username: &str) -> AppResult<Option<UserScore>>;
}

fn seed_score(delta: i64) -> i64 {
    delta.max(0)
}

// ---------------------------------------------------------------------------
// Meilisearch backend
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct UserDoc {
    pub username: String,
    pub email: String,
    pub score: i64,
    pub challenges_completed: u32,
}

impl From<UserDoc> for UserScore {
    fn from(doc: UserDoc) -> Self {
        Self {
            username: doc.username,
            score: doc.score,
            challenges_completed: doc.challenges_completed,
        }
    }
}

pub struct MeiliScoreStore {
    client: Client,
}

impl MeiliScoreStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, username: &str) -> AppResult<Option<UserDoc>> {
        match self.client.index(USER_INDEX).get_document::<UserDoc>(username).await {
            Ok(doc) => Ok(Some(doc)),
            Err(MeiliError::Meilisearch(ref e)) if e.error_code == ErrorCode::DocumentNotFound => {
                Ok(None)
            }
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }

    async fn write(&self, doc: &UserDoc) -> AppResult<()> {
        self.client
            .index(USER_INDEX)
            .add_or_update(std::slice::from_ref(doc), Some("username"))
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?
            .wait_for_completion(&self.client, None, None)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for MeiliScoreStore {
    async fn upsert_delta(&self, username: &str, delta: i64) -> AppResult<ScoreWrite> {
        // Read-modify-write is safe here: the coordinator serializes writes
        // per username before calling into the store.
        let (doc, created) = match self.fetch(username).await? {
            Some(mut doc) => {
                doc.score += delta;
                doc.challenges_completed += 1;
                (doc, false)
            }
            None => (
                UserDoc {
                    username: username.to_owned(),
                    email: format!("{username}@eco.com"),
                    score: seed_score(delta),
                    challenges_completed: 1,
                },
                true,
            ),
        };

        self.write(&doc).await?;
        Ok(ScoreWrite {
            user: doc.into(),
            created,
        })
    }

    async fn top_n(&self, n: usize) -> AppResult<Vec<RankEntry>> {
        let results = self
            .client
            .index(USER_INDEX)
            .search()
            .with_limit(n)
            .with_sort(&["score:desc"])
            .execute::<UserDoc>()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(results
            .hits
            .into_iter()
            .map(|hit| RankEntry {
                username: hit.result.username,
                score: hit.result.score,
            })
            .collect())
    }

    async fn get(&self, username: &str) -> AppResult<Option<UserScore>> {
        Ok(self.fetch(username).await?.map(UserScore::from))
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryScoreStore {
    records: RwLock<HashMap<String, UserScore>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn upsert_delta(&self, username: &str, delta: i64) -> AppResult<ScoreWrite> {
        let mut records = self.records.write().await;
        match records.get_mut(username) {
            Some(user) => {
                user.score += delta;
                user.challenges_completed += 1;
                Ok(ScoreWrite {
                    user: user.clone(),
                    created: false,
                })
            }
            None => {
                let user = UserScore {
                    username: username.to_owned(),
                    score: seed_score(delta),
                    challenges_completed: 1,
                };
                records.insert(username.to_owned(), user.clone());
                Ok(ScoreWrite {
                    user,
                    created: true,
                })
            }
        }
    }

    async fn top_n(&self, n: usize) -> AppResult<Vec<RankEntry>> {
        let records = self.records.read().await;
        let mut ranked: Vec<&UserScore> = records.values().collect();
        // No recency signal here; username breaks ties so reads stay stable.
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.username.cmp(&b.username)));
        Ok(ranked
            .into_iter()
            .take(n)
            .map(|user| RankEntry {
                username: user.username.clone(),
                score: user.score,
            })
            .collect())
    }

    async fn get(&self, username: &str) -> AppResult<Option<UserScore>> {
        Ok(self.records.read().await.get(username).cloned())
    }
}
