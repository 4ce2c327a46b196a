//! Community event catalogue.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use meilisearch_sdk::client::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::search::{EVENT_DATE, EVENT_ID, EVENT_INDEX};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u32,
    pub title: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub attendees: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inbound creation payload. Fields stay optional so missing required ones
/// surface as a 400 with a named field instead of a deserialization reject.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEvent {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub attendees: Option<u32>,
}

fn build_event(new: NewEvent, id: u32) -> AppResult<Event> {
    let title = new
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Missing required field: title".to_owned()))?;
    let raw_date = new
        .date
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Missing required field: date".to_owned()))?;
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Invalid date format, expected YYYY-MM-DD".to_owned()))?;

    let now = Utc::now();
    Ok(Event {
        id,
        title,
        date,
        time: new.time,
        location: new.location,
        description: new.description,
        category: new.category,
        attendees: new.attendees.unwrap_or(0),
        created_at: now,
        updated_at: now,
    })
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events, ordered by date ascending.
    async fn list(&self) -> AppResult<Vec<Event>>;

    async fn create(&self, new: NewEvent) -> AppResult<Event>;
}

// ---------------------------------------------------------------------------
// Meilisearch backend
// ---------------------------------------------------------------------------

pub struct MeiliEventStore {
    client: Client,
    next_id: AtomicU32,
}

impl MeiliEventStore {
    /// Continues the id sequence from whatever the index already holds.
    pub async fn new(client: Client) -> Self {
        let store = Self {
            client,
            next_id: AtomicU32::new(1),
        };
        if let Ok(events) = store.list().await {
            let max_id = events.iter().map(|e| e.id).max().unwrap_or(0);
            store.next_id.store(max_id + 1, Ordering::Relaxed);
        }
        store
    }
}

#[async_trait]
impl EventStore for MeiliEventStore {
    async fn list(&self) -> AppResult<Vec<Event>> {
        let sort = format!("{EVENT_DATE}:asc");
        let results = self
            .client
            .index(EVENT_INDEX)
            .search()
            .with_limit(200)
            .with_sort(&[sort.as_str()])
            .execute::<Event>()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(results.hits.into_iter().map(|hit| hit.result).collect())
    }

    async fn create(&self, new: NewEvent) -> AppResult<Event> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event = build_event(new, id)?;

        self.client
            .index(EVENT_INDEX)
            .add_or_update(std::slice::from_ref(&event), Some(EVENT_ID))
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?
            .wait_for_completion(&self.client, None, None)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        Ok(event)
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
    next_id: AtomicU32,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list(&self) -> AppResult<Vec<Event>> {
        let mut events = self.events.read().await.clone();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn create(&self, new: NewEvent) -> AppResult<Event> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event = build_event(new, id)?;
        self.events.write().await.push(event.clone());
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_event(title: &str, date: &str) -> NewEvent {
        NewEvent {
            title: Some(title.to_owned()),
            date: Some(date.to_owned()),
            ..NewEvent::default()
        }
    }

    #[tokio::test]
    async fn create_requires_title_and_date() {
        let store = MemoryEventStore::new();

        let err = store
            .create(NewEvent {
                date: Some("2025-10-05".to_owned()),
                ..NewEvent::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("title")));

        let err = store
            .create(NewEvent {
                title: Some("Tree Planting".to_owned()),
                ..NewEvent::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("date")));
    }

    #[tokio::test]
    async fn create_rejects_malformed_date() {
        let store = MemoryEventStore::new();
        let err = store.create(new_event("Cleanup", "10/05/2025")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn list_orders_by_date_ascending() {
        let store = MemoryEventStore::new();
        store.create(new_event("Later", "2025-11-01")).await.unwrap();
        store.create(new_event("Sooner", "2025-10-01")).await.unwrap();
        store.create(new_event("Middle", "2025-10-15")).await.unwrap();

        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, ["Sooner", "Middle", "Later"]);
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let store = MemoryEventStore::new();
        let first = store.create(new_event("A", "2025-10-01")).await.unwrap();
        let second = store.create(new_event("B", "2025-10-02")).await.unwrap();
        assert_eq!(second.id, first.id + 1);
    }
}
