//! # Meilisearch
//!
//! Durable document store for the platform.
//!
//! ## Schema
//!
//! - `users` index: one document per player (username as primary key, email,
//!   score, challenges completed). Sortable by `score` so the ranked fallback
//!   path is a single sorted query.
//! - `events` index: the community event catalogue, sortable by `date` and
//!   filterable by `category`.
//!
//! ## Role next to Redis
//!
//! Redis answers ranked reads in memory; Meilisearch holds the records that
//! must survive restarts. The leaderboard coordinator writes Meilisearch
//! first and treats it as authoritative, so losing Redis only costs recency
//! tie-breaks, never scores.
//!
//! ## Seeding
//!
//! On first boot both indexes are empty and receive the demo dataset: five
//! sample players (mirrored into the rank cache so both stores agree) and
//! seven sample community events.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use meilisearch_sdk::{client::Client, settings::Settings};
use serde::Serialize;
use tracing::{info, warn};

use crate::events::Event;
use crate::leaderboard::RankCache;
use crate::leaderboard::score_store::UserDoc;

pub const USER_INDEX: &str = "users";
pub const USER_ID: &str = "username";
pub const USER_SCORE: &str = "score";

pub const EVENT_INDEX: &str = "events";
pub const EVENT_ID: &str = "id";
pub const EVENT_DATE: &str = "date";
pub const EVENT_CATEGORY: &str = "category";

pub async fn init_meilisearch(meili_url: &str, meili_admin_key: &str) -> Client {
    let meili_client = Client::new(meili_url, Some(meili_admin_key)).unwrap();

    meili_client
        .index(USER_INDEX)
        .set_settings(&user_settings())
        .await
        .unwrap();
    meili_client
        .index(EVENT_INDEX)
        .set_settings(&event_settings())
        .await
        .unwrap();

    meili_client
}

fn user_settings() -> Settings {
    Settings::new()
        .with_searchable_attributes([USER_ID])
        .with_sortable_attributes([USER_SCORE])
}

fn event_settings() -> Settings {
    Settings::new()
        .with_searchable_attributes(["title", "description", "location"])
        .with_filterable_attributes([EVENT_CATEGORY])
        .with_sortable_attributes([EVENT_DATE])
}

pub async fn upsert_items<T>(meili_client: &Client, index_name: &str, items: &[T], id_name: &str)
where
    T: Serialize + Send + Sync,
{
    let _result = meili_client
        .index(index_name)
        .add_or_update(items, Some(id_name))
        .await
        .unwrap()
        .wait_for_completion(meili_client, None, None)
        .await
        .unwrap();
}

async fn is_empty(meili_client: &Client, index_name: &str) -> bool {
    match meili_client.index(index_name).get_stats().await {
        Ok(stats) => stats.number_of_documents == 0,
        Err(e) => {
            warn!("Could not read {index_name} index stats, skipping seed: {e}");
            false
        }
    }
}

/// Seeds the demo dataset on an empty first boot, mirroring the sample
/// players into the rank cache so both stores agree from the start.
pub async fn seed_database(meili_client: &Client, cache: Option<&Arc<dyn RankCache>>) {
    if is_empty(meili_client, USER_INDEX).await {
        let users = sample_users();
        upsert_items(meili_client, USER_INDEX, &users, USER_ID).await;

        if let Some(cache) = cache {
            for user in &users {
                if let Err(e) = cache.set_score(&user.username, user.score).await {
                    warn!("Could not mirror seed user {} into rank cache: {e}", user.username);
                }
            }
        }
        info!("Database seeded with sample users");
    }

    if is_empty(meili_client, EVENT_INDEX).await {
        upsert_items(meili_client, EVENT_INDEX, &sample_events(), EVENT_ID).await;
        info!("Database seeded with sample events");
    }
}

fn sample_users() -> Vec<UserDoc> {
    [
        ("eco_warrior", "warrior@eco.com", 1250, 15),
        ("green_thumb", "green@eco.com", 980, 12),
        ("climate_hero", "hero@eco.com", 875, 10),
        ("nature_lover", "nature@eco.com", 720, 8),
        ("sustainable_sam", "sam@eco.com", 650, 7),
    ]
    .into_iter()
    .map(|(username, email, score, challenges_completed)| UserDoc {
        username: username.to_owned(),
        email: email.to_owned(),
        score,
        challenges_completed,
    })
    .collect()
}

fn sample_events() -> Vec<Event> {
    let samples = [
        (
            1,
            "Community Tree Planting",
            (2025, 10, 5),
            "09:00 AM",
            "Central Park",
            "Join us for a community tree planting event to help green our neighborhood.",
            "Community Action",
            45,
        ),
        (
            2,
            "Solar Panel Workshop",
            (2025, 10, 12),
            "02:00 PM",
            "Community Center",
            "Learn about solar panel installation and renewable energy options for your home.",
            "Education",
            23,
        ),
        (
            3,
            "Beach Cleanup Drive",
            (2025, 10, 18),
            "07:00 AM",
            "Sunset Beach",
            "Help us clean up the beach and protect marine life from plastic pollution.",
            "Environmental",
            67,
        ),
        (
            4,
            "Sustainable Gardening Talk",
            (2025, 10, 25),
            "11:00 AM",
            "Botanical Garden",
            "Expert talk on sustainable gardening practices and organic farming techniques.",
            "Education",
            31,
        ),
        (
            5,
            "Climate Action March",
            (2025, 10, 28),
            "10:00 AM",
            "City Hall",
            "Join the peaceful march for climate action and environmental justice.",
            "Activism",
            120,
        ),
        (
            6,
            "Recycling Workshop",
            (2025, 10, 15),
            "03:00 PM",
            "Eco Center",
            "Learn creative ways to recycle and upcycle household items.",
            "Education",
            18,
        ),
        (
            7,
            "Wildlife Photography Walk",
            (2025, 10, 22),
            "06:00 AM",
            "Nature Reserve",
            "Guided wildlife photography walk to document local biodiversity.",
            "Recreation",
            12,
        ),
    ];

    let now = Utc::now();
    samples
        .into_iter()
        .map(
            |(id, title, (y, m, d), time, location, description, category, attendees)| Event {
                id,
                title: title.to_owned(),
                date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
                time: Some(time.to_owned()),
                location: Some(location.to_owned()),
                description: Some(description.to_owned()),
                category: Some(category.to_owned()),
                attendees,
                created_at: now,
                updated_at: now,
            },
        )
        .collect()
}
