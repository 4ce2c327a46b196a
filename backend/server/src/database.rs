//! # Redis
//!
//! RAM database backing the rank cache.
//!
//! Core purpose is a single sorted set holding `username -> score` so top-N
//! reads and atomic score increments never touch durable storage.
//!
//! ## Requirements
//!
//! - Sub-millisecond ranked reads
//! - Atomic relative updates (`ZINCRBY` queues operations server-side)
//! - Small dataset: one member per player who ever completed a challenge
//!
//! ## Availability
//!
//! Redis is deliberately optional. A failed connection at boot does not stop
//! the server; the coordinator falls back to durable-store rankings and the
//! health endpoint reports the cache as disconnected.

use std::time::Duration;

use redis::{
    Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::{info, warn};

pub async fn init_redis(redis_url: &str) -> Option<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(100));

    let client = match Client::open(redis_url) {
        Ok(client) => client,
        Err(e) => {
            warn!("Invalid Redis URL, rank cache disabled: {e}");
            return None;
        }
    };

    match client.get_connection_manager_with_config(config).await {
        Ok(connection_manager) => {
            info!("Redis connection established");
            Some(connection_manager)
        }
        Err(e) => {
            warn!("Redis connection failed, falling back to durable rankings: {e}");
            None
        }
    }
}
