use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

/// Which backend serves ranked top-N reads.
///
/// `Redis` is the production default and degrades to no cache at boot when the
/// server is unreachable. `Memory` keeps the ranking in-process, which also
/// gives the deterministic most-recent-wins tie-break for equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
    None,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "none" => Ok(Self::None),
            other => Err(format!("unknown rank cache backend '{other}'")),
        }
    }
}

pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub rank_cache: CacheBackend,
    pub meili_url: String,
    pub meili_key: String,
    pub classifier_url: String,
    pub leaderboard_size: usize,
    pub store_timeout: Duration,
    pub push_webhook_url: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("ECOSAGE_PORT", "5000"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            rank_cache: try_load("RANK_CACHE", "redis"),
            meili_url: try_load("MEILI_URL", "http://127.0.0.1:7700"),
            meili_key: try_load("MEILI_ADMIN_KEY", "ecosage-dev-key"),
            classifier_url: try_load(
                "CLASSIFIER_URL",
                "http://127.0.0.1:8080/predictions/waste_classifier",
            ),
            leaderboard_size: try_load("LEADERBOARD_SIZE", "10"),
            store_timeout: Duration::from_millis(try_load("STORE_TIMEOUT_MS", "2000")),
            push_webhook_url: env::var("PUSH_WEBHOOK_URL").ok(),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
