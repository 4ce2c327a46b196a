use std::sync::Arc;

use tracing::info;

use crate::classify::Classifier;
use crate::config::{CacheBackend, Config};
use crate::database::init_redis;
use crate::events::{EventStore, MeiliEventStore};
use crate::leaderboard::{
    BroadcastHub, LeaderboardCoordinator, MeiliScoreStore, MemoryRankCache, RankCache,
    RedisRankCache,
};
use crate::notify::Notifier;
use crate::search::{init_meilisearch, seed_database};
use crate::trivia::TriviaGame;

pub type SharedState = Arc<State>;

pub struct State {
    pub config: Config,
    pub coordinator: LeaderboardCoordinator,
    pub hub: Arc<BroadcastHub>,
    pub events: Arc<dyn EventStore>,
    pub trivia: TriviaGame,
    pub classifier: Classifier,
    pub notifier: Notifier,
}

impl State {
    pub async fn new() -> SharedState {
        let config = Config::load();

        let meili_client = init_meilisearch(&config.meili_url, &config.meili_key).await;

        let cache: Option<Arc<dyn RankCache>> = match config.rank_cache {
            CacheBackend::Redis => init_redis(&config.redis_url)
                .await
                .map(|conn| Arc::new(RedisRankCache::new(conn)) as Arc<dyn RankCache>),
            CacheBackend::Memory => {
                info!("Using in-process rank cache");
                Some(Arc::new(MemoryRankCache::new()))
            }
            CacheBackend::None => None,
        };

        seed_database(&meili_client, cache.as_ref()).await;

        let store = Arc::new(MeiliScoreStore::new(meili_client.clone()));
        let hub = Arc::new(BroadcastHub::default());
        let coordinator = LeaderboardCoordinator::new(
            store,
            cache,
            hub.clone(),
            config.leaderboard_size,
            config.store_timeout,
        );

        let events: Arc<dyn EventStore> = Arc::new(MeiliEventStore::new(meili_client).await);
        let trivia = TriviaGame::with_builtin_questions();
        let classifier = Classifier::new(config.classifier_url.clone());
        let notifier = Notifier::new(config.push_webhook_url.clone());

        Arc::new(Self {
            config,
            coordinator,
            hub,
            events,
            trivia,
            classifier,
            notifier,
        })
    }
}
