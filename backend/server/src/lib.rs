//! # EcoSage Backend
//!
//! Backend for a community environmental-engagement platform: community event
//! listings, a carbon-footprint calculator, a waste-image classification
//! proxy, an environmental trivia game, and a real-time challenge
//! leaderboard.
//!
//!
//!
//! # General Infrastructure
//!
//! - One axum server fronts everything; clients speak JSON over HTTP plus one
//!   WebSocket endpoint for live leaderboard traffic
//! - Meilisearch holds the durable documents (player records, event
//!   catalogue) and answers the sorted fallback queries
//! - Redis holds the leaderboard sorted set for sub-millisecond top-N reads
//! - The external classifier model server is proxied, never exposed
//!
//!
//!
//! # Leaderboard
//!
//! The one subsystem with real design weight lives in [`leaderboard`]: a
//! durable score store and a fast rank cache kept in agreement by a
//! coordinator that serializes writes per username, plus a broadcast hub
//! fanning snapshots out to every connected observer.
//!
//! ## Redis + Meilisearch
//!
//! In theory Meilisearch alone could serve ranked reads; every leaderboard
//! query would then hit the durable index. The sorted set gives atomic
//! increments and O(log n) ranked reads without touching durable storage, at
//! the cost of a sync discipline between the two stores. That discipline is
//! the coordinator's job, and losing Redis entirely only degrades tie-break
//! ordering, never correctness.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
//!
//! Run the server (Meilisearch required, Redis optional).
//! ```sh
//! cargo run -p ecosage-backend
//! ```

use std::time::Duration;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod carbon;
pub mod classify;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod notify;
pub mod routes;
pub mod search;
pub mod state;
pub mod trivia;

use routes::{
    calculate_carbon_handler, classify_handler, create_event_handler, get_events_handler,
    health_handler, leaderboard_handler, save_fcm_token_handler, trivia_leaderboard_handler,
    trivia_questions_handler, trivia_save_score_handler, trivia_stats_handler,
    trivia_submit_handler, ws_handler,
};
use state::State;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any)
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/events", get(get_events_handler).post(create_event_handler))
        .route("/api/calculate_carbon", post(calculate_carbon_handler))
        .route("/api/classify", post(classify_handler))
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/api/trivia/questions", get(trivia_questions_handler))
        .route("/api/trivia/submit-answer", post(trivia_submit_handler))
        .route("/api/trivia/save-score", post(trivia_save_score_handler))
        .route("/api/trivia/leaderboard", get(trivia_leaderboard_handler))
        .route("/api/trivia/stats", get(trivia_stats_handler))
        .route("/api/save-fcm-token", post(save_fcm_token_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
