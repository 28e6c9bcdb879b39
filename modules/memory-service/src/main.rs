//! Memory Service — one shared JSON document for every connected AI system.
//!
//! Callers read it, merge partial updates into it, and log typed events
//! against it over the RPC API; WebSocket subscribers get every change.
//! Default: http://0.0.0.0:8765/

mod broadcaster;
mod config;
mod document;
mod error;
mod events;
mod ledger;
mod manager;
mod merge;
mod routes;
mod store;
mod ws;

use broadcaster::ChangeBroadcaster;
use config::Config;
use manager::MemoryManager;
use routes::AppState;
use std::sync::Arc;
use std::time::Instant;
use store::DocumentStore;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    log::info!("Using memory document at: {}", config.memory_file.display());
    if let Some(cap) = config.completed_actions_cap {
        log::info!("Keeping the newest {} completed actions", cap);
    }

    let store = DocumentStore::new(config.memory_file.clone(), config.default_goal.clone());
    let broadcaster = Arc::new(ChangeBroadcaster::new());
    let manager = Arc::new(MemoryManager::new(
        store,
        broadcaster,
        config.completed_actions_cap,
    ));

    let state = Arc::new(AppState {
        manager,
        start_time: Instant::now(),
    });

    let cors = tower_http::cors::CorsLayer::permissive();

    let app = axum::Router::new()
        .route("/", axum::routing::get(routes::health))
        .route(
            "/api/memory",
            axum::routing::get(routes::get_memory).post(routes::update_memory),
        )
        .route("/api/memory/events", axum::routing::post(routes::log_event))
        .route(
            "/api/memory/complete-action",
            axum::routing::put(routes::complete_action),
        )
        .route("/api/status", axum::routing::get(routes::status))
        .route("/ws/memory", axum::routing::get(ws::ws_handler))
        .with_state(state)
        .layer(cors);

    let addr = config.bind_addr();
    log::info!("Memory Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
