//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the browser client. Supports comma-separated origins; any origin
/// when none is configured.
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    players: usize,
    server_tick: u64,
    snapshots_sent: u64,
    avg_players_per_snapshot: f32,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.arena.stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        players: stats.players,
        server_tick: stats.server_tick,
        snapshots_sent: stats.snapshots_sent,
        avg_players_per_snapshot: stats.avg_players_per_snapshot,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn health_reports_arena_stats() {
        let (state, mut arena) = AppState::new(Config::default());
        arena.run_tick();
        arena.run_tick();

        let Json(health) = tokio_test::block_on(health_handler(State(state)));
        assert_eq!(health.status, "ok");
        assert_eq!(health.players, 0);
        assert_eq!(health.server_tick, 2);

        let value = serde_json::to_value(&health).unwrap();
        assert!(value.get("uptimeSecs").is_some());
        assert!(value.get("avgPlayersPerSnapshot").is_some());
    }

    #[test]
    fn router_builds_with_and_without_origin() {
        let (state, _arena) = AppState::new(Config::default());
        let _ = build_router(state);

        let config = Config {
            client_origin: Some("http://localhost:3000, https://arena.example".to_string()),
            ..Config::default()
        };
        let (state, _arena) = AppState::new(config);
        let _ = build_router(state);
    }
}
