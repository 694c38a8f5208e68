use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    app_state::AppState,
    domain::{cache::CacheStats, search::StoreStats},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    index: StoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache: Option<CacheStats>,
}

#[instrument(name = "GET /stats", skip(app_state))]
async fn get_stats(State(app_state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        index: app_state.search_service().stats(),
        cache: app_state.cache_stats(),
    })
}
