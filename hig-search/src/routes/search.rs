use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::{parse_category, parse_platform, ApiError};
use crate::{
    app_state::AppState,
    domain::search::{SearchRequest, SearchResponse},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(search))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    #[serde(default)]
    q: String,
    platform: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

#[instrument(name = "GET /search", skip(app_state))]
async fn search(
    State(app_state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let request = SearchRequest {
        query: query.q,
        platform: parse_platform(query.platform.as_deref())?,
        category: parse_category(query.category.as_deref())?,
        limit: query.limit,
    };

    Ok(Json(app_state.search_service().search(&request)))
}
