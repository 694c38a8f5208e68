use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::{parse_platform, ApiError};
use crate::{app_state::AppState, domain::search::ComponentSpec};

pub fn router() -> Router<AppState> {
    Router::new().route("/:name", get(get_component))
}

#[derive(Debug, Clone, Deserialize)]
struct ComponentQuery {
    platform: Option<String>,
}

/// An unknown component is not an error: the response has no best match and
/// lists whatever ranked alternatives exist.
#[instrument(name = "GET /components/:name", skip(app_state))]
async fn get_component(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ComponentQuery>,
) -> Result<Json<ComponentSpec>, ApiError> {
    let platform = parse_platform(query.platform.as_deref())?;
    Ok(Json(
        app_state
            .search_service()
            .get_component_spec(&name, platform),
    ))
}
