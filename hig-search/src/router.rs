use axum::{http::Method, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::{app_state::AppState, config::ApplicationSettings, routes};

pub fn create(app_state: AppState, settings: &ApplicationSettings) -> Router<()> {
    let app = Router::new()
        .route("/", get(|| async { "HIG search is up" }))
        .nest("/search", routes::search::router())
        .nest("/components", routes::components::router())
        .nest("/stats", routes::stats::router());

    let allow_origin = match &settings.cors_allowed_origin {
        Some(origin) => {
            let origin = origin.clone();
            AllowOrigin::predicate(move |value, _| value.as_bytes() == origin.as_bytes())
        }
        None => AllowOrigin::from(Any),
    };
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(allow_origin);

    app.with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}
