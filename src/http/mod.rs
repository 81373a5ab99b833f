use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::models::{Alert, AlertSource};
use crate::repo::Model;
use crate::Info;

pub mod actions;
pub mod alerts;
pub mod error;
pub mod sources;

pub use error::ApiError;

/// Mounts both resources under `prefix` (e.g. `/v1`) plus the unversioned
/// `/info`.
pub fn build_router(prefix: &str, alerts: Model<Alert>, sources: Model<AlertSource>) -> Router {
    let api = Router::new()
        .merge(alerts::routes(alerts))
        .merge(sources::routes(sources));

    Router::new()
        .nest(prefix, api)
        .route("/info", get(info))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
}

async fn info() -> Json<Info> {
    Json(crate::info())
}

async fn not_found() -> ApiError {
    ApiError::NotFound {
        message: "Not Found".to_string(),
    }
}
