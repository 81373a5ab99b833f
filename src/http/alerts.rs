use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use uuid::Uuid;

use super::actions::{self, id_from};
use super::error::ApiError;
use crate::models::cap::CapAlert;
use crate::models::Alert;
use crate::repo::Model;

pub const PATH: &str = "/alerts";

pub fn routes(model: Model<Alert>) -> Router {
    actions::routes::<Alert>(PATH)
        .route(&format!("{}/{{id}}/cap", PATH), get(cap))
        .with_state(model)
}

/// The alert laid out as a CAP message.
async fn cap(
    State(model): State<Model<Alert>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CapAlert>, ApiError> {
    let id = id_from(path)?;
    let alert = model.get_by_id(id).await?;
    Ok(Json(alert.to_cap()))
}
