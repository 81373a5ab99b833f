use axum::routing::get;
use axum::{Json, Router};
use schemars::{schema_for, Schema};

use super::actions;
use crate::models::AlertSource;
use crate::repo::Model;

pub const PATH: &str = "/alertsources";

pub fn routes(model: Model<AlertSource>) -> Router {
    actions::routes::<AlertSource>(PATH)
        .route(&format!("{}/schema", PATH), get(schema))
        .with_state(model)
}

async fn schema() -> Json<Schema> {
    Json(schema_for!(AlertSource))
}
