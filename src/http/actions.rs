//! Handlers shared by every resource: list, fetch, create, patch, put, delete.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::error::ApiError;
use crate::models::Document;
use crate::repo::{ListOptions, Model, Page};

/// CRUD routes for `path` and `path/{id}` over a model's state.
pub fn routes<D: Document>(path: &str) -> Router<Model<D>> {
    Router::new()
        .route(path, get(list::<D>).post(create::<D>))
        .route(
            &format!("{}/{{id}}", path),
            get(fetch::<D>)
                .patch(update::<D>)
                .put(replace::<D>)
                .delete(remove::<D>),
        )
}

pub fn id_from(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    let Path(id) = path?;
    Ok(id)
}

pub async fn list<D: Document>(
    State(model): State<Model<D>>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Page<D>>, ApiError> {
    let Query(params) = query?;
    let options = ListOptions::from_query(params)?;
    Ok(Json(model.get(options).await?))
}

pub async fn fetch<D: Document>(
    State(model): State<Model<D>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<D>, ApiError> {
    let id = id_from(path)?;
    Ok(Json(model.get_by_id(id).await?))
}

pub async fn create<D: Document>(
    State(model): State<Model<D>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<D>), ApiError> {
    let Json(body) = body?;
    let created = model.post(body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update<D: Document>(
    State(model): State<Model<D>>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<D>, ApiError> {
    let id = id_from(path)?;
    let Json(body) = body?;
    Ok(Json(model.patch(id, body).await?))
}

pub async fn replace<D: Document>(
    State(model): State<Model<D>>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<D>, ApiError> {
    let id = id_from(path)?;
    let Json(body) = body?;
    Ok(Json(model.put(id, body).await?))
}

pub async fn remove<D: Document>(
    State(model): State<Model<D>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<D>, ApiError> {
    let id = id_from(path)?;
    Ok(Json(model.del(id).await?))
}
