//! Generic persistence model shared by every record type.
//!
//! A [`Model`] owns the save pipeline: strip metadata, populate references,
//! normalize, derive, validate, depopulate, store. HTTP handlers only ever
//! call the operations defined here.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{self, Collection, DocumentStore, ListQuery, Record, SortKey, StoreError};
use crate::error::ModelError;
use crate::models::{DeriveContext, Document, JsonObject, META_FIELDS};
use crate::notify::{Notifier, NoopNotifier};
use crate::seed::{self, SeedSource};

pub mod alerts;

pub use alerts::AgencyResolver;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 1000;
/// Query parameters that shape the response rather than select records.
/// Documents are always returned whole with references populated.
pub const PROJECTION_PARAMS: &[&str] = &["select", "fields", "populate"];

/// Resolves a document's references in place before save and on read.
#[async_trait]
pub trait Populate<D>: Send + Sync {
    async fn populate(&self, doc: &mut D) -> Result<(), ModelError>;
}

pub struct Model<D: Document> {
    name: String,
    store: Arc<dyn DocumentStore>,
    collection: Arc<Collection>,
    populator: Option<Arc<dyn Populate<D>>>,
    notifier: Arc<dyn Notifier>,
    seeds: SeedSource,
    _doc: PhantomData<fn() -> D>,
}

impl<D: Document> Clone for Model<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            store: self.store.clone(),
            collection: self.collection.clone(),
            populator: self.populator.clone(),
            notifier: self.notifier.clone(),
            seeds: self.seeds.clone(),
            _doc: PhantomData,
        }
    }
}

/// List request parsed from a query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub page: i64,
    pub limit: i64,
    pub skip: Option<i64>,
    pub sort: Vec<SortKey>,
    pub q: Option<String>,
    pub filter: Vec<(String, String)>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            skip: None,
            sort: vec![SortKey {
                field: "updatedAt".to_string(),
                descending: true,
            }],
            q: None,
            filter: Vec::new(),
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<i64, ModelError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
        .ok_or_else(|| ModelError::BadRequest(format!("'{}' must be a non-negative integer", key)))
}

impl ListOptions {
    pub fn from_query(params: HashMap<String, String>) -> Result<Self, ModelError> {
        let mut options = ListOptions::default();
        let mut filter = Vec::new();

        for (key, value) in params {
            match key.as_str() {
                "page" => options.page = parse_count(&key, &value)?.max(1),
                "limit" => options.limit = parse_count(&key, &value)?.clamp(1, MAX_LIMIT),
                "skip" => options.skip = Some(parse_count(&key, &value)?),
                "sort" => {
                    let sort = SortKey::parse_list(&value)?;
                    if !sort.is_empty() {
                        options.sort = sort;
                    }
                }
                "q" => options.q = Some(value.trim().to_string()).filter(|q| !q.is_empty()),
                key if PROJECTION_PARAMS.contains(&key) => {
                    debug!("Ignoring projection parameter '{}'", key);
                }
                key if db::TIMESTAMP_FIELDS.contains(&key) => {
                    let at = DateTime::parse_from_rfc3339(value.trim()).map_err(|_| {
                        ModelError::BadRequest(format!("'{}' must be an RFC 3339 timestamp", key))
                    })?;
                    filter.push((key.to_string(), db::timestamp_text(at.with_timezone(&Utc))));
                }
                _ => {
                    if !db::is_identifier(&key) {
                        return Err(StoreError::InvalidField(key).into());
                    }
                    filter.push((key, value));
                }
            }
        }

        filter.sort();
        options.filter = filter;
        Ok(options)
    }

    fn offset(&self) -> i64 {
        self.skip
            .unwrap_or_else(|| (self.page - 1).saturating_mul(self.limit))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<D> {
    pub data: Vec<D>,
    pub total: i64,
    pub size: usize,
    pub limit: i64,
    pub skip: i64,
    pub page: i64,
    pub pages: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Applies `patch` onto `target`: objects merge recursively, `null` removes
/// the key, anything else replaces.
pub fn merge(target: &mut JsonObject, patch: JsonObject) {
    for (key, value) in patch {
        match value {
            Value::Null => {
                target.remove(&key);
            }
            Value::Object(nested) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge(existing, nested),
                _ => {
                    target.insert(key, Value::Object(nested));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}

fn strip_meta(body: &mut JsonObject) -> Option<Value> {
    let id = body.remove("_id");
    for field in META_FIELDS {
        body.remove(*field);
    }
    id
}

fn into_object(body: Value) -> Result<JsonObject, ModelError> {
    match body {
        Value::Object(object) => Ok(object),
        other => Err(ModelError::Malformed {
            field: None,
            message: format!("expected a JSON object, found {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_id(value: Value) -> Result<Uuid, ModelError> {
    match value {
        Value::String(s) => Uuid::parse_str(s.trim())
            .map_err(|_| ModelError::BadRequest(format!("invalid _id '{}'", s))),
        other => Err(ModelError::BadRequest(format!(
            "invalid _id: expected a string, found {}",
            kind_of(&other)
        ))),
    }
}

/// `updatedAt` for the next save: now, but never at or before the previous one.
fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    now.max(floor)
}

/// Reads a request body as `D`, keeping the path of the field that failed.
fn from_body<D: Document>(body: JsonObject) -> Result<D, ModelError> {
    Ok(serde_path_to_error::deserialize(Value::Object(body))?)
}

pub fn decode<D: Document>(record: Record) -> Result<D, ModelError> {
    serde_json::from_value(Value::Object(record.into_document()))
        .map_err(|e| ModelError::Store(StoreError::Serde(e)))
}

impl<D: Document> Model<D> {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        collection: &str,
        seeds: SeedSource,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            name: name.into(),
            store,
            collection: Arc::new(Collection::of::<D>(collection)?),
            populator: None,
            notifier: Arc::new(NoopNotifier),
            seeds,
            _doc: PhantomData,
        })
    }

    pub fn with_populator(mut self, populator: Arc<dyn Populate<D>>) -> Self {
        self.populator = Some(populator);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn ensure_collection(&self) -> Result<(), ModelError> {
        self.store.ensure_collection(&self.collection).await?;
        Ok(())
    }

    async fn populate(&self, doc: &mut D) -> Result<(), ModelError> {
        if let Some(populator) = &self.populator {
            populator.populate(doc).await?;
        }
        Ok(())
    }

    /// Decodes a stored record and resolves its references for the caller.
    async fn present(&self, record: Record) -> Result<D, ModelError> {
        let mut doc: D = decode(record)?;
        self.populate(&mut doc).await?;
        Ok(doc)
    }

    /// Runs the save pipeline over a metadata-free body and returns what
    /// gets stored.
    async fn prepare(&self, body: JsonObject, now: DateTime<Utc>) -> Result<JsonObject, ModelError> {
        let mut doc: D = from_body(body)?;

        self.populate(&mut doc).await?;
        doc.normalize();
        doc.derive(&DeriveContext { now });
        doc.validate()?;
        doc.depopulate();

        let mut stored = into_object(serde_json::to_value(&doc)?)?;
        strip_meta(&mut stored);
        Ok(stored)
    }

    async fn find_live(&self, id: Uuid) -> Result<Record, ModelError> {
        self.store
            .find_by_id(&self.collection, id, false)
            .await?
            .ok_or(ModelError::NotFound)
    }

    async fn save(&self, existing: Record, body: JsonObject) -> Result<D, ModelError> {
        let now = db::now();
        let doc = self.prepare(body, now).await?;

        let record = Record {
            doc,
            updated_at: next_updated_at(existing.updated_at, now),
            deleted_at: None,
            ..existing
        };
        let saved = self
            .store
            .replace(&self.collection, record)
            .await?
            .ok_or(ModelError::NotFound)?;

        self.present(saved).await
    }

    async fn create(&self, body: Value, notify: bool) -> Result<D, ModelError> {
        let mut body = into_object(body)?;
        let id = match strip_meta(&mut body) {
            Some(Value::Null) | None => Uuid::new_v4(),
            Some(id) => parse_id(id)?,
        };

        let now = db::now();
        let doc = self.prepare(body, now).await?;
        let record = Record {
            id,
            doc,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let stored = self.store.insert(&self.collection, record).await?;
        let created = self.present(stored).await?;
        debug!("Created {} {}", self.name, id);

        if notify {
            if let Some(campaign) = created.campaign() {
                if let Err(e) = self.notifier.dispatch(campaign).await {
                    warn!("Failed to dispatch campaign for {} {}: {}", self.name, id, e);
                }
            }
        }

        Ok(created)
    }

    pub async fn get(&self, options: ListOptions) -> Result<Page<D>, ModelError> {
        let skip = options.offset();
        let query = ListQuery {
            limit: options.limit.clamp(1, MAX_LIMIT),
            filter: options.filter,
            q: options.q,
            sort: options.sort,
            skip,
        };
        let result = self.store.list(&self.collection, &query).await?;

        let mut data = Vec::with_capacity(result.records.len());
        for record in result.records {
            data.push(self.present(record).await?);
        }

        Ok(Page {
            size: data.len(),
            data,
            total: result.total,
            limit: query.limit,
            skip,
            page: skip / query.limit + 1,
            pages: (result.total + query.limit - 1) / query.limit,
            last_modified: result.last_modified,
        })
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<D, ModelError> {
        let record = self.find_live(id).await?;
        self.present(record).await
    }

    /// Creates a record and announces it.
    pub async fn post(&self, body: Value) -> Result<D, ModelError> {
        self.create(body, true).await
    }

    /// Deep-merges `partial` onto the stored record.
    pub async fn patch(&self, id: Uuid, partial: Value) -> Result<D, ModelError> {
        let mut partial = into_object(partial)?;
        strip_meta(&mut partial);

        let existing = self.find_live(id).await?;
        let mut body = existing.doc.clone();
        merge(&mut body, partial);

        self.save(existing, body).await
    }

    /// Replaces the stored content with `full`. Generated fields listed in
    /// [`Document::KEPT_ON_REPLACE`] survive when `full` leaves them out.
    pub async fn put(&self, id: Uuid, full: Value) -> Result<D, ModelError> {
        let mut body = into_object(full)?;
        strip_meta(&mut body);

        let existing = self.find_live(id).await?;
        for field in D::KEPT_ON_REPLACE {
            if body.get(*field).map_or(true, Value::is_null) {
                if let Some(kept) = existing.doc.get(*field) {
                    body.insert(field.to_string(), kept.clone());
                }
            }
        }
        self.save(existing, body).await
    }

    /// Removes a record, or marks it deleted for soft-delete models.
    pub async fn del(&self, id: Uuid) -> Result<D, ModelError> {
        let existing = self.find_live(id).await?;

        let removed = if D::SOFT_DELETE {
            let now = db::now();
            let record = Record {
                updated_at: next_updated_at(existing.updated_at, now),
                deleted_at: Some(now),
                ..existing
            };
            self.store.replace(&self.collection, record).await?
        } else {
            self.store.remove(&self.collection, id).await?
        };

        let removed = removed.ok_or(ModelError::NotFound)?;
        debug!("Deleted {} {}", self.name, id);
        self.present(removed).await
    }

    /// Natural-key criteria from the keys present in `body`, after
    /// normalization.
    fn criteria(&self, body: &JsonObject) -> Result<JsonObject, ModelError> {
        let present: Vec<&str> = D::NATURAL_KEY
            .iter()
            .copied()
            .filter(|key| body.get(*key).is_some_and(|v| !v.is_null()))
            .collect();
        if present.is_empty() {
            return Ok(JsonObject::new());
        }

        let mut doc: D = from_body(body.clone())?;
        doc.normalize();
        let normalized = into_object(serde_json::to_value(&doc)?)?;

        Ok(present
            .into_iter()
            .filter_map(|key| {
                normalized
                    .get(key)
                    .filter(|v| !v.is_null())
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect())
    }

    /// Updates the record matching `_id` or the natural key, or creates it.
    pub async fn upsert(&self, body: Value) -> Result<D, ModelError> {
        let mut payload = into_object(body)?;
        let id = match strip_meta(&mut payload) {
            Some(Value::Null) | None => None,
            Some(id) => Some(parse_id(id)?),
        };

        let existing = match id {
            Some(id) => self.store.find_by_id(&self.collection, id, true).await?,
            None => {
                let criteria = self.criteria(&payload)?;
                if criteria.is_empty() {
                    None
                } else {
                    self.store
                        .find_one(&self.collection, &criteria, true)
                        .await?
                }
            }
        };

        match existing {
            Some(existing) => {
                let mut body = existing.doc.clone();
                merge(&mut body, payload);
                self.save(existing, body).await
            }
            None => {
                if let Some(id) = id {
                    payload.insert("_id".into(), Value::String(id.to_string()));
                }
                self.create(Value::Object(payload), false).await
            }
        }
    }

    /// Upserts the given seeds, or the model's seed file when none are given.
    pub async fn seed(&self, seeds: Option<Vec<Value>>) -> Result<Vec<D>, ModelError> {
        let seeds = match seeds {
            Some(seeds) => seeds,
            None => self.seeds.load().await?,
        };
        let seeds = seed::compact(seeds);

        let seeded = try_join_all(seeds.into_iter().map(|s| self.upsert(s))).await?;
        info!("Seeded {} {} record(s)", seeded.len(), self.name);
        Ok(seeded)
    }
}
