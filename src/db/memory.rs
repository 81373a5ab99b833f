use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    timestamp_text, Collection, DocumentStore, ListQuery, ListResult, Record, SortKey, StoreError,
};
use crate::models::JsonObject;

/// Process-local store, used for tests and `STORE=memory`.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field_text(record: &Record, field: &str) -> Option<String> {
    match field {
        "_id" => Some(record.id.to_string()),
        "createdAt" => Some(timestamp_text(record.created_at)),
        "updatedAt" => Some(timestamp_text(record.updated_at)),
        "deletedAt" => record.deleted_at.map(timestamp_text),
        _ => record.doc.get(field).filter(|v| !v.is_null()).map(text),
    }
}

/// Recursive containment, matching JSONB `@>` for objects and scalars.
fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(k, v)| h.get(k).is_some_and(|hv| contains(hv, v))),
        (Value::Array(h), Value::Array(n)) => n.iter().all(|v| h.iter().any(|hv| contains(hv, v))),
        _ => haystack == needle,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            let y = y.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, _) => Ordering::Greater,
        (_, Some(Value::Null) | None) => Ordering::Less,
        (Some(x), Some(y)) => text(x).cmp(&text(y)),
    }
}

fn compare_records(a: &Record, b: &Record, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ordering = match key.field.as_str() {
            "_id" => a.id.cmp(&b.id),
            "createdAt" => a.created_at.cmp(&b.created_at),
            "updatedAt" => a.updated_at.cmp(&b.updated_at),
            "deletedAt" => a.deleted_at.cmp(&b.deleted_at),
            field => compare_values(a.doc.get(field), b.doc.get(field)),
        };
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

fn matches(collection: &Collection, record: &Record, query: &ListQuery) -> bool {
    if record.deleted_at.is_some() {
        return false;
    }

    let filtered = query
        .filter
        .iter()
        .all(|(field, expected)| field_text(record, field).as_deref() == Some(expected.as_str()));
    if !filtered {
        return false;
    }

    match query.q.as_deref().map(str::to_lowercase) {
        Some(q) if !q.is_empty() && !collection.searchable.is_empty() => collection
            .searchable
            .iter()
            .filter_map(|field| field_text(record, field))
            .any(|value| value.to_lowercase().contains(&q)),
        _ => true,
    }
}

fn check_unique(
    collection: &Collection,
    records: &[Record],
    candidate: &Record,
) -> Result<(), StoreError> {
    for field in collection.unique {
        let Some(value) = candidate.doc.get(*field).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken = records
            .iter()
            .filter(|r| r.id != candidate.id)
            .any(|r| r.doc.get(*field) == Some(value));
        if taken {
            return Err(StoreError::Duplicate {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection.name.clone())
            .or_default();
        Ok(())
    }

    async fn insert(&self, collection: &Collection, record: Record) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.name.clone()).or_default();

        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Duplicate {
                field: "_id".to_string(),
            });
        }
        check_unique(collection, records, &record)?;

        records.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection.name).and_then(|records| {
            records
                .iter()
                .find(|r| r.id == id && (include_deleted || r.deleted_at.is_none()))
                .cloned()
        }))
    }

    async fn find_one(
        &self,
        collection: &Collection,
        criteria: &JsonObject,
        include_deleted: bool,
    ) -> Result<Option<Record>, StoreError> {
        let needle = Value::Object(criteria.clone());
        let collections = self.collections.read().await;

        Ok(collections.get(&collection.name).and_then(|records| {
            records
                .iter()
                .filter(|r| include_deleted || r.deleted_at.is_none())
                .filter(|r| contains(&Value::Object(r.doc.clone()), &needle))
                .max_by_key(|r| r.updated_at)
                .cloned()
        }))
    }

    async fn replace(
        &self,
        collection: &Collection,
        record: Record,
    ) -> Result<Option<Record>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(&collection.name) else {
            return Ok(None);
        };

        check_unique(collection, records, &record)?;

        let Some(existing) = records.iter_mut().find(|r| r.id == record.id) else {
            return Ok(None);
        };
        existing.doc = record.doc;
        existing.updated_at = record.updated_at;
        existing.deleted_at = record.deleted_at;

        Ok(Some(existing.clone()))
    }

    async fn remove(
        &self,
        collection: &Collection,
        id: Uuid,
    ) -> Result<Option<Record>, StoreError> {
        let mut collections = self.collections.write().await;
        let removed = collections.get_mut(&collection.name).and_then(|records| {
            let position = records.iter().position(|r| r.id == id)?;
            Some(records.remove(position))
        });
        Ok(removed)
    }

    async fn list(
        &self,
        collection: &Collection,
        query: &ListQuery,
    ) -> Result<ListResult, StoreError> {
        let collections = self.collections.read().await;
        let mut found: Vec<&Record> = collections
            .get(&collection.name)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| matches(collection, r, query))
                    .collect()
            })
            .unwrap_or_default();

        found.sort_by(|a, b| compare_records(a, b, &query.sort));

        let total = found.len() as i64;
        let last_modified = found.iter().map(|r| r.updated_at).max();
        let records = found
            .into_iter()
            .skip(query.skip.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(ListResult {
            records,
            total,
            last_modified,
        })
    }
}
