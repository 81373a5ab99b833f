use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Document, JsonObject};

pub mod memory;
pub mod postgres;
pub mod queries;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(50)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for {field}")]
    Duplicate { field: String },

    #[error("invalid collection name '{0}'")]
    InvalidCollection(String),

    #[error("invalid field name '{0}'")]
    InvalidField(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Current time at the precision every backend can store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Accepts identifiers safe to splice into SQL: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// A named set of documents plus the field rules the store enforces.
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub unique: &'static [&'static str],
    pub searchable: &'static [&'static str],
}

impl Collection {
    pub fn new(
        name: &str,
        unique: &'static [&'static str],
        searchable: &'static [&'static str],
    ) -> Result<Self, StoreError> {
        let name = name.trim().to_lowercase();
        if !is_identifier(&name) {
            return Err(StoreError::InvalidCollection(name));
        }
        if let Some(field) = unique.iter().chain(searchable).find(|f| !is_identifier(f)) {
            return Err(StoreError::InvalidField(field.to_string()));
        }
        Ok(Self {
            name,
            unique,
            searchable,
        })
    }

    pub fn of<D: Document>(name: &str) -> Result<Self, StoreError> {
        Self::new(name, D::UNIQUE, D::SEARCHABLE)
    }
}

/// A stored document: its body plus server managed metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub doc: JsonObject,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    /// The body with `_id` and timestamps folded back in.
    pub fn into_document(self) -> JsonObject {
        let mut doc = self.doc;
        doc.insert("_id".into(), Value::String(self.id.to_string()));
        doc.insert("createdAt".into(), timestamp(self.created_at));
        doc.insert("updatedAt".into(), timestamp(self.updated_at));
        if let Some(deleted_at) = self.deleted_at {
            doc.insert("deletedAt".into(), timestamp(deleted_at));
        }
        doc
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(timestamp_text(at))
}

/// Server managed timestamp fields, filtered on by their canonical text.
pub const TIMESTAMP_FIELDS: &[&str] = &["createdAt", "updatedAt", "deletedAt"];

/// Canonical text of a timestamp: RFC 3339 in UTC with microseconds,
/// e.g. `2024-03-01T08:15:00.120000Z`.
pub fn timestamp_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Parses `a,-b` into ascending `a` then descending `b`.
    pub fn parse_list(sort: &str) -> Result<Vec<SortKey>, StoreError> {
        sort.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                let (field, descending) = match s.strip_prefix('-') {
                    Some(field) => (field, true),
                    None => (s.strip_prefix('+').unwrap_or(s), false),
                };
                if !is_identifier(field) {
                    return Err(StoreError::InvalidField(field.to_string()));
                }
                Ok(SortKey {
                    field: field.to_string(),
                    descending,
                })
            })
            .collect()
    }
}

/// A page request over live (not soft-deleted) records.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Field to expected text value, matched exactly.
    pub filter: Vec<(String, String)>,
    /// Case-insensitive substring over the collection's searchable fields.
    pub q: Option<String>,
    pub sort: Vec<SortKey>,
    pub limit: i64,
    pub skip: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ListResult {
    pub records: Vec<Record>,
    pub total: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates the backing table and indexes if missing.
    async fn ensure_collection(&self, collection: &Collection) -> Result<(), StoreError>;

    async fn insert(&self, collection: &Collection, record: Record) -> Result<Record, StoreError>;

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Record>, StoreError>;

    /// Most recently updated record whose body contains `criteria`.
    async fn find_one(
        &self,
        collection: &Collection,
        criteria: &JsonObject,
        include_deleted: bool,
    ) -> Result<Option<Record>, StoreError>;

    /// Overwrites body, `updatedAt` and `deletedAt` of an existing record.
    async fn replace(
        &self,
        collection: &Collection,
        record: Record,
    ) -> Result<Option<Record>, StoreError>;

    async fn remove(&self, collection: &Collection, id: Uuid)
        -> Result<Option<Record>, StoreError>;

    async fn list(&self, collection: &Collection, query: &ListQuery)
        -> Result<ListResult, StoreError>;
}
