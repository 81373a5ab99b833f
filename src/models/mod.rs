use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::notify::Campaign;

pub mod alert;
pub mod alert_source;
pub mod cap;
pub mod constants;
pub mod geo;

pub use alert::Alert;
pub use alert_source::AlertSource;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Server-managed fields that never live inside a stored document body.
pub const META_FIELDS: &[&str] = &["_id", "createdAt", "updatedAt", "deletedAt"];

/// Values shared by every derivation step of a single save.
#[derive(Debug, Clone, Copy)]
pub struct DeriveContext {
    pub now: DateTime<Utc>,
}

/// A persisted record type: its schema, validation and pre-save behaviour.
pub trait Document:
    Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static
{
    /// Fields used to find an existing record on upsert when no `_id` is given.
    const NATURAL_KEY: &'static [&'static str];
    /// Fields that must be unique across the collection.
    const UNIQUE: &'static [&'static str] = &[];
    /// Fields matched by the free-text `q` search.
    const SEARCHABLE: &'static [&'static str] = &[];
    /// Whether delete marks `deletedAt` instead of removing the record.
    const SOFT_DELETE: bool = false;
    /// Generated fields a full replace carries over when the body omits them.
    const KEPT_ON_REPLACE: &'static [&'static str] = &[];

    fn id(&self) -> Option<Uuid>;

    /// Ids of other records this document links to and wants resolved.
    fn references(&self) -> Vec<Uuid> {
        Vec::new()
    }

    /// Trims, re-cases and otherwise canonicalizes user input.
    fn normalize(&mut self) {}

    /// Computes derived fields ahead of validation.
    fn derive(&mut self, _ctx: &DeriveContext) {}

    /// Reduces populated references to bare ids before storage.
    fn depopulate(&mut self) {}

    /// Notification to dispatch once the document has been created.
    fn campaign(&self) -> Option<Campaign> {
        None
    }
}

/// Implemented by anything that can be the target of a [`Linked`] reference.
pub trait Identified {
    fn id(&self) -> Uuid;
}

/// A weak reference to another record: a bare id as stored, or the
/// referenced record itself once populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linked<T> {
    Id(Uuid),
    Populated(T),
}

impl<T: Identified> Linked<T> {
    pub fn id(&self) -> Uuid {
        match self {
            Linked::Id(id) => *id,
            Linked::Populated(value) => value.id(),
        }
    }

    pub fn populated(&self) -> Option<&T> {
        match self {
            Linked::Id(_) => None,
            Linked::Populated(value) => Some(value),
        }
    }

    pub fn depopulate(&mut self) {
        *self = Linked::Id(self.id());
    }
}

/// Title-cases each whitespace separated word, collapsing runs of spaces.
pub fn start_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Trims an optional string, treating blank values as absent.
pub fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
