use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::{queries, Collection, DbPool, DocumentStore, ListQuery, ListResult, Record, StoreError};
use crate::models::JsonObject;

/// Documents kept as JSONB rows, one table per collection.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn sql(template: &str, collection: &Collection) -> String {
    template.replace("{collection}", &collection.name)
}

fn record_from_row(row: &PgRow) -> Result<Record, StoreError> {
    let Json(doc): Json<JsonObject> = row.try_get("doc")?;
    Ok(Record {
        id: row.try_get("id")?,
        doc,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

/// Turns a unique index violation into the offending field.
fn map_write_error(collection: &Collection, error: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_error) = &error {
        if db_error.is_unique_violation() {
            let prefix = format!("{}_", collection.name);
            let field = db_error
                .constraint()
                .and_then(|c| c.strip_prefix(&prefix))
                .and_then(|c| c.strip_suffix("_key"))
                .and_then(|c| collection.unique.iter().find(|f| f.eq_ignore_ascii_case(c)))
                .map(|f| f.to_string())
                .unwrap_or_else(|| "_id".to_string());
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Sqlx(error)
}

/// Column or JSONB expression for a field name already checked as an identifier.
fn field_expr(field: &str) -> String {
    match field {
        "_id" => "id".to_string(),
        "createdAt" => "created_at".to_string(),
        "updatedAt" => "updated_at".to_string(),
        "deletedAt" => "deleted_at".to_string(),
        _ => format!("doc->'{}'", field),
    }
}

fn text_expr(field: &str) -> String {
    match field {
        "_id" => "id::text".to_string(),
        "createdAt" | "updatedAt" | "deletedAt" => format!(
            r#"to_char({} AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.US"Z"')"#,
            field_expr(field)
        ),
        _ => format!("doc->>'{}'", field),
    }
}

/// Escapes LIKE wildcards so `q` is matched literally.
fn like_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// The `AND ...` filter clause and its text binds, numbered from `$1`.
fn filter_clause(collection: &Collection, query: &ListQuery) -> (String, Vec<String>) {
    let mut clause = String::new();
    let mut binds = Vec::new();

    for (field, value) in &query.filter {
        binds.push(value.clone());
        clause.push_str(&format!(" AND {} = ${}", text_expr(field), binds.len()));
    }

    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        if !collection.searchable.is_empty() {
            binds.push(like_pattern(q));
            let position = binds.len();
            let matches = collection
                .searchable
                .iter()
                .map(|f| format!("{} ILIKE ${}", text_expr(f), position))
                .collect::<Vec<String>>()
                .join(" OR ");
            clause.push_str(&format!(" AND ({})", matches));
        }
    }

    (clause, binds)
}

fn order_clause(query: &ListQuery) -> String {
    let mut keys: Vec<String> = query
        .sort
        .iter()
        .map(|key| {
            let direction = if key.descending { "DESC" } else { "ASC" };
            format!("{} {} NULLS LAST", field_expr(&key.field), direction)
        })
        .collect();
    keys.push("id ASC".to_string());
    keys.join(", ")
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn ensure_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        sqlx::query(&sql(queries::CREATE_COLLECTION, collection))
            .execute(&self.pool)
            .await?;
        sqlx::query(&sql(queries::CREATE_UPDATED_AT_INDEX, collection))
            .execute(&self.pool)
            .await?;

        for field in collection.unique {
            let statement = sql(queries::CREATE_UNIQUE_INDEX, collection).replace("{field}", field);
            sqlx::query(&statement).execute(&self.pool).await?;
        }

        info!("Collection '{}' ready", collection.name);
        Ok(())
    }

    async fn insert(&self, collection: &Collection, record: Record) -> Result<Record, StoreError> {
        let row = sqlx::query(&sql(queries::INSERT_RECORD, collection))
            .bind(record.id)
            .bind(Json(&record.doc))
            .bind(record.created_at)
            .bind(record.updated_at)
            .bind(record.deleted_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;

        record_from_row(&row)
    }

    async fn find_by_id(
        &self,
        collection: &Collection,
        id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query(&sql(queries::SELECT_BY_ID, collection))
            .bind(id)
            .bind(include_deleted)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_one(
        &self,
        collection: &Collection,
        criteria: &JsonObject,
        include_deleted: bool,
    ) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query(&sql(queries::SELECT_ONE_MATCHING, collection))
            .bind(Json(criteria))
            .bind(include_deleted)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn replace(
        &self,
        collection: &Collection,
        record: Record,
    ) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query(&sql(queries::UPDATE_RECORD, collection))
            .bind(record.id)
            .bind(Json(&record.doc))
            .bind(record.updated_at)
            .bind(record.deleted_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn remove(
        &self,
        collection: &Collection,
        id: Uuid,
    ) -> Result<Option<Record>, StoreError> {
        let row = sqlx::query(&sql(queries::DELETE_RECORD, collection))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(
        &self,
        collection: &Collection,
        query: &ListQuery,
    ) -> Result<ListResult, StoreError> {
        let (filter, binds) = filter_clause(collection, query);

        let count_sql = sql(queries::COUNT_PAGE, collection).replace("{filter}", &filter);
        let mut count = sqlx::query(&count_sql);
        for value in &binds {
            count = count.bind(value);
        }
        let summary = count.fetch_one(&self.pool).await?;
        let total: i64 = summary.try_get("total")?;
        let last_modified: Option<DateTime<Utc>> = summary.try_get("last_modified")?;

        let page_sql = sql(queries::SELECT_PAGE, collection)
            .replace("{filter}", &filter)
            .replace("{order}", &order_clause(query))
            .replace("{limit}", &(binds.len() + 1).to_string())
            .replace("{offset}", &(binds.len() + 2).to_string());
        debug!("{}", page_sql.trim());

        let mut page = sqlx::query(&page_sql);
        for value in &binds {
            page = page.bind(value);
        }
        let rows = page
            .bind(query.limit)
            .bind(query.skip)
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<Record>, StoreError>>()?;

        Ok(ListResult {
            records,
            total,
            last_modified,
        })
    }
}
