//! SQL text for the JSONB document tables.
//!
//! `{collection}` is replaced with a checked identifier (see
//! [`Collection::new`](super::Collection::new)); every value is bound.

pub const CREATE_COLLECTION: &str = r#"
CREATE TABLE IF NOT EXISTS {collection} (
    id UUID PRIMARY KEY,
    doc JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);
"#;

pub const CREATE_UPDATED_AT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS {collection}_updated_at_idx ON {collection} (updated_at DESC);
"#;

/// `{field}` is a checked identifier as well.
pub const CREATE_UNIQUE_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS {collection}_{field}_key ON {collection} ((doc->>'{field}'));
"#;

pub const INSERT_RECORD: &str = r#"
INSERT INTO {collection} (id, doc, created_at, updated_at, deleted_at)
VALUES ($1, $2, $3, $4, $5)
RETURNING id, doc, created_at, updated_at, deleted_at;
"#;

pub const SELECT_BY_ID: &str = r#"
SELECT id, doc, created_at, updated_at, deleted_at
FROM {collection}
WHERE id = $1 AND ($2 OR deleted_at IS NULL);
"#;

pub const SELECT_ONE_MATCHING: &str = r#"
SELECT id, doc, created_at, updated_at, deleted_at
FROM {collection}
WHERE doc @> $1 AND ($2 OR deleted_at IS NULL)
ORDER BY updated_at DESC
LIMIT 1;
"#;

pub const UPDATE_RECORD: &str = r#"
UPDATE {collection}
SET doc = $2,
    updated_at = $3,
    deleted_at = $4
WHERE id = $1
RETURNING id, doc, created_at, updated_at, deleted_at;
"#;

pub const DELETE_RECORD: &str = r#"
DELETE FROM {collection} WHERE id = $1
RETURNING id, doc, created_at, updated_at, deleted_at;
"#;

/// `{filter}` and `{order}` are built from checked field names; `{limit}` and
/// `{offset}` are the positions of the paging binds.
pub const SELECT_PAGE: &str = r#"
SELECT id, doc, created_at, updated_at, deleted_at
FROM {collection}
WHERE deleted_at IS NULL {filter}
ORDER BY {order}
LIMIT ${limit} OFFSET ${offset};
"#;

pub const COUNT_PAGE: &str = r#"
SELECT COUNT(*) AS total, MAX(updated_at) AS last_modified
FROM {collection}
WHERE deleted_at IS NULL {filter};
"#;
