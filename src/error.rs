use thiserror::Error;
use validator::ValidationErrors;

use crate::db::StoreError;

/// Failures of a model operation, independent of the transport.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Not Found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Payload that does not have the shape of the record, e.g. a wrong type
    /// or an unknown enum value. `field` is the dotted path that failed.
    #[error("malformed document: {message}")]
    Malformed {
        field: Option<String>,
        message: String,
    },

    #[error("{field} already exists")]
    Conflict { field: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("failed to load seeds: {0}")]
    Seed(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ModelError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Duplicate { field } => ModelError::Conflict { field },
            StoreError::InvalidField(field) => {
                ModelError::BadRequest(format!("invalid field name '{}'", field))
            }
            other => ModelError::Store(other),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(error: serde_json::Error) -> Self {
        ModelError::Malformed {
            field: None,
            message: error.to_string(),
        }
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ModelError {
    fn from(error: serde_path_to_error::Error<serde_json::Error>) -> Self {
        // The root path renders as "."
        let field = Some(error.path().to_string()).filter(|path| path != ".");
        ModelError::Malformed {
            field,
            message: error.into_inner().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_become_conflicts() {
        let error: ModelError = StoreError::Duplicate {
            field: "email".into(),
        }
        .into();
        assert!(matches!(error, ModelError::Conflict { ref field } if field == "email"));
        assert_eq!(error.to_string(), "email already exists");
    }

    #[test]
    fn bad_sort_fields_are_client_errors() {
        let error: ModelError = StoreError::InvalidField("name'--".into()).into();
        assert!(matches!(error, ModelError::BadRequest(_)));
    }

    #[test]
    fn decode_errors_name_the_field() {
        let value = serde_json::json!({ "info": { "urgency": "Soon" } });
        let error: ModelError = serde_path_to_error::deserialize::<_, Wrapper>(value)
            .unwrap_err()
            .into();
        match error {
            ModelError::Malformed { field, message } => {
                assert_eq!(field.as_deref(), Some("info.urgency"));
                assert!(message.starts_with("unknown variant `Soon`"));
            }
            other => panic!("expected malformed document, got {other:?}"),
        }
    }

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Wrapper {
        info: Inner,
    }

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Inner {
        urgency: crate::models::constants::Urgency,
    }

    #[test]
    fn not_found_message() {
        assert_eq!(ModelError::NotFound.to_string(), "Not Found");
    }
}
