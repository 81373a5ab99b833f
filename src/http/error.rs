use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub code: String,
    pub message: String,
}

pub type FieldErrors = BTreeMap<String, Vec<FieldError>>;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

/// Every handler error, rendered as
/// `{"error":{"code":"SCREAMING_SNAKE","message":"...","errors":{...}}}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound { message: String },
    BadRequest { message: String },
    Validation { message: String, errors: FieldErrors },
    Conflict { message: String, errors: FieldErrors },
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, errors) = match self {
            Self::NotFound { message } => (StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
            Self::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", message, None)
            }
            Self::Validation { message, errors } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message,
                Some(errors),
            ),
            Self::Conflict { message, errors } => {
                (StatusCode::CONFLICT, "DUPLICATE_VALUE", message, Some(errors))
            }
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                message,
                None,
            ),
        };

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail {
                    code,
                    message,
                    errors,
                },
            }),
        )
            .into_response()
    }
}

/// `reported_at` -> `reportedAt`, keeping path separators intact.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' && !out.is_empty() && !out.ends_with('.') {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let field = field.to_string();
        let path = if field == "__all__" {
            prefix.trim_end_matches('.').to_string()
        } else {
            format!("{}{}", prefix, camel_case(&field))
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                let entry = out.entry(path.clone()).or_default();
                for error in list {
                    entry.push(FieldError {
                        code: error.code.to_string(),
                        message: error
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{} is invalid ({})", path, error.code)),
                    });
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                flatten(&format!("{}.", path), nested, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(&format!("{}.{}.", path, index), nested, out);
                }
            }
        }
    }
}

pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    flatten("", errors, &mut out);
    out
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound => Self::NotFound {
                message: err.to_string(),
            },
            ModelError::Validation(ref errors) => {
                let errors = field_errors(errors);
                let fields = errors.keys().cloned().collect::<Vec<String>>().join(", ");
                Self::Validation {
                    message: format!("Validation failed: {}", fields),
                    errors,
                }
            }
            ModelError::Malformed { field, message } => {
                let errors = match field {
                    Some(field) => {
                        let code = if message.starts_with("unknown variant") {
                            "enum"
                        } else {
                            "type"
                        };
                        FieldErrors::from([(
                            field,
                            vec![FieldError {
                                code: code.to_string(),
                                message: message.clone(),
                            }],
                        )])
                    }
                    None => FieldErrors::new(),
                };
                Self::Validation { message, errors }
            }
            ModelError::Conflict { ref field } => {
                let field = camel_case(field);
                let message = format!("{} already exists", field);
                let errors = FieldErrors::from([(
                    field,
                    vec![FieldError {
                        code: "unique".to_string(),
                        message: message.clone(),
                    }],
                )]);
                Self::Conflict { message, errors }
            }
            ModelError::BadRequest(message) => Self::BadRequest { message },
            ModelError::Store(_) | ModelError::Seed(_) => {
                tracing::error!("{}", err);
                Self::Internal {
                    message: "Internal Server Error".to_string(),
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            message: rejection.body_text(),
        }
    }
}
