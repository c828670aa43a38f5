use crate::api::types::ErrorBody;
use crate::domain::features::FeatureError;
use crate::utils::error::RiskError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::BTreeMap;

/// HTTP 層的錯誤，回傳 `{"error": ..., "details": ...}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest {
        message: String,
        details: Option<BTreeMap<String, String>>,
    },
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FeatureError> for ApiError {
    fn from(err: FeatureError) -> Self {
        let details = match &err {
            FeatureError::NotAnObject => None,
            FeatureError::Missing(names) => Some(
                names
                    .iter()
                    .map(|name| (name.to_string(), "is required".to_string()))
                    .collect(),
            ),
            FeatureError::Invalid(errors) => Some(
                errors
                    .iter()
                    .map(|e| (e.field.clone(), e.message.clone()))
                    .collect(),
            ),
        };

        ApiError::BadRequest {
            message: err.to_string(),
            details,
        }
    }
}

impl From<RiskError> for ApiError {
    fn from(err: RiskError) -> Self {
        ApiError::Internal(format!("prediction failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest { message, details } => ErrorBody {
                error: message,
                details,
            },
            ApiError::NotFound(message) | ApiError::Internal(message) => ErrorBody {
                error: message,
                details: None,
            },
        };

        if status.is_server_error() {
            tracing::error!("{}", body.error);
        } else {
            tracing::warn!("Rejected request: {}", body.error);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::FieldError;

    #[test]
    fn test_invalid_features_carry_details() {
        let err = ApiError::from(FeatureError::Invalid(vec![FieldError {
            field: "glucose".to_string(),
            message: "must be a number".to_string(),
        }]));

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        match err {
            ApiError::BadRequest { message, details } => {
                assert!(message.starts_with("Validation failed"));
                let details = details.unwrap();
                assert_eq!(details["glucose"], "must be a number");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_model_errors_are_internal() {
        let err = ApiError::from(RiskError::InferenceError {
            message: "NaN".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            ApiError::Internal(message) => assert!(message.starts_with("prediction failed:")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
