use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use beacon_core::BeaconError;
use tracing::error;

/// A [`BeaconError`] on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BeaconError);

/// Handler result type.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// The status code the error maps to.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BeaconError::InvalidAgentId(_) | BeaconError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BeaconError::NotRegistered(_) | BeaconError::EmptyQueue(_) => StatusCode::NOT_FOUND,
            BeaconError::DuplicateAgent(_) | BeaconError::UnknownAgent(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BeaconError::Store(_)
            | BeaconError::Config(_)
            | BeaconError::Json(_)
            | BeaconError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self.status() {
            StatusCode::BAD_REQUEST => format!("failed to parse request: {}", self.0),
            StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
            _ => self.0.to_string(),
        }
    }
}

impl From<BeaconError> for ApiError {
    fn from(e: BeaconError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(BeaconError::BadRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let body = serde_json::json!({ "error": self.message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::AgentId;

    #[test]
    fn test_status_mapping() {
        let id = AgentId::new();
        let cases = [
            (BeaconError::NotRegistered(id), StatusCode::NOT_FOUND),
            (BeaconError::EmptyQueue(id), StatusCode::NOT_FOUND),
            (BeaconError::InvalidAgentId("x".into()), StatusCode::BAD_REQUEST),
            (BeaconError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (BeaconError::DuplicateAgent(id), StatusCode::UNPROCESSABLE_ENTITY),
            (BeaconError::UnknownAgent(id), StatusCode::UNPROCESSABLE_ENTITY),
            (BeaconError::Store("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn test_messages() {
        let id = AgentId::new();
        assert_eq!(
            ApiError(BeaconError::BadRequest("missing field `command`".into())).message(),
            "failed to parse request: missing field `command`"
        );
        assert_eq!(
            ApiError(BeaconError::Store("database is locked".into())).message(),
            "internal server error"
        );
        assert_eq!(
            ApiError(BeaconError::EmptyQueue(id)).message(),
            format!("message queue empty for id: {id}")
        );
    }
}
