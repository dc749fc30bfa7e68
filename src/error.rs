use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;
use uuid::Uuid;

/// Failure reported by the image analyzer.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("analysis timed out")]
    Timeout,
    #[error("analysis failed: {0}")]
    Failed(String),
}

impl AnalysisError {
    /// Text safe to show to the person who took the photo.
    pub fn user_message(&self) -> &'static str {
        match self {
            AnalysisError::Timeout => {
                "Analysis is taking longer than expected. Please try again in a moment."
            }
            AnalysisError::Failed(_) => {
                "We couldn't analyze this photo. Try a clearer picture of the meal."
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NutritionError {
    #[error("{0}")]
    Validation(String),
    #[error("meal {meal_id} not found")]
    NotFound { meal_id: Uuid },
    #[error(transparent)]
    Upstream(#[from] AnalysisError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type NutritionResult<T> = Result<T, NutritionError>;

impl NutritionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        NutritionError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            NutritionError::Validation(_) => StatusCode::BAD_REQUEST,
            NutritionError::NotFound { .. } => StatusCode::NOT_FOUND,
            NutritionError::Upstream(AnalysisError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            NutritionError::Upstream(AnalysisError::Failed(_)) => StatusCode::BAD_GATEWAY,
            NutritionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NutritionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            NutritionError::Upstream(e) => {
                error!(error = %e, "analyzer failure");
                e.user_message().to_string()
            }
            NutritionError::Store(e) => {
                error!(error = ?e, "store failure");
                e.to_string()
            }
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            NutritionError::validation("bad image").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            NutritionError::NotFound { meal_id: Uuid::nil() }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            NutritionError::from(AnalysisError::Timeout).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            NutritionError::from(AnalysisError::Failed("500".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            NutritionError::from(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_keep_their_message() {
        let err = NutritionError::from(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn timeout_and_failure_read_differently() {
        assert_ne!(
            AnalysisError::Timeout.user_message(),
            AnalysisError::Failed("x".into()).user_message()
        );
    }
}
