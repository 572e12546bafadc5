use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use ssvpl_catalog::{PricingError, ProductError, StockError};
use ssvpl_core::{AuthError, RepositoryError};

#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Pricing(PricingError),
    InvalidProduct(String),
    Stock(StockError),
    MalformedRequest(String),
    NotFound(String),
    Conflict(String),
    UpstreamUnavailable(String),
    Internal(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(e) => e.code(),
            AppError::Pricing(e) => e.code(),
            AppError::InvalidProduct(_) => "InvalidProduct",
            AppError::Stock(StockError::InvalidQuantity(_)) => "InvalidQuantity",
            AppError::Stock(StockError::InsufficientStock { .. }) => "InsufficientStock",
            AppError::MalformedRequest(_) => "MalformedRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::UpstreamUnavailable(_) => "UpstreamUnavailable",
            AppError::Internal(_) | AppError::Anyhow(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(AuthError::Forbidden) => StatusCode::FORBIDDEN,
            AppError::Auth(AuthError::UpstreamUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Auth(AuthError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Pricing(_)
            | AppError::InvalidProduct(_)
            | AppError::Stock(_)
            | AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Auth(AuthError::Internal(msg)) | AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                "Internal Server Error".to_string()
            }
            AppError::Auth(AuthError::UpstreamUnavailable(msg)) | AppError::UpstreamUnavailable(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                "Service temporarily unavailable".to_string()
            }
            AppError::Auth(e) => e.to_string(),
            AppError::Pricing(e) => e.to_string(),
            AppError::Stock(e) => e.to_string(),
            AppError::InvalidProduct(msg)
            | AppError::MalformedRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "statusCode": status.as_u16(),
            "error": self.code(),
            "message": self.message(),
            "success": false,
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::Pricing(err)
    }
}

impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::Pricing(e) => AppError::Pricing(e),
            other => AppError::InvalidProduct(other.to_string()),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        AppError::Stock(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound("Record not found".to_string()),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Stock(e) => AppError::Stock(e),
            RepositoryError::Unavailable(msg) => AppError::UpstreamUnavailable(msg),
            RepositoryError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from(AuthError::TokenMissing).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(AuthError::Forbidden).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::from(AuthError::UpstreamUnavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(PricingError::InvalidMrp { price: 10, mrp: 5 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::from(RepositoryError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(RepositoryError::Conflict("dup".into())).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(RepositoryError::Unavailable("timeout".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_codes_follow_source_errors() {
        assert_eq!(AppError::from(PricingError::InvalidGstRate("101".into())).code(), "InvalidGSTRate");
        assert_eq!(
            AppError::from(RepositoryError::Stock(StockError::InsufficientStock { requested: 5, available: 1 })).code(),
            "InsufficientStock"
        );
        let field = ProductError::InvalidField { field: "hsnCode", reason: "must be 6 to 8 digits".into() };
        assert_eq!(AppError::from(field).code(), "InvalidProduct");
        assert_eq!(AppError::from(anyhow::anyhow!("boom")).code(), "Internal");
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = AppError::Internal("connection string leaked".into());
        assert_eq!(err.message(), "Internal Server Error");
    }
}
