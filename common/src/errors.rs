use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use mongodb::bson;
use mongodb::error::Error as MongoError;
use serde::Serialize;
use thiserror::Error;

/// HTTP 错误响应结构
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    msg: String,
}

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    // ==== 常规业务错误 ====
    #[error("Resource not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden access")]
    Forbidden,

    // ==== 系统错误 ====
    #[error("MongoDB error: {0}")]
    Mongo(#[from] MongoError),
    #[error("BSON encode error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON decode error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let msg = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // 原始错误只进日志，不透出给客户端
            error!("{:?}", self);
            "Service error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(ErrorResponse { code: status.as_u16(), msg })
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use actix_web::ResponseError;
    use actix_web::body::MessageBody;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound.status_code().as_u16(), 404);
        assert_eq!(AppError::Validation("x".into()).status_code().as_u16(), 400);
        assert_eq!(AppError::Forbidden.status_code().as_u16(), 403);
        assert_eq!(AppError::Unauthorized("x".into()).status_code().as_u16(), 401);
        assert_eq!(AppError::Internal("boom".into()).status_code().as_u16(), 500);
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let resp = AppError::Internal("connection refused to 10.0.0.3".into()).error_response();
        let body = resp.into_body().try_into_bytes().unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("Service error"));
        assert!(!text.contains("10.0.0.3"));
    }
}
