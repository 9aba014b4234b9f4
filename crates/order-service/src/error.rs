//! 订单服务错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use order_shared::error::MessagingError;
use serde_json::json;

use crate::models::OrderStatus;

/// 订单服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("订单不存在: {0}")]
    OrderNotFound(String),

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("订单状态不允许变更: order_id={order_id}, {from} -> {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("存储错误: {0}")]
    Storage(String),
    #[error("消息发布错误: {0}")]
    Messaging(#[from] MessagingError),
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrderError {
    /// 返回对应的 HTTP 状态码
    ///
    /// 非法取消沿用线上既有行为返回 500。
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::OrderNotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. }
            | Self::Database(_)
            | Self::Storage(_)
            | Self::Messaging(_)
            | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Messaging(_) => "MESSAGING_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// 是否为存储层错误
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Storage(_))
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            e if e.is_storage() => {
                tracing::error!(error = %e, "存储操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Messaging(e) => {
                tracing::error!(error = %e, "消息发布失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Serialization(e) => {
                tracing::error!(error = %e, "序列化失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for OrderError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, OrderError>;
