//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 消息代理错误
///
/// 覆盖连接、声明、发布、消费、确认各阶段。启动阶段出现的错误对进程是致命的，
/// 稳态发布阶段的错误由调用方记录后吞掉。
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("连接消息代理失败: {0}")]
    Connection(String),

    #[error("打开通道失败: {0}")]
    Channel(String),

    #[error("声明交换机失败: exchange={exchange}, 原因={reason}")]
    DeclareExchange { exchange: String, reason: String },

    #[error("声明队列失败: queue={queue}, 原因={reason}")]
    DeclareQueue { queue: String, reason: String },

    #[error("绑定队列失败: queue={queue}, exchange={exchange}, pattern={pattern}, 原因={reason}")]
    Bind {
        queue: String,
        exchange: String,
        pattern: String,
        reason: String,
    },

    #[error("发布消息失败: routing_key={routing_key}, 原因={reason}")]
    Publish { routing_key: String, reason: String },

    #[error("发布消息超时: routing_key={routing_key}, 超时={timeout_ms}ms")]
    PublishTimeout { routing_key: String, timeout_ms: u64 },

    #[error("注册消费者失败: queue={queue}, 原因={reason}")]
    Consume { queue: String, reason: String },

    #[error("消息确认失败: delivery_tag={delivery_tag}, 原因={reason}")]
    Acknowledge { delivery_tag: u64, reason: String },

    #[error("消息序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("消息代理连接已关闭")]
    Closed,
}

impl MessagingError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "BROKER_CONNECTION_ERROR",
            Self::Channel(_) => "BROKER_CHANNEL_ERROR",
            Self::DeclareExchange { .. } => "DECLARE_EXCHANGE_ERROR",
            Self::DeclareQueue { .. } => "DECLARE_QUEUE_ERROR",
            Self::Bind { .. } => "BIND_QUEUE_ERROR",
            Self::Publish { .. } => "PUBLISH_ERROR",
            Self::PublishTimeout { .. } => "PUBLISH_TIMEOUT",
            Self::Consume { .. } => "CONSUME_ERROR",
            Self::Acknowledge { .. } => "ACKNOWLEDGE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Closed => "BROKER_CLOSED",
        }
    }

    /// 是否为可重试错误
    ///
    /// 仅用于调用方判断；本系统的发布路径本身从不重试。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Channel(_) | Self::Publish { .. } | Self::PublishTimeout { .. }
        )
    }
}

/// 基础设施启动错误
///
/// 服务启动阶段（加载配置、连接数据库、声明拓扑）的错误汇总，
/// 由二进制入口转换为 anyhow 错误后退出进程。
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库迁移失败: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("订单表不存在: {0}")]
    SchemaMissing(String),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, InfraError>;

impl InfraError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::SchemaMissing(_) => "SCHEMA_MISSING",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Messaging(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messaging_error_code() {
        let err = MessagingError::PublishTimeout {
            routing_key: "order.created".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.code(), "PUBLISH_TIMEOUT");
        assert!(err.to_string().contains("order.created"));
        assert!(err.to_string().contains("5000"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(MessagingError::Connection("refused".to_string()).is_retryable());
        assert!(
            MessagingError::PublishTimeout {
                routing_key: "order.shipped".to_string(),
                timeout_ms: 5000,
            }
            .is_retryable()
        );
        assert!(
            !MessagingError::DeclareExchange {
                exchange: "orders".to_string(),
                reason: "PRECONDITION_FAILED".to_string(),
            }
            .is_retryable()
        );
        assert!(!MessagingError::Closed.is_retryable());
    }

    #[test]
    fn test_infra_error_wraps_messaging_code() {
        let err = InfraError::from(MessagingError::Closed);
        assert_eq!(err.code(), "BROKER_CLOSED");

        let db_err = InfraError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(db_err.code(), "DATABASE_ERROR");

        let schema_err = InfraError::SchemaMissing("orders.t_order".to_string());
        assert_eq!(schema_err.code(), "SCHEMA_MISSING");
        assert!(schema_err.to_string().contains("orders.t_order"));
    }
}
