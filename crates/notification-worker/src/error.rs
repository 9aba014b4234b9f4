//! 通知工作者错误类型
//!
//! 区分反序列化失败、领域处理失败与消息代理错误，
//! 前两者只影响单条消息，后者在启动阶段对进程是致命的。

use order_shared::error::MessagingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("事件反序列化失败: routing_key={routing_key}, 原因={reason}")]
    Deserialization { routing_key: String, reason: String },

    #[error("事件处理失败: {0}")]
    Handler(String),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}
