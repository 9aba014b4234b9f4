//! 订单事件领域处理器

use async_trait::async_trait;
use order_shared::events::{OrderEventEnvelope, OrderEventType};
use tracing::info;

use crate::error::NotificationError;

/// 订单事件处理器
///
/// 返回错误时该消息会被拒绝，是否重新入队由消费端的拒绝策略决定。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// `event_type` 由 routing key 推导，未知的 routing key 为 None
    async fn handle(
        &self,
        event_type: Option<OrderEventType>,
        routing_key: &str,
        event: &OrderEventEnvelope,
    ) -> Result<(), NotificationError>;
}

/// 默认处理器：记录事件后继续
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(
        &self,
        event_type: Option<OrderEventType>,
        routing_key: &str,
        event: &OrderEventEnvelope,
    ) -> Result<(), NotificationError> {
        let event_type = event_type.map_or_else(|| "Unknown".to_string(), |t| t.to_string());
        info!(
            event_type = %event_type,
            routing_key,
            event_id = %event.event_id,
            order_id = %event.order_id,
            user_id = %event.user_id,
            timestamp = %event.timestamp,
            fields = %serde_json::Value::Object(event.fields.clone()),
            "收到订单事件"
        );
        Ok(())
    }
}
