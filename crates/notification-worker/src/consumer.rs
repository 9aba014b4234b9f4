//! 订单事件消费者
//!
//! 启动时声明订单交换机（幂等）、声明自有持久化队列并按绑定模式绑定，
//! 随后在后台任务中逐条执行 接收 -> 解码 -> 处理 -> 确认|拒绝。
//! 无法解码为通用信封的消息不会交给处理器，直接拒绝。

use std::sync::Arc;

use order_shared::broker::{
    ConsumeSummary, ConsumerMessage, ExchangeKind, MessageBroker, RejectPolicy, consume,
};
use order_shared::config::MessagingConfig;
use order_shared::events::{OrderEventEnvelope, OrderEventType};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::NotificationError;
use crate::handler::EventHandler;

/// 订单事件消费者
pub struct EventConsumer {
    broker: Arc<dyn MessageBroker>,
    exchange: String,
    queue: String,
    binding_patterns: Vec<String>,
    policy: RejectPolicy,
    handler: Arc<dyn EventHandler>,
}

impl EventConsumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        config: &MessagingConfig,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            broker,
            exchange: config.exchange.clone(),
            queue: config.consumer_queue.clone(),
            binding_patterns: config.binding_patterns.clone(),
            policy: RejectPolicy::from_requeue_flag(config.requeue_on_failure),
            handler,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// 声明交换机与队列并建立绑定
    pub async fn setup_topology(&self) -> Result<(), NotificationError> {
        self.broker
            .declare_exchange(&self.exchange, ExchangeKind::Topic)
            .await?;
        self.broker.declare_queue(&self.queue).await?;
        for pattern in &self.binding_patterns {
            self.broker
                .bind_queue(&self.queue, &self.exchange, pattern)
                .await?;
        }

        info!(
            exchange = %self.exchange,
            queue = %self.queue,
            patterns = ?self.binding_patterns,
            "消费拓扑已就绪"
        );
        Ok(())
    }

    /// 建立拓扑并启动后台消费循环
    ///
    /// 循环在代理连接关闭后结束，返回的 JoinHandle 产出消费统计。
    pub async fn start(&self) -> Result<JoinHandle<ConsumeSummary>, NotificationError> {
        self.setup_topology().await?;

        let handler = Arc::clone(&self.handler);
        let handle = consume(self.broker.as_ref(), &self.queue, self.policy, move |msg| {
            let handler = Arc::clone(&handler);
            async move { handle_message(handler.as_ref(), &msg).await }
        })
        .await?;

        info!(queue = %self.queue, policy = ?self.policy, "订单事件消费者已启动");
        Ok(handle)
    }
}

/// 处理单条消息
///
/// 拆分为独立函数，便于测试中直接调用而无需启动消费循环。
pub async fn handle_message(
    handler: &dyn EventHandler,
    msg: &ConsumerMessage,
) -> Result<(), NotificationError> {
    let envelope: OrderEventEnvelope = msg.deserialize_payload().map_err(|e| {
        error!(
            routing_key = %msg.routing_key,
            delivery_tag = msg.delivery_tag,
            payload = msg.payload_str().unwrap_or("<non-utf8>"),
            error = %e,
            "订单事件解码失败"
        );
        NotificationError::Deserialization {
            routing_key: msg.routing_key.clone(),
            reason: e.to_string(),
        }
    })?;

    let event_type = OrderEventType::from_routing_key(&msg.routing_key);
    handler.handle(event_type, &msg.routing_key, &envelope).await
}
