//! 订单事件发布器
//!
//! 为每次发布生成新的 event_id 与时间戳，按事件类型选择 routing key，
//! 将事件以持久化 JSON 消息发布到订单 topic 交换机。
//! 发布器只负责单次发送，不做重试；失败由调用方记录。

use std::sync::Arc;

use order_shared::broker::{ExchangeKind, MessageBroker};
use order_shared::error::MessagingError;
use order_shared::events::{
    EventHeader, EventProduct, OrderCancelled, OrderConfirmed, OrderCreated, OrderEvent,
    OrderShipped, OrderStatusUpdated,
};
use order_shared::observability::metrics;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::models::{Order, OrderStatus};

/// 订单事件发布器
pub struct EventPublisher {
    broker: Arc<dyn MessageBroker>,
    exchange: String,
}

impl EventPublisher {
    /// 创建发布器并声明 topic 交换机
    ///
    /// 声明失败直接返回错误，由启动流程决定是否终止进程。
    pub async fn new(
        broker: Arc<dyn MessageBroker>,
        exchange: impl Into<String>,
    ) -> Result<Self, MessagingError> {
        let exchange = exchange.into();
        broker.declare_exchange(&exchange, ExchangeKind::Topic).await?;
        Ok(Self { broker, exchange })
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// 发布单个事件，返回本次使用的信封头
    #[instrument(skip(self, event), fields(routing_key = event.routing_key()))]
    pub async fn publish(
        &self,
        order_id: &str,
        user_id: &str,
        event: &OrderEvent,
    ) -> Result<EventHeader, MessagingError> {
        let header = EventHeader::new(order_id, user_id);
        let routing_key = event.routing_key();
        let payload = event.encode(&header)?;

        let result = self
            .broker
            .publish(&self.exchange, routing_key, &payload)
            .await;
        metrics::record_event_published(routing_key, result.is_ok());
        result?;

        debug!(
            event_id = %header.event_id,
            order_id,
            event_type = %event.event_type(),
            "订单事件已发布"
        );
        Ok(header)
    }

    pub async fn publish_order_created(
        &self,
        order: &Order,
        products: Vec<EventProduct>,
    ) -> Result<EventHeader, MessagingError> {
        let event = OrderEvent::Created(OrderCreated {
            total_amount: order.total_amount,
            shipping_address: order.shipping_address.clone(),
            payment_method: order.payment_method.clone(),
            products,
        });
        self.publish(&order.id, &order.user_id, &event).await
    }

    pub async fn publish_order_status_updated(
        &self,
        order_id: &str,
        user_id: &str,
        old_status: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<EventHeader, MessagingError> {
        let event = OrderEvent::StatusUpdated(OrderStatusUpdated {
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
        });
        self.publish(order_id, user_id, &event).await
    }

    pub async fn publish_order_confirmed(
        &self,
        order_id: &str,
        user_id: &str,
        payment_method: &str,
        total_amount: Decimal,
    ) -> Result<EventHeader, MessagingError> {
        let event = OrderEvent::Confirmed(OrderConfirmed {
            payment_method: payment_method.to_string(),
            total_amount,
        });
        self.publish(order_id, user_id, &event).await
    }

    pub async fn publish_order_processing(
        &self,
        order_id: &str,
        user_id: &str,
    ) -> Result<EventHeader, MessagingError> {
        self.publish(order_id, user_id, &OrderEvent::Processing).await
    }

    pub async fn publish_order_shipped(
        &self,
        order_id: &str,
        user_id: &str,
        tracking_number: Option<String>,
    ) -> Result<EventHeader, MessagingError> {
        let event = OrderEvent::Shipped(OrderShipped { tracking_number });
        self.publish(order_id, user_id, &event).await
    }

    pub async fn publish_order_delivered(
        &self,
        order_id: &str,
        user_id: &str,
    ) -> Result<EventHeader, MessagingError> {
        self.publish(order_id, user_id, &OrderEvent::Delivered).await
    }

    pub async fn publish_order_cancelled(
        &self,
        order_id: &str,
        user_id: &str,
        reason: Option<String>,
    ) -> Result<EventHeader, MessagingError> {
        let event = OrderEvent::Cancelled(OrderCancelled { reason });
        self.publish(order_id, user_id, &event).await
    }
}
