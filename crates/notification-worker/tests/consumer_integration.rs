//! 消费者集成测试
//!
//! 在内存代理上验证拓扑声明、绑定过滤、确认/拒绝与循环存活。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notification_worker::{EventConsumer, EventHandler, NotificationError};
use order_shared::broker::MessageBroker;
use order_shared::config::MessagingConfig;
use order_shared::events::{
    EventHeader, ORDER_EXCHANGE, OrderCancelled, OrderEvent, OrderEventEnvelope, OrderEventType,
    OrderStatusUpdated,
};
use order_shared::memory_broker::{AckOutcome, InMemoryBroker};
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingHandler {
    seen: Mutex<Vec<(Option<OrderEventType>, String)>>,
    fail_on: Option<OrderEventType>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(
        &self,
        event_type: Option<OrderEventType>,
        _routing_key: &str,
        event: &OrderEventEnvelope,
    ) -> Result<(), NotificationError> {
        self.seen.lock().push((event_type, event.order_id.clone()));
        if event_type.is_some() && event_type == self.fail_on {
            return Err(NotificationError::Handler("拒绝处理".to_string()));
        }
        Ok(())
    }
}

async fn publish(broker: &InMemoryBroker, order_id: &str, event: OrderEvent) {
    let payload = event.encode(&EventHeader::new(order_id, "u-1")).unwrap();
    broker
        .publish(ORDER_EXCHANGE, event.routing_key(), &payload)
        .await
        .unwrap();
}

fn consumer(
    broker: &Arc<InMemoryBroker>,
    handler: Arc<RecordingHandler>,
    requeue_on_failure: bool,
) -> EventConsumer {
    let config = MessagingConfig {
        requeue_on_failure,
        ..Default::default()
    };
    EventConsumer::new(broker.clone(), &config, handler)
}

#[tokio::test]
async fn test_start_declares_topology() {
    let broker = Arc::new(InMemoryBroker::new());
    let consumer = consumer(&broker, Arc::new(RecordingHandler::default()), false);

    let handle = consumer.start().await.unwrap();

    assert!(broker.has_exchange(ORDER_EXCHANGE));
    assert!(broker.has_queue("notifications"));
    let bindings = broker.bindings();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].pattern, "order.*");

    broker.close().await.unwrap();
    let summary = handle.await.unwrap();
    assert_eq!(summary.received, 0);
}

#[tokio::test]
async fn test_single_segment_binding_skips_status_updated() {
    let broker = Arc::new(InMemoryBroker::new());
    let handler = Arc::new(RecordingHandler::default());
    let handle = consumer(&broker, handler.clone(), false)
        .start()
        .await
        .unwrap();

    publish(
        &broker,
        "o-1",
        OrderEvent::StatusUpdated(OrderStatusUpdated {
            old_status: "PENDING".to_string(),
            new_status: "CANCELLED".to_string(),
        }),
    )
    .await;
    publish(
        &broker,
        "o-1",
        OrderEvent::Cancelled(OrderCancelled { reason: None }),
    )
    .await;

    assert!(broker.wait_for_settlements(1, Duration::from_secs(2)).await);
    broker.close().await.unwrap();
    let summary = handle.await.unwrap();

    assert_eq!(summary.received, 1);
    assert_eq!(
        *handler.seen.lock(),
        vec![(Some(OrderEventType::Cancelled), "o-1".to_string())]
    );
}

#[tokio::test]
async fn test_malformed_message_rejected_and_loop_continues() {
    let broker = Arc::new(InMemoryBroker::new());
    let handler = Arc::new(RecordingHandler::default());
    let handle = consumer(&broker, handler.clone(), false)
        .start()
        .await
        .unwrap();

    broker
        .publish(ORDER_EXCHANGE, "order.created", b"not json at all")
        .await
        .unwrap();
    publish(&broker, "o-2", OrderEvent::Delivered).await;

    assert!(broker.wait_for_settlements(2, Duration::from_secs(2)).await);
    broker.close().await.unwrap();
    handle.await.unwrap();

    let settlements = broker.settlements();
    assert_eq!(
        settlements[0].outcome,
        AckOutcome::Rejected { requeued: false }
    );
    assert_eq!(settlements[1].outcome, AckOutcome::Acked);
    assert_eq!(
        *handler.seen.lock(),
        vec![(Some(OrderEventType::Delivered), "o-2".to_string())]
    );
}

#[tokio::test]
async fn test_handler_failure_rejected_without_requeue() {
    let broker = Arc::new(InMemoryBroker::new());
    let handler = Arc::new(RecordingHandler {
        fail_on: Some(OrderEventType::Processing),
        ..Default::default()
    });
    let handle = consumer(&broker, handler.clone(), false)
        .start()
        .await
        .unwrap();

    publish(&broker, "o-1", OrderEvent::Processing).await;
    publish(&broker, "o-1", OrderEvent::Delivered).await;

    assert!(broker.wait_for_settlements(2, Duration::from_secs(2)).await);
    broker.close().await.unwrap();
    let summary = handle.await.unwrap();

    assert_eq!(summary.acked, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(
        broker.settlements()[0].outcome,
        AckOutcome::Rejected { requeued: false }
    );
}

#[tokio::test]
async fn test_requeue_policy_is_configurable() {
    let broker = Arc::new(InMemoryBroker::new());
    let handler = Arc::new(RecordingHandler {
        fail_on: Some(OrderEventType::Processing),
        ..Default::default()
    });
    let handle = consumer(&broker, handler.clone(), true)
        .start()
        .await
        .unwrap();

    publish(&broker, "o-1", OrderEvent::Processing).await;

    // 首次拒绝后重新入队，再次投递仍失败
    assert!(broker.wait_for_settlements(2, Duration::from_secs(2)).await);
    broker.close().await.unwrap();
    handle.await.unwrap();

    assert_eq!(
        broker.settlements()[0].outcome,
        AckOutcome::Rejected { requeued: true }
    );
    assert!(handler.seen.lock().len() >= 2);
}
