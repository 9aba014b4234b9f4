//! 通知消费测试套件
//!
//! 坏消息被拒绝且不重新入队，消费循环继续处理后续消息。

use crate::data::*;
use crate::setup::TestEnvironment;
use order_shared::broker::MessageBroker;
use order_shared::events::{ORDER_EXCHANGE, OrderEventType, routing_keys};
use order_shared::memory_broker::AckOutcome;

#[tokio::test]
async fn test_malformed_payload_rejected_and_loop_continues() {
    let env = TestEnvironment::setup().await.unwrap();

    env.broker
        .publish(ORDER_EXCHANGE, routing_keys::CREATED, b"{\"truncated\":")
        .await
        .unwrap();
    env.service
        .create_order(two_product_order("user-notify-1"))
        .await
        .unwrap();

    // 两条消息各自进入审计与通知队列
    assert!(env.wait_for_settlements(4).await);

    let notification_settlements: Vec<_> = env
        .broker
        .settlements()
        .into_iter()
        .filter(|s| s.queue == "notifications")
        .collect();
    assert_eq!(notification_settlements.len(), 2);
    assert_eq!(
        notification_settlements[0].outcome,
        AckOutcome::Rejected { requeued: false }
    );
    assert_eq!(notification_settlements[1].outcome, AckOutcome::Acked);

    // 处理器只看到合法的那条
    assert_eq!(
        env.handler.event_types(),
        vec![Some(OrderEventType::Created)]
    );

    let summaries = env.shutdown().await.unwrap();
    assert_eq!(summaries[0].received, 2);
    assert_eq!(summaries[0].rejected, 1);
    assert_eq!(summaries[0].acked, 1);
}

#[tokio::test]
async fn test_created_event_payload_reaches_consumer() {
    let env = TestEnvironment::setup().await.unwrap();
    let created = env
        .service
        .create_order(two_product_order("user-notify-2"))
        .await
        .unwrap();

    assert!(env.wait_for_settlements(2).await);
    let envelope = env.handler.envelopes().pop().unwrap();

    assert_eq!(envelope.order_id, created.id());
    assert_eq!(envelope.user_id, "user-notify-2");
    assert!(!envelope.event_id.is_empty());
    assert_eq!(envelope.fields["total_amount"], 47.48);
    assert_eq!(envelope.fields["products"].as_array().unwrap().len(), 2);
    assert_eq!(envelope.field_str("payment_method"), Some("CREDIT_CARD"));

    env.shutdown().await.unwrap();
}
