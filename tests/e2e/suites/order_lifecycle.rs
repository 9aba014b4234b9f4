//! 订单生命周期测试套件
//!
//! 创建 -> 确认 -> 取消 全链路，验证状态与事件序列。

use crate::data::*;
use crate::setup::TestEnvironment;
use order_service::OrderStatus;
use order_service::dto::UpdateOrderStatusRequest;
use order_shared::events::{OrderEventType, routing_keys};

#[tokio::test]
async fn test_create_confirm_cancel_flow() {
    let env = TestEnvironment::setup().await.unwrap();

    let created = env
        .service
        .create_order(two_product_order("user-e2e-1"))
        .await
        .unwrap();
    assert_eq!(created.total_amount(), dec("47.48"));
    assert_eq!(created.status(), OrderStatus::Pending);

    env.service
        .update_order_status(created.id(), UpdateOrderStatusRequest::new(OrderStatus::Confirmed))
        .await
        .unwrap();
    assert_eq!(
        env.broker.published_routing_keys()[1..],
        [routing_keys::STATUS_UPDATED, routing_keys::CONFIRMED]
    );

    env.service
        .update_order_status(
            created.id(),
            UpdateOrderStatusRequest::new(OrderStatus::Cancelled).with_reason("customer request"),
        )
        .await
        .unwrap();
    assert_eq!(
        env.broker.published_routing_keys()[3..],
        [routing_keys::STATUS_UPDATED, routing_keys::CANCELLED]
    );

    let order = env.service.get_order_by_id(created.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(order.total_amount(), dec("47.48"));

    // 审计队列 5 条 + 通知队列 3 条
    assert!(env.wait_for_settlements(8).await);
    assert_eq!(
        env.audited_routing_keys(),
        vec![
            routing_keys::CREATED,
            routing_keys::STATUS_UPDATED,
            routing_keys::CONFIRMED,
            routing_keys::STATUS_UPDATED,
            routing_keys::CANCELLED,
        ]
    );
    assert_eq!(
        env.handler.event_types(),
        vec![
            Some(OrderEventType::Created),
            Some(OrderEventType::Confirmed),
            Some(OrderEventType::Cancelled),
        ]
    );

    let cancelled = env.handler.envelopes().pop().unwrap();
    assert_eq!(cancelled.order_id, created.id());
    assert_eq!(cancelled.user_id, "user-e2e-1");
    assert_eq!(cancelled.field_str("reason"), Some("customer request"));

    env.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_full_forward_path() {
    let env = TestEnvironment::setup().await.unwrap();
    let created = env
        .service
        .create_order(two_product_order("user-e2e-2"))
        .await
        .unwrap();

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let req = UpdateOrderStatusRequest::new(status).with_tracking_number("TRK-42");
        env.service
            .update_order_status(created.id(), req)
            .await
            .unwrap();
    }

    let summary = env
        .service
        .get_order_summary_by_id(created.id())
        .await
        .unwrap();
    assert_eq!(summary.status, OrderStatus::Delivered);

    // 1 + 4*2 条进审计，1 + 4 条进通知
    assert!(env.wait_for_settlements(14).await);
    let shipped = env
        .handler
        .envelopes()
        .into_iter()
        .find(|e| e.field_str("tracking_number").is_some())
        .unwrap();
    assert_eq!(shipped.field_str("tracking_number"), Some("TRK-42"));

    let summaries = env.shutdown().await.unwrap();
    assert_eq!(summaries[0].acked, 5);
    assert_eq!(summaries[1].acked, 9);
}
