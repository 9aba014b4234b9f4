//! 逆向场景测试套件
//!
//! 已发货/已送达的订单不能取消，订单保持原状态且不产生任何事件。

use crate::data::*;
use crate::setup::TestEnvironment;
use order_service::dto::UpdateOrderStatusRequest;
use order_service::{OrderError, OrderStatus};
use order_shared::events::routing_keys;

#[tokio::test]
async fn test_cancel_after_shipping_is_rejected() {
    let env = TestEnvironment::setup().await.unwrap();
    let created = env
        .service
        .create_order(two_product_order("user-reverse-1"))
        .await
        .unwrap();

    env.service
        .update_order_status(created.id(), UpdateOrderStatusRequest::new(OrderStatus::Shipped))
        .await
        .unwrap();
    let published_before = env.broker.published().len();

    let err = env
        .service
        .update_order_status(created.id(), UpdateOrderStatusRequest::new(OrderStatus::Cancelled))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(err.status_code().as_u16(), 500);

    let order = env.service.get_order_by_id(created.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Shipped);
    assert_eq!(env.broker.published().len(), published_before);
    assert!(
        !env.broker
            .published_routing_keys()
            .contains(&routing_keys::CANCELLED.to_string())
    );

    env.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_after_delivery_is_rejected() {
    let env = TestEnvironment::setup().await.unwrap();
    let created = env
        .service
        .create_order(two_product_order("user-reverse-2"))
        .await
        .unwrap();

    env.service
        .update_order_status(created.id(), UpdateOrderStatusRequest::new(OrderStatus::Delivered))
        .await
        .unwrap();

    let result = env
        .service
        .update_order_status(created.id(), UpdateOrderStatusRequest::new(OrderStatus::Cancelled))
        .await;
    assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));

    let summary = env
        .service
        .get_order_summary_by_id(created.id())
        .await
        .unwrap();
    assert_eq!(summary.status, OrderStatus::Delivered);

    env.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_update_unknown_order_is_not_found() {
    let env = TestEnvironment::setup().await.unwrap();

    let result = env
        .service
        .update_order_status("no-such-order", UpdateOrderStatusRequest::new(OrderStatus::Confirmed))
        .await;

    assert!(matches!(result, Err(OrderError::OrderNotFound(_))));
    assert!(env.broker.published().is_empty());

    env.shutdown().await.unwrap();
}
