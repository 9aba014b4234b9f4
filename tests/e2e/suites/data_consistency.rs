//! 数据一致性测试套件

use crate::data::*;
use crate::setup::TestEnvironment;
use order_service::OrderError;

#[tokio::test]
async fn test_total_is_exact_decimal_sum() {
    let env = TestEnvironment::setup().await.unwrap();

    let created = env
        .service
        .create_order(order_request("user-dc-1", vec![product("P1", 3, "9.99")]))
        .await
        .unwrap();
    assert_eq!(created.total_amount(), dec("29.97"));

    env.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_create_is_atomic() {
    let env = TestEnvironment::setup().await.unwrap();
    env.repo.fail_item_inserts_after(Some(1));

    let result = env
        .service
        .create_order(two_product_order("user-dc-2"))
        .await;

    assert!(matches!(result, Err(OrderError::Storage(_))));
    assert_eq!(env.repo.order_count(), 0);
    assert_eq!(env.repo.product_count(), 0);
    assert!(env.broker.published().is_empty());

    env.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_orders_by_user_are_isolated() {
    let env = TestEnvironment::setup().await.unwrap();

    for user in ["user-dc-a", "user-dc-a", "user-dc-b"] {
        env.service
            .create_order(two_product_order(user))
            .await
            .unwrap();
    }

    let a = env.service.list_orders_by_user("user-dc-a").await.unwrap();
    let b = env.service.list_orders_by_user("user-dc-b").await.unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 1);
    assert!(a.iter().all(|o| o.summary.user_id == "user-dc-a"));
    assert!(b.iter().all(|o| o.summary.user_id == "user-dc-b"));
    assert!(a.iter().all(|o| o.products.len() == 2));

    env.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let env = TestEnvironment::setup().await.unwrap();
    let created = env
        .service
        .create_order(two_product_order("user-dc-3"))
        .await
        .unwrap();

    let first = env.service.get_order_by_id(created.id()).await.unwrap();
    let second = env.service.get_order_by_id(created.id()).await.unwrap();
    assert_eq!(first, second);

    env.shutdown().await.unwrap();
}
