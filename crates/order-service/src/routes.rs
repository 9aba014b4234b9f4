//! 路由配置模块

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::{handlers, state::AppState};

/// 订单路由
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(handlers::order::create_order))
        .route("/orders", get(handlers::order::list_all_orders))
        .route(
            "/orders/summary",
            get(handlers::order::list_all_order_summaries),
        )
        .route(
            "/orders/user/{user_id}",
            get(handlers::order::list_orders_by_user),
        )
        .route(
            "/orders/user/{user_id}/summary",
            get(handlers::order::list_order_summaries_by_user),
        )
        .route("/orders/order/{order_id}", get(handlers::order::get_order))
        .route(
            "/orders/order/{order_id}/summary",
            get(handlers::order::get_order_summary),
        )
        .route(
            "/orders/order/{order_id}/products",
            get(handlers::order::get_order_products),
        )
        .route(
            "/orders/order/{order_id}/status",
            put(handlers::order::update_order_status),
        )
}

/// 探针路由
pub fn probe_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
}

/// 完整路由
pub fn app_routes() -> Router<AppState> {
    Router::new().merge(order_routes()).merge(probe_routes())
}
