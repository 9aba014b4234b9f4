//! 订单 API 处理器

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

use crate::{
    dto::{
        ApiResponse, CreateOrderRequest, OrderResponse, OrderSummaryResponse,
        OrderedProductResponse, UpdateOrderStatusRequest,
    },
    error::OrderError,
    state::AppState,
};

/// 创建订单
///
/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), OrderError> {
    let order = state.order_service.create_order(req).await?;
    info!(order_id = %order.id(), "Order created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// 获取全部订单（含商品）
///
/// GET /orders
pub async fn list_all_orders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, OrderError> {
    let orders = state.order_service.list_all_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// 获取全部订单摘要
///
/// GET /orders/summary
pub async fn list_all_order_summaries(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<OrderSummaryResponse>>>, OrderError> {
    let orders = state.order_service.list_all_order_summaries().await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// 获取用户订单（含商品）
///
/// GET /orders/user/{user_id}
pub async fn list_orders_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, OrderError> {
    let orders = state.order_service.list_orders_by_user(&user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// GET /orders/user/{user_id}/summary
pub async fn list_order_summaries_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<OrderSummaryResponse>>>, OrderError> {
    let orders = state
        .order_service
        .list_order_summaries_by_user(&user_id)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// 获取订单详情
///
/// GET /orders/order/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, OrderError> {
    let order = state.order_service.get_order_by_id(&order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// GET /orders/order/{order_id}/summary
pub async fn get_order_summary(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<OrderSummaryResponse>>, OrderError> {
    let order = state.order_service.get_order_summary_by_id(&order_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// GET /orders/order/{order_id}/products
pub async fn get_order_products(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<OrderedProductResponse>>>, OrderError> {
    let products = state
        .order_service
        .get_products_by_order_id(&order_id)
        .await?;
    Ok(Json(ApiResponse::success(products)))
}

/// 更新订单状态，成功返回 204
///
/// PUT /orders/order/{order_id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<StatusCode, OrderError> {
    let status = req.status;
    state
        .order_service
        .update_order_status(&order_id, req)
        .await?;
    info!(order_id = %order_id, status = %status, "Order status updated");
    Ok(StatusCode::NO_CONTENT)
}
