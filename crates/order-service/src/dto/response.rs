//! 响应 DTO 定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Order, OrderStatus, OrderWithProducts, OrderedProduct};

/// API 统一响应
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }
}

/// 订单商品响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProductResponse {
    pub product_code: String,
    pub product_name: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

impl From<&OrderedProduct> for OrderedProductResponse {
    fn from(product: &OrderedProduct) -> Self {
        Self {
            product_code: product.product_code.clone(),
            product_name: product.product_name.clone(),
            quantity: product.quantity,
            price: product.price,
            subtotal: product.subtotal,
        }
    }
}

/// 订单摘要响应（不含商品）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderSummaryResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// 订单详情响应（含商品）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(flatten)]
    pub summary: OrderSummaryResponse,
    pub products: Vec<OrderedProductResponse>,
}

impl OrderResponse {
    pub fn new(order: Order, products: Vec<OrderedProductResponse>) -> Self {
        Self {
            summary: order.into(),
            products,
        }
    }

    pub fn id(&self) -> &str {
        &self.summary.id
    }

    pub fn status(&self) -> OrderStatus {
        self.summary.status
    }

    pub fn total_amount(&self) -> Decimal {
        self.summary.total_amount
    }
}

impl From<OrderWithProducts> for OrderResponse {
    fn from(value: OrderWithProducts) -> Self {
        let products = value.products.iter().map(Into::into).collect();
        Self::new(value.order, products)
    }
}
