//! 请求 DTO 定义

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{AMOUNT_SCALE, MAX_AMOUNT, OrderStatus};

/// 创建订单请求
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 64, message = "用户ID长度必须在1-64个字符之间"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "订单至少包含一个商品"), nested)]
    pub products: Vec<OrderedProductDto>,
    #[validate(length(min = 1, message = "收货地址不能为空"))]
    pub shipping_address: String,
    #[validate(length(min = 1, max = 64, message = "支付方式长度必须在1-64个字符之间"))]
    pub payment_method: String,
}

/// 订单商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProductDto {
    #[serde(alias = "code")]
    #[validate(length(min = 1, max = 64, message = "商品编码长度必须在1-64个字符之间"))]
    pub product_code: String,
    #[validate(length(min = 1, max = 255, message = "商品名称长度必须在1-255个字符之间"))]
    pub product_name: String,
    #[validate(range(min = 1, message = "商品数量必须大于0"))]
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
}

/// 单价需非负、不超过金额列上限，且最多两位小数
fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    let (code, message) = if *price < Decimal::ZERO {
        ("negative_price", "商品单价不能为负数")
    } else if *price > MAX_AMOUNT {
        ("price_too_large", "商品单价超出允许范围")
    } else if price.normalize().scale() > AMOUNT_SCALE {
        ("price_scale", "商品单价最多保留两位小数")
    } else {
        return Ok(());
    };

    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    Err(error)
}

/// 更新订单状态请求
///
/// `tracking_number` 仅用于发货事件，`reason` 仅用于取消事件。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl UpdateOrderStatusRequest {
    pub fn new(status: OrderStatus) -> Self {
        Self {
            status,
            tracking_number: None,
            reason: None,
        }
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
