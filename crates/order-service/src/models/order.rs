//! 订单与订单商品实体

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// 金额列（NUMERIC(12,2)）可存储的最大值：9999999999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// 金额列保留的小数位数
pub const AMOUNT_SCALE: u32 = 2;

/// 订单
///
/// `total_amount` 在创建时由各商品小计求和得出，之后不再重算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 订单商品
///
/// 专属于唯一的订单；`subtotal = quantity * price`，创建时计算一次。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderedProduct {
    pub id: String,
    pub order_id: String,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderedProduct {
    /// 计算小计；溢出或超出金额列范围时返回 `None`
    pub fn compute_subtotal(quantity: i32, price: Decimal) -> Option<Decimal> {
        price
            .checked_mul(Decimal::from(quantity))
            .filter(|subtotal| *subtotal <= MAX_AMOUNT)
    }

    /// 各商品小计求和；溢出或超出金额列范围时返回 `None`
    pub fn sum_subtotals<'a>(
        items: impl IntoIterator<Item = &'a OrderedProduct>,
    ) -> Option<Decimal> {
        items
            .into_iter()
            .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal))
            .filter(|total| *total <= MAX_AMOUNT)
    }
}

/// 订单及其全部商品
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWithProducts {
    pub order: Order,
    pub products: Vec<OrderedProduct>,
}
