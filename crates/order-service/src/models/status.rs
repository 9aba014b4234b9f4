//! 订单状态机
//!
//! 状态流转以显式的"当前状态 -> 允许的目标状态"表表达。
//! 目前唯一强制的约束是取消：只有 待确认/已确认/处理中 的订单可以取消，
//! 其余状态之间的流转全部放行。

use serde::{Deserialize, Serialize};

/// 订单状态
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 待确认 - 新建订单的初始状态
    #[default]
    Pending,
    /// 已确认 - 支付确认
    Confirmed,
    /// 处理中
    Processing,
    /// 已发货
    Shipped,
    /// 已送达 - 成功终态
    Delivered,
    /// 已取消 - 失败终态
    Cancelled,
}

use OrderStatus::*;

const ALL_TARGETS: &[OrderStatus] = &[Pending, Confirmed, Processing, Shipped, Delivered, Cancelled];
const NON_CANCEL_TARGETS: &[OrderStatus] = &[Pending, Confirmed, Processing, Shipped, Delivered];

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [Pending, Confirmed, Processing, Shipped, Delivered, Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pending => "PENDING",
            Confirmed => "CONFIRMED",
            Processing => "PROCESSING",
            Shipped => "SHIPPED",
            Delivered => "DELIVERED",
            Cancelled => "CANCELLED",
        }
    }

    /// 当前状态允许流转到的目标状态
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        match self {
            Pending | Confirmed | Processing => ALL_TARGETS,
            Shipped | Delivered | Cancelled => NON_CANCEL_TARGETS,
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("未知的订单状态: {s}"))
    }
}
