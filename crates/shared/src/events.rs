//! 订单事件模型
//!
//! 所有订单事件共享同一信封头 `{event_id, timestamp, order_id, user_id}`，
//! 各事件类型的专属字段平铺在信封同级。线上格式为 JSON，字段名 snake_case，
//! 金额以 JSON 数字表示。事件类型不写入负载，由 routing key 区分。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 订单事件 topic 交换机
pub const ORDER_EXCHANGE: &str = "orders";

/// 集中管理所有 routing key，防止字符串散落在各服务中导致拼写不一致
pub mod routing_keys {
    pub const CREATED: &str = "order.created";
    pub const STATUS_UPDATED: &str = "order.status.updated";
    pub const CONFIRMED: &str = "order.confirmed";
    pub const PROCESSING: &str = "order.processing";
    pub const SHIPPED: &str = "order.shipped";
    pub const DELIVERED: &str = "order.delivered";
    pub const CANCELLED: &str = "order.cancelled";

    /// 通知队列的默认绑定模式
    pub const ALL_SINGLE_SEGMENT: &str = "order.*";
}

// ---------------------------------------------------------------------------
// OrderEventType
// ---------------------------------------------------------------------------

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEventType {
    Created,
    StatusUpdated,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderEventType {
    pub const ALL: [OrderEventType; 7] = [
        Self::Created,
        Self::StatusUpdated,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    pub fn routing_key(&self) -> &'static str {
        match self {
            Self::Created => routing_keys::CREATED,
            Self::StatusUpdated => routing_keys::STATUS_UPDATED,
            Self::Confirmed => routing_keys::CONFIRMED,
            Self::Processing => routing_keys::PROCESSING,
            Self::Shipped => routing_keys::SHIPPED,
            Self::Delivered => routing_keys::DELIVERED,
            Self::Cancelled => routing_keys::CANCELLED,
        }
    }

    /// 由 routing key 反查事件类型，未知 key 返回 None
    pub fn from_routing_key(routing_key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.routing_key() == routing_key)
    }
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "OrderCreated",
            Self::StatusUpdated => "OrderStatusUpdated",
            Self::Confirmed => "OrderConfirmed",
            Self::Processing => "OrderProcessing",
            Self::Shipped => "OrderShipped",
            Self::Delivered => "OrderDelivered",
            Self::Cancelled => "OrderCancelled",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// 信封与事件体
// ---------------------------------------------------------------------------

/// 信封头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// 每次发布新生成，消费方可用于去重
    pub event_id: String,
    /// 发布时刻（RFC3339）
    pub timestamp: DateTime<Utc>,
    pub order_id: String,
    pub user_id: String,
}

impl EventHeader {
    /// 以新的 event_id 与当前时间构造信封头
    pub fn new(order_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            order_id: order_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// 信封头与事件体平铺后的完整事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    #[serde(flatten)]
    pub header: EventHeader,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProduct {
    pub product_code: String,
    pub product_name: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub payment_method: String,
    pub products: Vec<EventProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdated {
    pub old_status: String,
    pub new_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub payment_method: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrderShipped {
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrderCancelled {
    #[serde(default)]
    pub reason: Option<String>,
}

/// 无专属字段的事件体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NoFields {}

/// 订单事件体
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Created(OrderCreated),
    StatusUpdated(OrderStatusUpdated),
    Confirmed(OrderConfirmed),
    Processing,
    Shipped(OrderShipped),
    Delivered,
    Cancelled(OrderCancelled),
}

fn encode_with<T: Serialize>(header: &EventHeader, body: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&EventEnvelope {
        header: header.clone(),
        body,
    })
}

impl OrderEvent {
    pub fn event_type(&self) -> OrderEventType {
        match self {
            Self::Created(_) => OrderEventType::Created,
            Self::StatusUpdated(_) => OrderEventType::StatusUpdated,
            Self::Confirmed(_) => OrderEventType::Confirmed,
            Self::Processing => OrderEventType::Processing,
            Self::Shipped(_) => OrderEventType::Shipped,
            Self::Delivered => OrderEventType::Delivered,
            Self::Cancelled(_) => OrderEventType::Cancelled,
        }
    }

    pub fn routing_key(&self) -> &'static str {
        self.event_type().routing_key()
    }

    /// 将信封头与事件体编码为线上 JSON
    pub fn encode(&self, header: &EventHeader) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Created(body) => encode_with(header, body),
            Self::StatusUpdated(body) => encode_with(header, body),
            Self::Confirmed(body) => encode_with(header, body),
            Self::Processing | Self::Delivered => encode_with(header, &NoFields {}),
            Self::Shipped(body) => encode_with(header, body),
            Self::Cancelled(body) => encode_with(header, body),
        }
    }
}

// ---------------------------------------------------------------------------
// 消费端通用信封
// ---------------------------------------------------------------------------

/// 消费端使用的通用信封
///
/// 只要求公共头字段存在，类型专属字段保留在 `fields` 中原样透传。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEventEnvelope {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub order_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl OrderEventEnvelope {
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }
}
