//! 订单业务服务层

pub mod order_service;

pub use order_service::{DynOrderService, OrderService};
