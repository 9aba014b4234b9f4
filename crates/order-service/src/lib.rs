//! 订单服务
//!
//! 负责订单的事务性创建、状态机流转与查询，并在持久化成功后
//! 将每次变更作为持久化事件发布到 `orders` topic 交换机。
//!
//! ## 模块结构
//!
//! - `models`: 订单、订单商品与状态机
//! - `dto`: HTTP 请求/响应体
//! - `error`: 错误类型定义
//! - `repository`: 订单存储（Postgres 与内存实现）
//! - `messaging`: 订单事件发布器
//! - `service`: 订单业务服务
//! - `handlers` / `routes` / `state`: axum HTTP 接口

pub mod dto;
pub mod error;
pub mod handlers;
pub mod messaging;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use error::{OrderError, Result};
pub use messaging::EventPublisher;
pub use models::{Order, OrderStatus, OrderWithProducts, OrderedProduct};
pub use repository::{InMemoryOrderRepository, OrderRepository, OrderRepositoryTrait};
pub use service::{DynOrderService, OrderService};
