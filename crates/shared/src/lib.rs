//! 共享库
//!
//! 包含订单服务与通知服务共用的配置、错误处理、数据库连接、消息代理、
//! 事件模型和可观测性等基础设施代码。

pub mod broker;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod memory_broker;
pub mod observability;
pub mod rabbitmq;
pub mod test_utils;
pub mod topic;
