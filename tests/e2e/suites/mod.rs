//! 测试套件模块

pub mod data_consistency;
pub mod notification;
pub mod order_lifecycle;
pub mod reverse_flow;
