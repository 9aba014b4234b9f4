//! 订单仓储层
//!
//! - `traits`: 仓储接口
//! - `order_repo`: PostgreSQL 实现
//! - `memory`: 内存实现，用于本地运行与测试

pub mod memory;
pub mod order_repo;
pub mod traits;

pub use memory::InMemoryOrderRepository;
pub use order_repo::{MIGRATOR, OrderRepository};
pub use traits::OrderRepositoryTrait;

#[cfg(test)]
pub use traits::MockOrderRepositoryTrait;
