//! 订单领域模型

pub mod order;
pub mod status;

pub use order::{AMOUNT_SCALE, MAX_AMOUNT, Order, OrderWithProducts, OrderedProduct};
pub use status::OrderStatus;
