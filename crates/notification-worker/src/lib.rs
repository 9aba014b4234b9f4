//! 订单通知工作者
//!
//! 在 `orders` topic 交换机上声明自有队列并以 `order.*` 绑定，
//! 逐条消费订单事件，交给领域处理器处理：成功确认，失败拒绝。
//! 单条消息的失败不会终止消费循环。

pub mod consumer;
pub mod error;
pub mod handler;

pub use consumer::EventConsumer;
pub use error::NotificationError;
pub use handler::{EventHandler, LoggingEventHandler};
