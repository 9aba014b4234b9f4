//! 订单事件发布

pub mod publisher;

pub use publisher::EventPublisher;
