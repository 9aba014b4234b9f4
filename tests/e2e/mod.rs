//! 订单系统端到端测试
//!
//! 在内存存储与内存消息代理上跑通完整链路：
//! 订单服务 -> 存储 -> 事件发布 -> topic 交换机 -> 队列 -> 消费者处理 -> 确认/拒绝。
//! 覆盖：
//! - 订单生命周期与事件序列
//! - 逆向场景（非法取消）
//! - 通知消费（绑定过滤、坏消息拒绝）
//! - 数据一致性（总额、原子创建、按用户查询）

pub mod data;
pub mod setup;
pub mod suites;

pub use setup::TestEnvironment;
