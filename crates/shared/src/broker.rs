//! 消息代理抽象
//!
//! 将 topic 交换机的声明、绑定、发布和手动确认消费抽象为 `MessageBroker` trait，
//! 生产实现为 RabbitMQ（见 [`crate::rabbitmq`]），测试与本地开发使用
//! [`crate::memory_broker::InMemoryBroker`]。
//!
//! 消费循环被显式表达为逐条的 接收 -> 处理 -> 确认|拒绝 循环，
//! 失败消息是否重新入队由 [`RejectPolicy`] 决定。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::MessagingError;

/// 消息内容类型
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// 默认发布超时
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// 交换机类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Direct,
    Fanout,
    Topic,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fanout => "fanout",
            Self::Topic => "topic",
        }
    }
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 处理失败时的拒绝策略
///
/// 默认 `Discard`：消息被拒绝且不重新入队，未配置死信交换机时等同于永久丢弃。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectPolicy {
    #[default]
    Discard,
    Requeue,
}

impl RejectPolicy {
    pub fn from_requeue_flag(requeue: bool) -> Self {
        if requeue { Self::Requeue } else { Self::Discard }
    }

    pub fn requeue(&self) -> bool {
        matches!(self, Self::Requeue)
    }
}

// ---------------------------------------------------------------------------
// ConsumerMessage / Delivery
// ---------------------------------------------------------------------------

/// 消费到的消息的统一表示
///
/// 拥有所有权，可跨 await 点传递给异步处理函数。
#[derive(Debug, Clone)]
pub struct ConsumerMessage {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub redelivered: bool,
    pub content_type: Option<String>,
}

impl ConsumerMessage {
    /// 将负载视为 UTF-8 字符串返回
    pub fn payload_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    /// 将 JSON 格式负载反序列化为目标类型
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// 单条投递的确认句柄
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> Result<(), MessagingError>;

    async fn reject(&self, requeue: bool) -> Result<(), MessagingError>;
}

/// 一次投递：消息 + 该消息专属的确认句柄
pub struct Delivery {
    pub message: ConsumerMessage,
    pub acker: Box<dyn DeliveryAcker>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// 投递流
///
/// 无超时地阻塞等待下一条消息；返回 `None` 表示底层通道或连接已关闭。
#[async_trait]
pub trait DeliveryStream: Send {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, MessagingError>>;
}

// ---------------------------------------------------------------------------
// MessageBroker
// ---------------------------------------------------------------------------

/// 面向 topic 交换机拓扑的消息代理句柄
///
/// 所有声明操作幂等。实现方需保证并发调用 `publish` 时内部串行化。
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// 声明持久化、非自动删除的交换机
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind)
    -> Result<(), MessagingError>;

    /// 声明持久化、非独占的队列
    async fn declare_queue(&self, name: &str) -> Result<(), MessagingError>;

    /// 以 topic 模式将队列绑定到交换机
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), MessagingError>;

    /// 发布持久化 JSON 消息，超过发布超时返回 `PublishTimeout`
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), MessagingError>;

    /// 以手动确认模式在队列上注册消费者
    async fn open_delivery_stream(
        &self,
        queue: &str,
    ) -> Result<Box<dyn DeliveryStream>, MessagingError>;

    /// 释放通道与连接；可重复调用
    async fn close(&self) -> Result<(), MessagingError>;

    /// 连接当前是否可用，供就绪探针使用
    fn is_connected(&self) -> bool;
}

// ---------------------------------------------------------------------------
// 消费循环
// ---------------------------------------------------------------------------

/// 消费循环结束时的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeSummary {
    pub received: u64,
    pub acked: u64,
    pub rejected: u64,
    /// ack/reject 调用本身失败的次数
    pub settle_failures: u64,
}

/// 在队列上启动一个专属的后台消费任务
///
/// 每次调用对应一个独立的循环，循环内严格逐条顺序处理；
/// 循环仅在代理连接关闭、投递流结束时退出，返回的 JoinHandle 产出统计信息。
pub async fn consume<F, Fut, E>(
    broker: &dyn MessageBroker,
    queue: &str,
    policy: RejectPolicy,
    handler: F,
) -> Result<JoinHandle<ConsumeSummary>, MessagingError>
where
    F: Fn(ConsumerMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let stream = broker.open_delivery_stream(queue).await?;
    let queue = queue.to_string();

    info!(queue = %queue, ?policy, "消费者已注册");

    Ok(tokio::spawn(run_consume_loop(stream, queue, policy, handler)))
}

/// 消费循环主体：接收 -> 处理 -> 确认|拒绝
///
/// 单条消息处理失败只影响该消息本身，循环继续处理后续投递。
pub async fn run_consume_loop<F, Fut, E>(
    mut stream: Box<dyn DeliveryStream>,
    queue: String,
    policy: RejectPolicy,
    handler: F,
) -> ConsumeSummary
where
    F: Fn(ConsumerMessage) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: Display + Send,
{
    let mut summary = ConsumeSummary::default();

    while let Some(next) = stream.next_delivery().await {
        let Delivery { message, acker } = match next {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(queue = %queue, error = %e, "接收消息出错");
                continue;
            }
        };

        summary.received += 1;
        let delivery_tag = message.delivery_tag;
        let routing_key = message.routing_key.clone();

        debug!(queue = %queue, delivery_tag, routing_key = %routing_key, "收到消息");

        let settled = match handler(message).await {
            Ok(()) => {
                summary.acked += 1;
                metrics::counter!("order_events_consumed_total", "outcome" => "acked").increment(1);
                acker.ack().await
            }
            Err(e) => {
                summary.rejected += 1;
                metrics::counter!("order_events_consumed_total", "outcome" => "rejected")
                    .increment(1);
                warn!(
                    queue = %queue,
                    delivery_tag,
                    routing_key = %routing_key,
                    requeue = policy.requeue(),
                    error = %e,
                    "消息处理失败，拒绝该消息"
                );
                acker.reject(policy.requeue()).await
            }
        };

        if let Err(e) = settled {
            summary.settle_failures += 1;
            error!(queue = %queue, delivery_tag, error = %e, "消息确认失败");
        }
    }

    info!(
        queue = %queue,
        received = summary.received,
        acked = summary.acked,
        rejected = summary.rejected,
        "投递流已结束，消费循环退出"
    );

    summary
}
