//! 内存消息代理
//!
//! 在进程内模拟 topic 交换机：按绑定模式将发布的消息路由到队列，
//! 队列由无界 mpsc 通道承载，支持手动 ack/reject 与重新入队。
//! 同时记录发布日志和确认结果，供测试断言使用。
//!
//! 每个队列同一时间只允许一个消费者。发布同样受发布超时约束，
//! 可通过 [`InMemoryBroker::stall_publishes`] 模拟代理迟迟不确认的情形。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::broker::{
    CONTENT_TYPE_JSON, ConsumerMessage, DEFAULT_PUBLISH_TIMEOUT, Delivery, DeliveryAcker,
    DeliveryStream, ExchangeKind, MessageBroker,
};
use crate::error::MessagingError;
use crate::topic;

/// 发布日志中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
    pub content_type: String,
    pub persistent: bool,
}

impl PublishedMessage {
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// 投递的最终处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    Rejected { requeued: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub queue: String,
    pub delivery_tag: u64,
    pub routing_key: String,
    pub outcome: AckOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub queue: String,
    pub exchange: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    exchange: String,
    routing_key: String,
    payload: Vec<u8>,
    redelivered: bool,
}

struct QueueState {
    sender: mpsc::UnboundedSender<QueuedMessage>,
    receiver: Option<mpsc::UnboundedReceiver<QueuedMessage>>,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    published: Vec<PublishedMessage>,
    settlements: Vec<Settlement>,
}

/// 进程内消息代理
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    next_delivery_tag: Arc<AtomicU64>,
    closed: AtomicBool,
    fail_publishes: AtomicBool,
    stall_publishes: AtomicBool,
    publish_lock: tokio::sync::Mutex<()>,
    publish_timeout: Duration,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            next_delivery_tag: Arc::default(),
            closed: AtomicBool::new(false),
            fail_publishes: AtomicBool::new(false),
            stall_publishes: AtomicBool::new(false),
            publish_lock: tokio::sync::Mutex::new(()),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// 故障注入：开启后所有发布调用返回 `Publish` 错误
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// 故障注入：开启后发布调用得不到确认，等满发布超时后返回 `PublishTimeout`
    pub fn stall_publishes(&self, stall: bool) {
        self.stall_publishes.store(stall, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn has_exchange(&self, name: &str) -> bool {
        self.state.lock().exchanges.contains_key(name)
    }

    pub fn exchange_kind(&self, name: &str) -> Option<ExchangeKind> {
        self.state.lock().exchanges.get(name).copied()
    }

    pub fn has_queue(&self, name: &str) -> bool {
        self.state.lock().queues.contains_key(name)
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.state.lock().bindings.clone()
    }

    /// 全部已发布消息（含未路由到任何队列的消息）
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    pub fn published_routing_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .published
            .iter()
            .map(|m| m.routing_key.clone())
            .collect()
    }

    pub fn settlements(&self) -> Vec<Settlement> {
        self.state.lock().settlements.clone()
    }

    /// 轮询等待确认记录达到指定数量，超时返回 false
    pub async fn wait_for_settlements(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.state.lock().settlements.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn ensure_open(&self) -> Result<(), MessagingError> {
        if self.is_closed() {
            Err(MessagingError::Closed)
        } else {
            Ok(())
        }
    }
}

fn binding_matches(kind: ExchangeKind, pattern: &str, routing_key: &str) -> bool {
    match kind {
        ExchangeKind::Topic => topic::matches(pattern, routing_key),
        ExchangeKind::Direct => pattern == routing_key,
        ExchangeKind::Fanout => true,
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> Result<(), MessagingError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        match state.exchanges.get(name) {
            Some(existing) if *existing != kind => Err(MessagingError::DeclareExchange {
                exchange: name.to_string(),
                reason: format!(
                    "PRECONDITION_FAILED - inequivalent arg 'type': existing {}, requested {}",
                    existing, kind
                ),
            }),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), kind);
                debug!(exchange = name, kind = %kind, "声明交换机");
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, name: &str) -> Result<(), MessagingError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        state.queues.entry(name.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            QueueState {
                sender,
                receiver: Some(receiver),
            }
        });
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), MessagingError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let bind_error = |reason: &str| MessagingError::Bind {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };
        if !state.exchanges.contains_key(exchange) {
            return Err(bind_error("NOT_FOUND - no exchange"));
        }
        if !state.queues.contains_key(queue) {
            return Err(bind_error("NOT_FOUND - no queue"));
        }

        let binding = Binding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            pattern: pattern.to_string(),
        };
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), MessagingError> {
        self.ensure_open()?;
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(MessagingError::Publish {
                routing_key: routing_key.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }

        // 与 RabbitMQ 客户端一致：排队与等待确认共用同一个发布超时
        let confirmed = async {
            let _guard = self.publish_lock.lock().await;
            if self.stall_publishes.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
        };
        if tokio::time::timeout(self.publish_timeout, confirmed)
            .await
            .is_err()
        {
            return Err(MessagingError::PublishTimeout {
                routing_key: routing_key.to_string(),
                timeout_ms: self.publish_timeout.as_millis() as u64,
            });
        }

        let mut state = self.state.lock();
        let Some(kind) = state.exchanges.get(exchange).copied() else {
            return Err(MessagingError::Publish {
                routing_key: routing_key.to_string(),
                reason: format!("NOT_FOUND - no exchange '{}'", exchange),
            });
        };

        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            persistent: true,
        });

        let mut targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && binding_matches(kind, &b.pattern, routing_key))
            .map(|b| b.queue.clone())
            .collect();
        targets.sort();
        targets.dedup();

        // 未匹配任何绑定的消息被静默丢弃
        for queue in targets {
            if let Some(q) = state.queues.get(&queue) {
                let _ = q.sender.send(QueuedMessage {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                    payload: payload.to_vec(),
                    redelivered: false,
                });
            }
        }

        Ok(())
    }

    async fn open_delivery_stream(
        &self,
        queue: &str,
    ) -> Result<Box<dyn DeliveryStream>, MessagingError> {
        self.ensure_open()?;
        let mut state = self.state.lock();
        let consume_error = |reason: &str| MessagingError::Consume {
            queue: queue.to_string(),
            reason: reason.to_string(),
        };
        let queue_state = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| consume_error("NOT_FOUND - no queue"))?;
        let receiver = queue_state
            .receiver
            .take()
            .ok_or_else(|| consume_error("queue already has a consumer"))?;

        Ok(Box::new(MemoryDeliveryStream {
            queue: queue.to_string(),
            receiver,
            state: Arc::clone(&self.state),
            next_delivery_tag: Arc::clone(&self.next_delivery_tag),
        }))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // 丢弃全部发送端，消费方取完缓冲消息后投递流结束
        self.state.lock().queues.clear();
        debug!("内存消息代理已关闭");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.is_closed()
    }
}

struct MemoryDeliveryStream {
    queue: String,
    receiver: mpsc::UnboundedReceiver<QueuedMessage>,
    state: Arc<Mutex<BrokerState>>,
    next_delivery_tag: Arc<AtomicU64>,
}

#[async_trait]
impl DeliveryStream for MemoryDeliveryStream {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, MessagingError>> {
        let queued = self.receiver.recv().await?;
        let delivery_tag = self.next_delivery_tag.fetch_add(1, Ordering::SeqCst) + 1;

        let message = ConsumerMessage {
            delivery_tag,
            exchange: queued.exchange.clone(),
            routing_key: queued.routing_key.clone(),
            payload: queued.payload.clone(),
            redelivered: queued.redelivered,
            content_type: Some(CONTENT_TYPE_JSON.to_string()),
        };
        let acker = MemoryAcker {
            queue: self.queue.clone(),
            delivery_tag,
            queued,
            state: Arc::clone(&self.state),
            settled: AtomicBool::new(false),
        };

        Some(Ok(Delivery {
            message,
            acker: Box::new(acker),
        }))
    }
}

struct MemoryAcker {
    queue: String,
    delivery_tag: u64,
    queued: QueuedMessage,
    state: Arc<Mutex<BrokerState>>,
    settled: AtomicBool,
}

impl MemoryAcker {
    fn settle(&self, outcome: AckOutcome) -> Result<(), MessagingError> {
        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(MessagingError::Acknowledge {
                delivery_tag: self.delivery_tag,
                reason: "PRECONDITION_FAILED - unknown delivery tag".to_string(),
            });
        }

        let mut state = self.state.lock();
        state.settlements.push(Settlement {
            queue: self.queue.clone(),
            delivery_tag: self.delivery_tag,
            routing_key: self.queued.routing_key.clone(),
            outcome,
        });

        if outcome == (AckOutcome::Rejected { requeued: true }) {
            let queue = state.queues.get(&self.queue).ok_or(MessagingError::Closed)?;
            queue
                .sender
                .send(QueuedMessage {
                    redelivered: true,
                    ..self.queued.clone()
                })
                .map_err(|_| MessagingError::Closed)?;
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryAcker for MemoryAcker {
    async fn ack(&self) -> Result<(), MessagingError> {
        self.settle(AckOutcome::Acked)
    }

    async fn reject(&self, requeue: bool) -> Result<(), MessagingError> {
        self.settle(AckOutcome::Rejected { requeued: requeue })
    }
}
