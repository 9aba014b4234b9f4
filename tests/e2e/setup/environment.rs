//! 测试环境
//!
//! 显式构造代理、存储、发布器、订单服务与通知消费者，并额外绑定
//! 一个 `order.#` 审计队列以观察交换机上的全部事件。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notification_worker::{EventConsumer, EventHandler, NotificationError};
use order_service::{EventPublisher, InMemoryOrderRepository, OrderService};
use order_shared::broker::{ConsumeSummary, MessageBroker, RejectPolicy, consume};
use order_shared::config::MessagingConfig;
use order_shared::events::{ORDER_EXCHANGE, OrderEventEnvelope, OrderEventType};
use order_shared::memory_broker::InMemoryBroker;
use order_shared::test_utils::bind_audit_queue;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

const AUDIT_QUEUE: &str = "audit";

/// 记录处理过的事件
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<(Option<OrderEventType>, OrderEventEnvelope)>>,
}

impl RecordingHandler {
    pub fn event_types(&self) -> Vec<Option<OrderEventType>> {
        self.events.lock().iter().map(|(t, _)| *t).collect()
    }

    pub fn envelopes(&self) -> Vec<OrderEventEnvelope> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(
        &self,
        event_type: Option<OrderEventType>,
        _routing_key: &str,
        event: &OrderEventEnvelope,
    ) -> Result<(), NotificationError> {
        self.events.lock().push((event_type, event.clone()));
        Ok(())
    }
}

/// 端到端测试环境
pub struct TestEnvironment {
    pub broker: Arc<InMemoryBroker>,
    pub repo: Arc<InMemoryOrderRepository>,
    pub service: OrderService<InMemoryOrderRepository>,
    pub handler: Arc<RecordingHandler>,
    audited: Arc<Mutex<Vec<String>>>,
    loops: Vec<JoinHandle<ConsumeSummary>>,
}

impl TestEnvironment {
    pub async fn setup() -> anyhow::Result<Self> {
        let broker = Arc::new(InMemoryBroker::new());
        let repo = Arc::new(InMemoryOrderRepository::new());

        let publisher = Arc::new(EventPublisher::new(broker.clone(), ORDER_EXCHANGE).await?);
        let service = OrderService::new(repo.clone(), publisher);

        let handler = Arc::new(RecordingHandler::default());
        let consumer = EventConsumer::new(
            broker.clone(),
            &MessagingConfig::default(),
            handler.clone(),
        );
        let notification_loop = consumer.start().await?;

        bind_audit_queue(broker.as_ref(), AUDIT_QUEUE).await?;
        let audited = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&audited);
        let audit_loop = consume(
            broker.as_ref(),
            AUDIT_QUEUE,
            RejectPolicy::Discard,
            move |msg| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(msg.routing_key);
                    Ok::<(), String>(())
                }
            },
        )
        .await?;

        Ok(Self {
            broker,
            repo,
            service,
            handler,
            audited,
            loops: vec![notification_loop, audit_loop],
        })
    }

    /// 等待代理上累计的确认/拒绝记录达到 `count`
    pub async fn wait_for_settlements(&self, count: usize) -> bool {
        self.broker
            .wait_for_settlements(count, Duration::from_secs(2))
            .await
    }

    /// 审计队列按到达顺序收到的 routing key
    pub fn audited_routing_keys(&self) -> Vec<String> {
        self.audited.lock().clone()
    }

    /// 关闭代理并等待所有消费循环退出
    pub async fn shutdown(self) -> anyhow::Result<Vec<ConsumeSummary>> {
        self.broker.close().await?;
        let mut summaries = Vec::with_capacity(self.loops.len());
        for handle in self.loops {
            summaries.push(handle.await?);
        }
        Ok(summaries)
    }
}
