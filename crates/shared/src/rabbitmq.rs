//! RabbitMQ 基础设施封装
//!
//! 将 lapin 的底层 API 封装为 [`MessageBroker`] 实现：
//! 持久化 topic 交换机、持久化队列、带超时的持久化 JSON 发布，以及手动确认消费。
//! 每个客户端持有一条连接与一个通道，发布调用在通道上串行化，
//! 排队等待通道的时间同样计入发布超时。

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions,
    ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::broker::{
    CONTENT_TYPE_JSON, ConsumerMessage, Delivery, DeliveryAcker, DeliveryStream, ExchangeKind,
    MessageBroker,
};
use crate::config::RabbitMqConfig;
use crate::error::MessagingError;

/// AMQP 持久化投递模式
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// 正常关闭时的 AMQP reply code
const REPLY_SUCCESS: u16 = 200;

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        }
    }
}

/// RabbitMQ 客户端
pub struct RabbitMqClient {
    connection: Connection,
    channel: Channel,
    publish_lock: Mutex<()>,
    publish_timeout: Duration,
    closed: AtomicBool,
}

impl RabbitMqClient {
    /// 建立连接并打开通道
    ///
    /// 通道开启 publisher confirm，发布调用等待代理确认后才返回。
    #[instrument(skip(config), fields(host = %config.host, port = config.port))]
    pub async fn connect(
        config: &RabbitMqConfig,
        publish_timeout: Duration,
    ) -> Result<Self, MessagingError> {
        let mut properties = ConnectionProperties::default();
        if let Some(name) = &config.connection_name {
            properties = properties.with_connection_name(name.clone().into());
        }

        let connection = Connection::connect(&config.uri(), properties)
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| MessagingError::Channel(e.to_string()))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| MessagingError::Channel(e.to_string()))?;

        info!(
            host = %config.host,
            port = config.port,
            vhost = %config.vhost,
            "RabbitMQ 连接已建立"
        );

        Ok(Self {
            connection,
            channel,
            publish_lock: Mutex::new(()),
            publish_timeout,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), MessagingError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(MessagingError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageBroker for RabbitMqClient {
    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> Result<(), MessagingError> {
        self.ensure_open()?;
        let options = ExchangeDeclareOptions {
            durable: true,
            auto_delete: false,
            internal: false,
            ..Default::default()
        };

        self.channel
            .exchange_declare(name, kind.into(), options, FieldTable::default())
            .await
            .map_err(|e| MessagingError::DeclareExchange {
                exchange: name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(exchange = name, kind = %kind, "交换机已声明");
        Ok(())
    }

    async fn declare_queue(&self, name: &str) -> Result<(), MessagingError> {
        self.ensure_open()?;
        let options = QueueDeclareOptions {
            durable: true,
            exclusive: false,
            auto_delete: false,
            ..Default::default()
        };

        let queue = self
            .channel
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(|e| MessagingError::DeclareQueue {
                queue: name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            queue = name,
            messages = queue.message_count(),
            consumers = queue.consumer_count(),
            "队列已声明"
        );
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        pattern: &str,
    ) -> Result<(), MessagingError> {
        self.ensure_open()?;
        self.channel
            .queue_bind(
                queue,
                exchange,
                pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| MessagingError::Bind {
                queue: queue.to_string(),
                exchange: exchange.to_string(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        debug!(queue, exchange, pattern, "队列已绑定");
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), MessagingError> {
        self.ensure_open()?;

        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE_JSON.into())
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT)
            .with_timestamp(chrono::Utc::now().timestamp().max(0) as u64);

        let publish_error = |reason: String| MessagingError::Publish {
            routing_key: routing_key.to_string(),
            reason,
        };

        // 等待通道与等待确认共用同一个发布超时
        let send = async {
            let _guard = self.publish_lock.lock().await;
            let confirm = self
                .channel
                .basic_publish(
                    exchange,
                    routing_key,
                    BasicPublishOptions::default(),
                    payload,
                    properties,
                )
                .await?;
            confirm.await
        };

        let confirmation = tokio::time::timeout(self.publish_timeout, send)
            .await
            .map_err(|_| MessagingError::PublishTimeout {
                routing_key: routing_key.to_string(),
                timeout_ms: self.publish_timeout.as_millis() as u64,
            })?
            .map_err(|e| publish_error(e.to_string()))?;

        if confirmation.is_nack() {
            return Err(publish_error("broker nacked the message".to_string()));
        }

        debug!(exchange, routing_key, bytes = payload.len(), "消息已发布");
        Ok(())
    }

    async fn open_delivery_stream(
        &self,
        queue: &str,
    ) -> Result<Box<dyn DeliveryStream>, MessagingError> {
        self.ensure_open()?;
        let options = BasicConsumeOptions {
            no_ack: false,
            ..Default::default()
        };

        let consumer = self
            .channel
            .basic_consume(queue, "", options, FieldTable::default())
            .await
            .map_err(|e| MessagingError::Consume {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(RabbitDeliveryStream {
            queue: queue.to_string(),
            consumer,
        }))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.channel.close(REPLY_SUCCESS, "Bye").await {
            warn!(error = %e, "关闭 RabbitMQ 通道失败");
        }
        self.connection
            .close(REPLY_SUCCESS, "Bye")
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))?;

        info!("RabbitMQ 连接已关闭");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.connection.status().connected()
    }
}

struct RabbitDeliveryStream {
    queue: String,
    consumer: lapin::Consumer,
}

#[async_trait]
impl DeliveryStream for RabbitDeliveryStream {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, MessagingError>> {
        let next = self.consumer.next().await?;
        Some(
            next.map(|delivery| {
                let message = ConsumerMessage {
                    delivery_tag: delivery.delivery_tag,
                    exchange: delivery.exchange.as_str().to_string(),
                    routing_key: delivery.routing_key.as_str().to_string(),
                    redelivered: delivery.redelivered,
                    content_type: delivery
                        .properties
                        .content_type()
                        .as_ref()
                        .map(|ct| ct.as_str().to_string()),
                    payload: delivery.data,
                };
                Delivery {
                    acker: Box::new(RabbitAcker {
                        delivery_tag: message.delivery_tag,
                        acker: delivery.acker,
                    }),
                    message,
                }
            })
            .map_err(|e| MessagingError::Consume {
                queue: self.queue.clone(),
                reason: e.to_string(),
            }),
        )
    }
}

struct RabbitAcker {
    delivery_tag: u64,
    acker: Acker,
}

#[async_trait]
impl DeliveryAcker for RabbitAcker {
    async fn ack(&self) -> Result<(), MessagingError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| MessagingError::Acknowledge {
                delivery_tag: self.delivery_tag,
                reason: e.to_string(),
            })
    }

    async fn reject(&self, requeue: bool) -> Result<(), MessagingError> {
        self.acker
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(|e| MessagingError::Acknowledge {
                delivery_tag: self.delivery_tag,
                reason: e.to_string(),
            })
    }
}
