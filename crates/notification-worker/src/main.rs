//! 订单通知工作者入口
//!
//! 连接 RabbitMQ，声明 `notifications` 队列并以 `order.*` 绑定到订单交换机，
//! 持续消费订单事件直到收到关闭信号。

use std::sync::Arc;

use notification_worker::{EventConsumer, LoggingEventHandler};
use order_shared::{
    broker::MessageBroker, config::AppConfig, observability, rabbitmq::RabbitMqClient,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("notification-worker").unwrap_or_default();

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting notification-worker...");

    // 连接与拓扑声明失败对进程是致命的
    let broker: Arc<dyn MessageBroker> = Arc::new(
        RabbitMqClient::connect(&config.rabbitmq, config.messaging.publish_timeout()).await?,
    );
    let consumer = EventConsumer::new(
        broker.clone(),
        &config.messaging,
        Arc::new(LoggingEventHandler),
    );
    let consume_loop = consumer.start().await?;

    shutdown_signal().await;

    // 关闭连接后投递流结束，消费循环随之退出
    if let Err(e) = broker.close().await {
        warn!(error = %e, "Failed to close RabbitMQ connection");
    }
    match consume_loop.await {
        Ok(summary) => info!(
            received = summary.received,
            acked = summary.acked,
            rejected = summary.rejected,
            "notification-worker stopped"
        ),
        Err(e) => warn!(error = %e, "Consume loop terminated abnormally"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
