//! 订单服务入口
//!
//! 启动顺序：加载配置 -> 初始化可观测性 -> 订单存储 -> RabbitMQ -> 事件发布器 -> HTTP 服务。
//! 消息代理连接或交换机声明失败时进程直接退出。

use std::sync::Arc;

use axum::{Router, middleware};
use order_service::{
    DynOrderService, EventPublisher, InMemoryOrderRepository, OrderRepository,
    OrderRepositoryTrait, repository::MIGRATOR, routes, state::AppState,
};
use order_shared::{
    broker::MessageBroker,
    config::AppConfig,
    database::Database,
    observability::{self, middleware as obs_middleware},
    rabbitmq::RabbitMqClient,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("order-service").unwrap_or_default();

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting order-service on {}", config.server_addr());

    // 订单存储
    let (repo, database): (Arc<dyn OrderRepositoryTrait>, Option<Database>) =
        if config.database.is_in_memory() {
            warn!("Using in-memory order storage, data will not survive restarts");
            (Arc::new(InMemoryOrderRepository::new()), None)
        } else {
            let db = Database::connect_with_migrations(&config.database, &MIGRATOR).await?;
            (Arc::new(OrderRepository::new(db.pool().clone())), Some(db))
        };

    // 消息代理：连接与交换机声明失败对进程是致命的
    let broker: Arc<dyn MessageBroker> = Arc::new(
        RabbitMqClient::connect(&config.rabbitmq, config.messaging.publish_timeout()).await?,
    );
    let publisher = Arc::new(EventPublisher::new(broker.clone(), &config.messaging.exchange).await?);
    info!(exchange = %config.messaging.exchange, "Order event publisher ready");

    let order_service: Arc<DynOrderService> =
        Arc::new(order_service::OrderService::new(repo, publisher));
    let state = AppState::new(order_service, broker.clone(), database.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::app_routes())
        .layer(cors)
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = broker.close().await {
        warn!(error = %e, "Failed to close RabbitMQ connection");
    }
    if let Some(db) = database {
        db.close().await;
    }

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
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
