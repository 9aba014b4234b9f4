//! 应用状态定义

use std::sync::Arc;

use order_shared::broker::MessageBroker;
use order_shared::database::Database;

use crate::service::DynOrderService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<DynOrderService>,
    /// 消息代理句柄，用于就绪检查
    pub broker: Arc<dyn MessageBroker>,
    /// 内存存储模式下为 None
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(
        order_service: Arc<DynOrderService>,
        broker: Arc<dyn MessageBroker>,
        database: Option<Database>,
    ) -> Self {
        Self {
            order_service,
            broker,
            database,
        }
    }
}
