//! 健康检查处理器

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::state::AppState;

const SERVICE_NAME: &str = "order-service";

/// 存活探针：服务进程正常即返回 ok
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME
    }))
}

/// 就绪探针：检查数据库与消息代理连接
///
/// 内存存储模式下数据库检查记为 "memory"。
pub async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    let database = match &state.database {
        Some(db) => {
            if db.health_check().await.is_ok() {
                "ok"
            } else {
                "fail"
            }
        }
        None => "memory",
    };
    let broker_ok = state.broker.is_connected();
    let all_ok = database != "fail" && broker_ok;

    Json(json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "service": SERVICE_NAME,
        "checks": {
            "database": database,
            "rabbitmq": if broker_ok { "ok" } else { "fail" }
        }
    }))
}
