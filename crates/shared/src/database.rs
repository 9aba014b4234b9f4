//! 订单存储连接管理
//!
//! PostgreSQL 连接池、启动时迁移，以及面向就绪探针的订单表检查。
//! 迁移脚本归属各服务 crate，通过 `sqlx::migrate!` 生成的 [`Migrator`] 传入。

use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::error::{InfraError, Result};

/// 就绪前必须存在的订单表
pub const ORDER_TABLES: [&str; 2] = ["orders.t_order", "orders.t_ordered_product"];

/// 订单存储连接池
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await?;

        info!("Order store connection pool created");
        Ok(Self { pool })
    }

    /// 连接后按 `run_migrations` 配置决定是否执行迁移
    pub async fn connect_with_migrations(
        config: &DatabaseConfig,
        migrator: &Migrator,
    ) -> Result<Self> {
        let db = Self::connect(config).await?;
        if config.run_migrations {
            db.migrate(migrator).await?;
        } else {
            warn!("Migrations disabled, assuming the order schema already exists");
        }
        Ok(db)
    }

    pub async fn migrate(&self, migrator: &Migrator) -> Result<()> {
        migrator.run(&self.pool).await?;
        info!(known = migrator.iter().count(), "Order store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 就绪检查：连接可用且订单表均已建立
    pub async fn health_check(&self) -> Result<()> {
        for table in ORDER_TABLES {
            let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
                .bind(table)
                .fetch_one(&self.pool)
                .await?;
            if !exists {
                return Err(InfraError::SchemaMissing(table.to_string()));
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Order store connection pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_database_config;

    #[test]
    fn test_order_tables_are_schema_qualified() {
        assert!(ORDER_TABLES.iter().all(|t| t.starts_with("orders.")));
    }

    #[tokio::test]
    #[ignore] // 需要数据库连接
    async fn test_health_check_reports_missing_schema() {
        let db = Database::connect(&test_database_config()).await.unwrap();
        if let Err(e) = db.health_check().await {
            assert!(matches!(e, InfraError::SchemaMissing(_)));
        }
        db.close().await;
    }
}
