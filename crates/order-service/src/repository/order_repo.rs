//! 订单仓储
//!
//! 基于 PostgreSQL 的订单数据访问，表位于 `orders` schema 下

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::debug;

use super::traits::OrderRepositoryTrait;
use crate::error::{OrderError, Result};
use crate::models::{Order, OrderStatus, OrderedProduct};

/// 订单表迁移
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const ORDER_COLUMNS: &str = "id, user_id, status, total_amount, shipping_address, payment_method, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, order_id, product_code, product_name, quantity, price, subtotal, created_at";

/// 订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn create_order_with_items(
        &self,
        order: &Order,
        items: &[OrderedProduct],
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders.t_order
                (id, user_id, status, total_amount, shipping_address, payment_method, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(order.total_amount)
        .bind(&order.shipping_address)
        .bind(&order.payment_method)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO orders.t_ordered_product
                    (id, order_id, product_code, product_name, quantity, price, subtotal, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_code)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price)
            .bind(item.subtotal)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(order_id = %created.id, items = items.len(), "订单已写入");
        Ok(created)
    }

    async fn get_order_by_id(&self, id: &str) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders.t_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn get_ordered_items_by_order_id(&self, order_id: &str) -> Result<Vec<OrderedProduct>> {
        let items = sqlx::query_as::<_, OrderedProduct>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM orders.t_ordered_product
            WHERE order_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn get_ordered_items_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<OrderedProduct>> {
        if order_ids.is_empty() {
            return Ok(vec![]);
        }

        let items = sqlx::query_as::<_, OrderedProduct>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM orders.t_ordered_product
            WHERE order_id = ANY($1)
            ORDER BY order_id ASC, created_at ASC, id ASC
            "#
        ))
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders.t_order
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders.t_order ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders.t_order
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::OrderNotFound(id.to_string()));
        }

        Ok(())
    }
}
