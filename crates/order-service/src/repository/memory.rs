//! 内存订单仓储
//!
//! 用于本地无 Postgres 运行与测试。订单与商品在同一把写锁内整体写入，
//! 与数据库事务一样不会留下部分记录；支持注入写入失败。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::traits::OrderRepositoryTrait;
use crate::error::{OrderError, Result};
use crate::models::{Order, OrderStatus, OrderedProduct};

#[derive(Default)]
struct Tables {
    orders: HashMap<String, Order>,
    products: Vec<OrderedProduct>,
}

/// 内存订单仓储
#[derive(Default)]
pub struct InMemoryOrderRepository {
    tables: RwLock<Tables>,
    /// 写入第 N 个商品后模拟失败
    fail_item_inserts_after: Mutex<Option<usize>>,
    fail_updates: AtomicBool,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建订单时，在写入 `n` 个商品后模拟存储失败；`None` 关闭注入
    pub fn fail_item_inserts_after(&self, n: Option<usize>) {
        *self.fail_item_inserts_after.lock() = n;
    }

    /// 状态更新时模拟存储失败
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn order_count(&self) -> usize {
        self.tables.read().orders.len()
    }

    pub fn product_count(&self) -> usize {
        self.tables.read().products.len()
    }
}

fn sorted(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    orders
}

#[async_trait]
impl OrderRepositoryTrait for InMemoryOrderRepository {
    async fn create_order_with_items(
        &self,
        order: &Order,
        items: &[OrderedProduct],
    ) -> Result<Order> {
        let fail_after = *self.fail_item_inserts_after.lock();
        let mut tables = self.tables.write();

        if tables.orders.contains_key(&order.id) {
            return Err(OrderError::Storage(format!("订单主键冲突: {}", order.id)));
        }

        // 先在暂存区完成全部写入，成功后再一次性提交
        let mut staged = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if fail_after.is_some_and(|n| index >= n) {
                return Err(OrderError::Storage(format!(
                    "写入订单商品失败: order_id={}, product_code={}",
                    order.id, item.product_code
                )));
            }
            staged.push(item.clone());
        }

        tables.orders.insert(order.id.clone(), order.clone());
        tables.products.extend(staged);
        Ok(order.clone())
    }

    async fn get_order_by_id(&self, id: &str) -> Result<Option<Order>> {
        Ok(self.tables.read().orders.get(id).cloned())
    }

    async fn get_ordered_items_by_order_id(&self, order_id: &str) -> Result<Vec<OrderedProduct>> {
        Ok(self
            .tables
            .read()
            .products
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn get_ordered_items_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<OrderedProduct>> {
        Ok(self
            .tables
            .read()
            .products
            .iter()
            .filter(|p| order_ids.contains(&p.order_id))
            .cloned()
            .collect())
    }

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let orders = self
            .tables
            .read()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted(orders))
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>> {
        let orders = self.tables.read().orders.values().cloned().collect();
        Ok(sorted(orders))
    }

    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(OrderError::Storage(format!("更新订单状态失败: order_id={id}")));
        }

        let mut tables = self.tables.write();
        let order = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }
}
