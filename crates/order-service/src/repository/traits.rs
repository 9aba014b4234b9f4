//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Order, OrderStatus, OrderedProduct};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 在同一事务中写入订单及其全部商品，任一写入失败时不留下任何记录
    async fn create_order_with_items(&self, order: &Order, items: &[OrderedProduct])
    -> Result<Order>;

    async fn get_order_by_id(&self, id: &str) -> Result<Option<Order>>;

    async fn get_ordered_items_by_order_id(&self, order_id: &str) -> Result<Vec<OrderedProduct>>;

    async fn get_ordered_items_by_order_ids(
        &self,
        order_ids: &[String],
    ) -> Result<Vec<OrderedProduct>>;

    async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<Order>>;

    async fn list_all_orders(&self) -> Result<Vec<Order>>;

    /// 更新订单状态；订单不存在时返回 `OrderNotFound`
    async fn update_order_status(&self, id: &str, status: OrderStatus) -> Result<()>;
}
