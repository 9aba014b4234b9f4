//! 订单服务
//!
//! 订单创建与状态流转的业务入口。写路径统一遵循
//! 校验 -> 持久化 -> 发布事件 的顺序：持久化失败时不发布任何事件；
//! 发布失败只记录日志，不回滚已提交的变更，也不重试。
//!
//! 数据库写入与消息发布之间没有 outbox，进程在两者之间崩溃会丢失事件，
//! 消费方对事件的投递语义是至多一次。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use order_shared::events::EventProduct;
use order_shared::observability::metrics;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    CreateOrderRequest, OrderResponse, OrderSummaryResponse, OrderedProductResponse,
    UpdateOrderStatusRequest,
};
use crate::error::{OrderError, Result};
use crate::messaging::EventPublisher;
use crate::models::{Order, OrderStatus, OrderWithProducts, OrderedProduct};
use crate::repository::{OrderRepository, OrderRepositoryTrait};

/// 以 trait 对象持有仓储的订单服务，供 HTTP 层共享
pub type DynOrderService = OrderService<dyn OrderRepositoryTrait>;

/// 订单服务
pub struct OrderService<R: OrderRepositoryTrait + ?Sized = OrderRepository> {
    repo: Arc<R>,
    publisher: Arc<EventPublisher>,
}

impl<R: OrderRepositoryTrait + ?Sized> OrderService<R> {
    pub fn new(repo: Arc<R>, publisher: Arc<EventPublisher>) -> Self {
        Self { repo, publisher }
    }

    /// 创建订单
    ///
    /// 计算各商品小计与订单总额，生成新的订单/商品 ID，在同一事务中写入。
    /// 返回值中的商品列表即请求中的商品列表。
    #[instrument(skip(self, req), fields(user_id = %req.user_id, products = req.products.len()))]
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<OrderResponse> {
        req.validate()?;

        let now = Utc::now();
        let order_id = Uuid::now_v7().to_string();

        let items = req
            .products
            .iter()
            .map(|p| {
                let subtotal = OrderedProduct::compute_subtotal(p.quantity, p.price).ok_or_else(
                    || {
                        OrderError::Validation(format!(
                            "商品 {} 小计超出允许范围",
                            p.product_code
                        ))
                    },
                )?;
                Ok(OrderedProduct {
                    id: Uuid::now_v7().to_string(),
                    order_id: order_id.clone(),
                    product_code: p.product_code.clone(),
                    product_name: p.product_name.clone(),
                    quantity: p.quantity,
                    price: p.price,
                    subtotal,
                    created_at: now,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let total_amount = OrderedProduct::sum_subtotals(&items)
            .ok_or_else(|| OrderError::Validation("订单总额超出允许范围".to_string()))?;

        let order = Order {
            id: order_id,
            user_id: req.user_id.clone(),
            status: OrderStatus::Pending,
            total_amount,
            shipping_address: req.shipping_address.clone(),
            payment_method: req.payment_method.clone(),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create_order_with_items(&order, &items).await?;
        metrics::record_order_created();
        info!(order_id = %created.id, total_amount = %created.total_amount, "订单已创建");

        let event_products = req
            .products
            .iter()
            .map(|p| EventProduct {
                product_code: p.product_code.clone(),
                product_name: p.product_name.clone(),
                quantity: p.quantity,
                price: p.price,
            })
            .collect();
        if let Err(e) = self
            .publisher
            .publish_order_created(&created, event_products)
            .await
        {
            error!(order_id = %created.id, error = %e, "发布订单创建事件失败");
        }

        let products = items.iter().map(Into::into).collect();
        Ok(OrderResponse::new(created, products))
    }

    /// 更新订单状态
    ///
    /// 先发布 `order.status.updated`，再按新状态发布对应的专属事件（待确认状态没有专属事件）。
    #[instrument(skip(self, req), fields(order_id = %order_id, status = %req.status))]
    pub async fn update_order_status(
        &self,
        order_id: &str,
        req: UpdateOrderStatusRequest,
    ) -> Result<()> {
        let order = self.load_order(order_id).await?;
        let old_status = order.status;
        let new_status = req.status;

        if !old_status.can_transition_to(new_status) {
            warn!(from = %old_status, to = %new_status, "非法的订单状态流转");
            return Err(OrderError::InvalidTransition {
                order_id: order_id.to_string(),
                from: old_status,
                to: new_status,
            });
        }

        self.repo.update_order_status(order_id, new_status).await?;
        metrics::record_status_transition(old_status.as_str(), new_status.as_str());
        info!(from = %old_status, to = %new_status, "订单状态已更新");

        self.publish_status_events(&order, new_status, req).await;
        Ok(())
    }

    async fn publish_status_events(
        &self,
        order: &Order,
        new_status: OrderStatus,
        req: UpdateOrderStatusRequest,
    ) {
        let (order_id, user_id) = (order.id.as_str(), order.user_id.as_str());

        if let Err(e) = self
            .publisher
            .publish_order_status_updated(order_id, user_id, order.status, new_status)
            .await
        {
            error!(order_id, error = %e, "发布订单状态变更事件失败");
        }

        let result = match new_status {
            OrderStatus::Pending => return,
            OrderStatus::Confirmed => {
                self.publisher
                    .publish_order_confirmed(
                        order_id,
                        user_id,
                        &order.payment_method,
                        order.total_amount,
                    )
                    .await
            }
            OrderStatus::Processing => {
                self.publisher
                    .publish_order_processing(order_id, user_id)
                    .await
            }
            OrderStatus::Shipped => {
                self.publisher
                    .publish_order_shipped(order_id, user_id, req.tracking_number)
                    .await
            }
            OrderStatus::Delivered => {
                self.publisher
                    .publish_order_delivered(order_id, user_id)
                    .await
            }
            OrderStatus::Cancelled => {
                self.publisher
                    .publish_order_cancelled(order_id, user_id, req.reason)
                    .await
            }
        };

        if let Err(e) = result {
            error!(order_id, status = %new_status, error = %e, "发布订单状态事件失败");
        }
    }

    // ==================== 查询 ====================

    async fn load_order(&self, order_id: &str) -> Result<Order> {
        self.repo
            .get_order_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    /// 批量拉取商品并按订单归组，保持订单原有顺序
    async fn attach_products(&self, orders: Vec<Order>) -> Result<Vec<OrderResponse>> {
        let ids: Vec<String> = orders.iter().map(|o| o.id.clone()).collect();
        let mut grouped: HashMap<String, Vec<OrderedProduct>> = HashMap::new();
        for item in self.repo.get_ordered_items_by_order_ids(&ids).await? {
            grouped.entry(item.order_id.clone()).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let products = grouped.remove(&order.id).unwrap_or_default();
                OrderWithProducts { order, products }.into()
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_order_by_id(&self, order_id: &str) -> Result<OrderResponse> {
        let order = self.load_order(order_id).await?;
        let products = self.repo.get_ordered_items_by_order_id(order_id).await?;
        Ok(OrderWithProducts { order, products }.into())
    }

    #[instrument(skip(self))]
    pub async fn get_order_summary_by_id(&self, order_id: &str) -> Result<OrderSummaryResponse> {
        Ok(self.load_order(order_id).await?.into())
    }

    /// 获取订单商品；订单不存在时返回 `OrderNotFound`
    #[instrument(skip(self))]
    pub async fn get_products_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Vec<OrderedProductResponse>> {
        self.load_order(order_id).await?;
        let products = self.repo.get_ordered_items_by_order_id(order_id).await?;
        Ok(products.iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn list_orders_by_user(&self, user_id: &str) -> Result<Vec<OrderResponse>> {
        let orders = self.repo.list_orders_by_user(user_id).await?;
        self.attach_products(orders).await
    }

    #[instrument(skip(self))]
    pub async fn list_order_summaries_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<OrderSummaryResponse>> {
        let orders = self.repo.list_orders_by_user(user_id).await?;
        Ok(orders.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<OrderResponse>> {
        let orders = self.repo.list_all_orders().await?;
        self.attach_products(orders).await
    }

    #[instrument(skip(self))]
    pub async fn list_all_order_summaries(&self) -> Result<Vec<OrderSummaryResponse>> {
        let orders = self.repo.list_all_orders().await?;
        Ok(orders.into_iter().map(Into::into).collect())
    }
}
