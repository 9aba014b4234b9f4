//! 订单服务 HTTP DTO

pub mod request;
pub mod response;

pub use request::{CreateOrderRequest, OrderedProductDto, UpdateOrderStatusRequest};
pub use response::{ApiResponse, OrderResponse, OrderSummaryResponse, OrderedProductResponse};
