//! 测试数据生成器

use std::str::FromStr;

use order_service::dto::{CreateOrderRequest, OrderedProductDto};
use rust_decimal::Decimal;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn product(code: &str, quantity: i32, price: &str) -> OrderedProductDto {
    OrderedProductDto {
        product_code: code.to_string(),
        product_name: format!("Product {code}"),
        quantity,
        price: dec(price),
    }
}

pub fn order_request(user_id: &str, products: Vec<OrderedProductDto>) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: user_id.to_string(),
        products,
        shipping_address: "88 Harbour Road".to_string(),
        payment_method: "CREDIT_CARD".to_string(),
    }
}

/// 两件商品，总额 47.48
pub fn two_product_order(user_id: &str) -> CreateOrderRequest {
    order_request(
        user_id,
        vec![product("P1", 2, "10.99"), product("P2", 1, "25.50")],
    )
}
