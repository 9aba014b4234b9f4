//! 测试数据模块

mod generators;

pub use generators::*;
