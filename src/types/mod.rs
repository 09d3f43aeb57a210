//! 通用数据类型定义
//!
//! 定义语句参数与查询结果的值类型

pub mod data_value;

pub use data_value::{DataValue, Row};
