//! # Explorer Core
//!
//! 手术结局浏览器的核心模块，提供病例数据结构、错误定义和数值解析工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{ExplorerError, Result};
pub use models::*;
