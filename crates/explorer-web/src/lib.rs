//! # Web API模块
//!
//! 通过 JSON HTTP 接口向展示层提供：
//! - 患者画像相似病例查询
//! - 维度浏览筛选与坐标轴范围
//! - 手术洞察与年龄段构成

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use handlers::AppState;
pub use server::{create_app, WebServer};
