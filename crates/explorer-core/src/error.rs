//! 错误定义模块

use thiserror::Error;

/// 结果浏览器统一错误类型
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据不足: 找到 {found} 例，至少需要 {required} 例")]
    InsufficientData { found: usize, required: usize },

    #[error("数据错误: {0}")]
    Data(String),

    #[error("IO错误: {0}")]
    Io(String),
}

/// 结果浏览器统一结果类型
pub type Result<T> = std::result::Result<T, ExplorerError>;
