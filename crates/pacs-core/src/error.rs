//! 错误定义模块

use thiserror::Error;

/// 压测工具统一错误类型
#[derive(Error, Debug)]
pub enum PacsError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM处理错误: {0}")]
    Dicom(String),

    #[error("DICOM解析错误: {0}")]
    DicomParseError(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("归档服务拒绝请求: {path} 返回状态 {status}")]
    Rejected { status: u16, path: String },

    #[error("重试 {attempts} 次后仍然失败: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<PacsError>,
    },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PacsError {
    /// 该错误是否值得重试
    ///
    /// 网络错误和服务端 5xx 会重试；4xx 属于请求本身的问题，重试无意义。
    pub fn is_retryable(&self) -> bool {
        match self {
            PacsError::Network(_) => true,
            PacsError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, PacsError>;
