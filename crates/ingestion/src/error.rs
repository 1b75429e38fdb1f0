//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 回放文件无法打开
    #[error("cannot open replay '{path}': {message}")]
    Open {
        /// 文件路径
        path: String,
        /// 错误消息
        message: String,
    },

    /// 行解析失败
    #[error("replay line {line}: {message}")]
    ParseFailed {
        /// 行号 (从 1 开始)
        line: usize,
        /// 错误消息
        message: String,
    },

    /// 帧参数非法
    #[error("replay line {line}: invalid frame: {message}")]
    InvalidFrame {
        /// 行号 (从 1 开始)
        line: usize,
        /// 错误消息
        message: String,
    },
}

impl IngestionError {
    pub fn open(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Open {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse_failed(line: usize, message: impl Into<String>) -> Self {
        Self::ParseFailed {
            line,
            message: message.into(),
        }
    }

    pub fn invalid_frame(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            line,
            message: message.into(),
        }
    }
}

/// 打开失败即 "源不可用"，其余为记录解析错误
impl From<IngestionError> for ContractError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Open { path, message } => {
                ContractError::source_unavailable(path, message)
            }
            other => ContractError::payload_parse("replay", other.to_string()),
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
