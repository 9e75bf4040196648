//! 统一错误类型
//!
//! 所有对外操作返回 [`WalletError`]，调用方（GUI/CLI 外壳）按 [`ErrorCategory`] 决定展示方式，
//! 按 [`WalletError::code`] 做稳定匹配。

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum WalletError {
    // 输入错误
    #[error("invalid mnemonic phrase")]
    InvalidMnemonic,
    #[error("unsupported entropy length: {0} bits")]
    InvalidEntropyLength(usize),
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("unsupported token: {0}")]
    UnsupportedToken(String),
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error("no account {index} for {token}")]
    UnknownAccount { token: String, index: u32 },
    #[error("wallet not ready: {0}")]
    WalletState(String),

    // 密码学错误
    #[error("random source failure: {0}")]
    Entropy(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("decryption failed (wrong password or corrupt data)")]
    Decryption,
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("transaction encoding failed: {0}")]
    Encoding(String),

    // 网络 / 协议
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    // 超时 / 取消
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("operation cancelled")]
    Cancelled,

    // 存储
    #[error("not found: {0}")]
    NotFound(String),
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// 错误大类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Input,
    Crypto,
    Transport,
    Protocol,
    Timeout,
    Storage,
    Internal,
}

/// 序列化给外壳的错误体
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'static str,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'a str>,
}

impl WalletError {
    pub fn category(&self) -> ErrorCategory {
        use WalletError::*;
        match self {
            InvalidMnemonic
            | InvalidEntropyLength(_)
            | InvalidPath(_)
            | InvalidAddress(_)
            | InvalidAmount(_)
            | UnsupportedToken(_)
            | UnknownNetwork(_)
            | UnknownAccount { .. }
            | WalletState(_) => ErrorCategory::Input,
            Entropy(_) | KeyDerivation(_) | Decryption | Encryption(_) | Signing(_)
            | Encoding(_) => ErrorCategory::Crypto,
            Transport(_) => ErrorCategory::Transport,
            Protocol(_) | Rpc { .. } => ErrorCategory::Protocol,
            Timeout(_) | Cancelled => ErrorCategory::Timeout,
            NotFound(_) | Corrupt(_) | Storage(_) => ErrorCategory::Storage,
            Config(_) => ErrorCategory::Internal,
        }
    }

    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        use WalletError::*;
        match self {
            InvalidMnemonic => "invalid_mnemonic",
            InvalidEntropyLength(_) => "invalid_entropy_length",
            InvalidPath(_) => "invalid_path",
            InvalidAddress(_) => "invalid_address",
            InvalidAmount(_) => "invalid_amount",
            UnsupportedToken(_) => "unsupported_token",
            UnknownNetwork(_) => "unknown_network",
            UnknownAccount { .. } => "unknown_account",
            WalletState(_) => "wallet_not_ready",
            Entropy(_) => "entropy_failed",
            KeyDerivation(_) => "key_derivation_failed",
            Decryption => "decryption_failed",
            Encryption(_) => "encryption_failed",
            Signing(_) => "signing_failed",
            Encoding(_) => "encoding_failed",
            Transport(_) => "transport_error",
            Protocol(_) => "protocol_error",
            Rpc { .. } => "rpc_error",
            Timeout(_) => "timeout",
            Cancelled => "cancelled",
            NotFound(_) => "not_found",
            Corrupt(_) => "corrupt_data",
            Storage(_) => "storage_error",
            Config(_) => "config_error",
        }
    }

    /// 面向用户的提示（不含内部细节）
    pub fn user_message(&self) -> String {
        match self {
            WalletError::Decryption => "密码错误".to_string(),
            WalletError::Signing(_) => "交易签名失败".to_string(),
            WalletError::Timeout(_) => "请求超时，请检查网络连接后重试".to_string(),
            WalletError::Transport(_) => "网络错误，请检查节点连接后重试".to_string(),
            WalletError::Protocol(_) | WalletError::Rpc { .. } => {
                "区块链节点返回异常，请稍后重试".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody<'_> {
        let detail = match self {
            WalletError::Rpc { message, .. } => Some(message.as_str()),
            _ => None,
        };
        ErrorBody {
            code: self.code(),
            category: self.category(),
            message: self.user_message(),
            detail,
        }
    }

    pub fn is_crypto(&self) -> bool {
        self.category() == ErrorCategory::Crypto
    }
}

// 从 SQLx 错误转换
impl From<sqlx::Error> for WalletError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".into()),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Corrupt(format!("column {}: {}", index, source))
            }
            sqlx::Error::Decode(e) => Self::Corrupt(e.to_string()),
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for WalletError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Storage(format!("migration failed: {}", err))
    }
}

// 从 reqwest 错误转换
impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("malformed JSON: {}", err))
    }
}
