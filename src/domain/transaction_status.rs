//! 交易记录状态
//!
//! 只依据提交时节点返回的哈希推断：全零哈希记为 `PENDING`，否则 `COMPLETED`。
//! 这不是链上确认（没有回执轮询），`COMPLETED` 不代表已打包。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// 节点回显全零哈希
    Pending,
    /// 节点返回了真实哈希
    Completed,
}

impl TransactionStatus {
    /// 根据 `eth_sendRawTransaction` 返回的哈希判定状态
    pub fn from_submitted_hash(tx_hash: &str) -> Self {
        let digits = tx_hash
            .strip_prefix("0x")
            .or_else(|| tx_hash.strip_prefix("0X"))
            .unwrap_or(tx_hash);
        if !digits.is_empty() && digits.bytes().all(|b| b == b'0') {
            Self::Pending
        } else {
            Self::Completed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Pending => "交易待确认",
            Self::Completed => "交易已提交",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(WalletError::Corrupt(format!(
                "unknown transaction status '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash_is_pending() {
        let zero = format!("0x{}", "0".repeat(64));
        assert_eq!(
            TransactionStatus::from_submitted_hash(&zero),
            TransactionStatus::Pending
        );
        assert_eq!(
            TransactionStatus::from_submitted_hash(
                "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"
            ),
            TransactionStatus::Completed
        );
    }

    #[test]
    fn test_string_roundtrip() {
        for status in [TransactionStatus::Pending, TransactionStatus::Completed] {
            assert_eq!(status.as_str().parse::<TransactionStatus>().unwrap(), status);
        }
        assert!("MINED".parse::<TransactionStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
    }
}
