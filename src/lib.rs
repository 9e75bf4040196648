//! hdcore - 自托管 HD 钱包核心
//!
//! 助记词 → BIP32 根密钥（口令加密落盘）→ 按币种的地址池 → 交易签名与广播。
//! 根密钥与私钥只在单次操作内存在，用完即清零，从不记录日志。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{ErrorCategory, Result, WalletError};
pub use infrastructure::call_context::{CallContext, CancelHandle};
pub use service::wallet_service::{WalletPhase, WalletService};

pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{DerivationPath, HdKey, TransactionStatus},
        error::{ErrorCategory, Result, WalletError},
        infrastructure::call_context::{CallContext, CancelHandle},
        repository::TransactionRecord,
        service::{WalletPhase, WalletService},
    };
}
