//! Domain 模块
//!
//! 助记词、密钥派生、币种能力表等与网络和存储无关的核心逻辑

pub mod chain_config;
pub mod derivation;
pub mod derivation_path;
pub mod mnemonic;
pub mod transaction_status;

// 重新导出常用类型
pub use chain_config::{AddressCodec, CurrencySpec, CURRENCIES};
pub use derivation::HdKey;
pub use derivation_path::{DerivationPath, HARDENED_OFFSET};
pub use transaction_status::TransactionStatus;
