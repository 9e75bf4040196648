pub mod account;
pub mod account_registry;
pub mod blockchain_client; // JSON-RPC 节点客户端
pub mod transaction_builder; // EIP-155 编码与签名
pub mod units;
pub mod wallet_service;

pub use account::{Account, EthAccount, GasEstimate, Submission};
pub use account_registry::AccountRegistry;
pub use blockchain_client::BlockchainClient;
pub use transaction_builder::{SignedTransaction, UnsignedTransaction};
pub use wallet_service::{WalletPhase, WalletService};
