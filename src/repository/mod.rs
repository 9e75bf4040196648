// Repository 抽象层：trait + SQLite 实现

pub mod account_repository;
pub mod transaction_repository;
pub mod wallet_repository;

pub use account_repository::{AccountRecord, AccountRepository, SqliteAccountRepository};
pub use transaction_repository::{
    SqliteTransactionRepository, TransactionFilter, TransactionRecord, TransactionRepository,
};
pub use wallet_repository::{SqliteWalletRepository, WalletRecord, WalletRepository};
