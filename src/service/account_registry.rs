//! 单币种地址池
//!
//! 首次初始化时派生 `m/44'/<coin>'/0'/0/0..N` 共 N 个地址并整体落盘；
//! 之后只读存储。池不完整（数量不符）时整池重新派生并原子替换。

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    domain::{chain_config::CurrencySpec, derivation::HdKey, derivation_path::DerivationPath},
    error::{Result, WalletError},
    infrastructure::call_context::CallContext,
    repository::account_repository::{AccountRecord, AccountRepository},
    service::account::Account,
};

pub struct AccountRegistry {
    spec: &'static CurrencySpec,
    pool_size: u32,
    repo: Arc<dyn AccountRepository>,
}

impl AccountRegistry {
    pub fn new(
        spec: &'static CurrencySpec,
        pool_size: Option<u32>,
        repo: Arc<dyn AccountRepository>,
    ) -> Self {
        Self {
            spec,
            pool_size: pool_size.unwrap_or(spec.pool_size),
            repo,
        }
    }

    pub fn currency(&self) -> &'static CurrencySpec {
        self.spec
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size
    }

    /// 由根密钥派生完整地址池（不落盘）
    pub fn derive_pool(&self, root: &HdKey) -> Result<Vec<AccountRecord>> {
        // 公共前缀 m/44'/<coin>'/0'/0 只派生一次
        let external: DerivationPath =
            format!("m/44'/{}'/0'/0", self.spec.coin_type).parse()?;
        let branch = root.derive_path(&external)?;

        (0..self.pool_size)
            .map(|index| {
                let child = branch.derive_child(index, false)?;
                Ok(AccountRecord {
                    currency: self.spec.symbol.to_string(),
                    index,
                    address: self.spec.address_codec.encode(&child.verifying_key()),
                })
            })
            .collect()
    }

    /// 确保地址池存在；返回 `true` 表示本次重新派生并写入
    pub async fn ensure_pool(&self, ctx: &CallContext, root: &HdKey) -> Result<bool> {
        let symbol = self.spec.symbol;
        let existing = ctx.run("accounts.count", self.repo.count(symbol)).await?;
        if existing == self.pool_size {
            tracing::debug!(token = %symbol, count = existing, "account pool already present");
            return Ok(false);
        }
        if existing != 0 {
            tracing::warn!(
                token = %symbol,
                found = existing,
                expected = self.pool_size,
                "incomplete account pool, re-deriving"
            );
        }

        let accounts = self.derive_pool(root)?;
        ctx.run("accounts.replace_pool", self.repo.replace_pool(symbol, &accounts))
            .await?;

        tracing::info!(token = %symbol, count = accounts.len(), "account pool derived");
        Ok(true)
    }

    pub async fn address_at(&self, ctx: &CallContext, index: u32) -> Result<String> {
        let symbol = self.spec.symbol;
        ctx.run("accounts.find_address", self.repo.find_address(symbol, index))
            .await?
            .ok_or_else(|| WalletError::UnknownAccount {
                token: symbol.to_string(),
                index,
            })
    }

    pub async fn all_addresses(&self, ctx: &CallContext) -> Result<BTreeMap<u32, String>> {
        let records = ctx
            .run("accounts.list", self.repo.list(self.spec.symbol))
            .await?;
        Ok(records.into_iter().map(|r| (r.index, r.address)).collect())
    }

    pub async fn account(&self, ctx: &CallContext, index: u32) -> Result<Account> {
        let address = self.address_at(ctx, index).await?;
        Account::new(self.spec.symbol, index, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StorageConfig,
        domain::{chain_config, mnemonic},
        infrastructure::db,
        repository::account_repository::SqliteAccountRepository,
    };

    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    fn root() -> HdKey {
        let seed = mnemonic::to_seed(TEST_MNEMONIC, "").unwrap();
        HdKey::master_from_seed(&seed[..]).unwrap()
    }

    async fn registry(pool_size: u32) -> (AccountRegistry, Arc<SqliteAccountRepository>) {
        let pool = db::init_pool(&StorageConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
        })
        .await
        .unwrap();
        let repo = Arc::new(SqliteAccountRepository::new(pool));
        let eth = chain_config::lookup("ETH").unwrap();
        (AccountRegistry::new(eth, Some(pool_size), repo.clone()), repo)
    }

    #[test]
    fn test_default_pool_size_from_currency() {
        let eth = chain_config::lookup("ETH").unwrap();
        let repo: Arc<dyn AccountRepository> = Arc::new(NoopRepo);
        assert_eq!(AccountRegistry::new(eth, None, repo).pool_size(), 21);
    }

    #[tokio::test]
    async fn test_derive_pool_matches_per_account_path() {
        let (registry, _) = registry(5).await;
        let root = root();
        let pool = registry.derive_pool(&root).unwrap();
        assert_eq!(pool.len(), 5);
        assert_eq!(pool[0].address, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(pool[4].address, "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65");
        for record in &pool {
            let key = root.derive_account_key(60, record.index).unwrap();
            assert_eq!(
                record.address,
                chain_config::AddressCodec::Eip55Hex.encode(&key.verifying_key())
            );
        }
    }

    #[tokio::test]
    async fn test_ensure_pool_is_idempotent() {
        let (registry, _) = registry(4).await;
        let ctx = CallContext::default();
        let root = root();

        assert!(registry.ensure_pool(&ctx, &root).await.unwrap());
        let first = registry.all_addresses(&ctx).await.unwrap();
        assert!(!registry.ensure_pool(&ctx, &root).await.unwrap());
        let second = registry.all_addresses(&ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert_eq!(
            registry.address_at(&ctx, 1).await.unwrap(),
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        );
    }

    #[tokio::test]
    async fn test_partial_pool_is_rederived() {
        let (registry, repo) = registry(3).await;
        let ctx = CallContext::default();
        repo.replace_pool(
            "ETH",
            &[AccountRecord {
                currency: "ETH".into(),
                index: 0,
                address: "0xdeadbeef".into(),
            }],
        )
        .await
        .unwrap();

        assert!(registry.ensure_pool(&ctx, &root()).await.unwrap());
        let addresses = registry.all_addresses(&ctx).await.unwrap();
        assert_eq!(addresses.len(), 3);
        assert_eq!(addresses[&0], "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    }

    #[tokio::test]
    async fn test_unknown_index() {
        let (registry, _) = registry(2).await;
        let ctx = CallContext::default();
        registry.ensure_pool(&ctx, &root()).await.unwrap();

        let err = registry.account(&ctx, 2).await.unwrap_err();
        assert!(matches!(err, WalletError::UnknownAccount { index: 2, .. }));
        let account = registry.account(&ctx, 1).await.unwrap();
        assert_eq!(account.index(), 1);
    }

    struct NoopRepo;

    #[async_trait::async_trait]
    impl AccountRepository for NoopRepo {
        async fn count(&self, _: &str) -> Result<u32> {
            Ok(0)
        }
        async fn find_address(&self, _: &str, _: u32) -> Result<Option<String>> {
            Ok(None)
        }
        async fn list(&self, _: &str) -> Result<Vec<AccountRecord>> {
            Ok(Vec::new())
        }
        async fn replace_pool(&self, _: &str, _: &[AccountRecord]) -> Result<()> {
            Ok(())
        }
    }
}
