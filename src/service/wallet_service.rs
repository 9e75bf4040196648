//! 钱包编排服务
//!
//! 状态机：`Uninitialized` → `Created`（根密钥已加密落盘）→ `Initialized`（地址池就绪）。
//!
//! 根密钥只在单次操作内解密：每次签名都从存储读取密文、用口令解密、
//! 派生出账户私钥后立即丢弃，不在内存中缓存明文。

use std::{collections::BTreeMap, sync::Arc};

use chrono::{SubsecRound, Utc};
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::{
    config::Config,
    domain::{chain_config, derivation::HdKey, mnemonic, TransactionStatus},
    error::{Result, WalletError},
    infrastructure::{call_context::CallContext, db, db::SqlitePool, encryption::Vault},
    repository::{
        account_repository::{AccountRepository, SqliteAccountRepository},
        transaction_repository::{
            SqliteTransactionRepository, TransactionFilter, TransactionRecord,
            TransactionRepository,
        },
        wallet_repository::{SqliteWalletRepository, WalletRecord, WalletRepository},
    },
    service::{
        account::Account, account_registry::AccountRegistry, blockchain_client::BlockchainClient,
        units,
    },
    utils::address_validator::AddressValidator,
};

/// 新钱包助记词熵长度（12 词）
const MNEMONIC_ENTROPY_BITS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletPhase {
    Uninitialized,
    Created,
    Initialized,
}

#[derive(Default)]
struct Session {
    /// 当前钱包的 xpub
    public_key: Option<String>,
    registries: BTreeMap<&'static str, Arc<AccountRegistry>>,
}

pub struct WalletService {
    config: Config,
    pool: SqlitePool,
    vault: Vault,
    wallets: Arc<dyn WalletRepository>,
    accounts: Arc<dyn AccountRepository>,
    transactions: Arc<dyn TransactionRepository>,
    client: RwLock<Arc<BlockchainClient>>,
    session: RwLock<Session>,
    /// 钱包记录的读写互斥：restore/create 与签名读取串行化
    record_lock: RwLock<()>,
}

impl WalletService {
    /// 按配置打开存储并构建服务
    pub async fn connect(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| WalletError::Config(format!("{:#}", e)))?;
        let pool = db::init_pool(&config.storage).await?;
        Self::new(pool, config)
    }

    pub fn new(pool: SqlitePool, config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| WalletError::Config(format!("{:#}", e)))?;
        let vault = Vault::new(&config.vault)?;
        let client = Self::client_for(&config, None)?;

        Ok(Self {
            wallets: Arc::new(SqliteWalletRepository::new(pool.clone())),
            accounts: Arc::new(SqliteAccountRepository::new(pool.clone())),
            transactions: Arc::new(SqliteTransactionRepository::new(pool.clone())),
            client: RwLock::new(Arc::new(client)),
            session: RwLock::new(Session::default()),
            record_lock: RwLock::new(()),
            config,
            pool,
            vault,
        })
    }

    fn client_for(config: &Config, url: Option<&str>) -> Result<BlockchainClient> {
        let url = match url {
            Some(url) => url,
            None => config
                .network
                .rpc_url()
                .ok_or_else(|| WalletError::UnknownNetwork(config.network.active.clone()))?,
        };
        BlockchainClient::new(url, config.timeouts.connect_timeout())
    }

    /// 按配置的超时创建调用上下文
    pub fn context(&self) -> CallContext {
        CallContext::with_timeout(self.config.timeouts.call_timeout())
    }

    pub async fn phase(&self) -> WalletPhase {
        let session = self.session.read().await;
        match (&session.public_key, session.registries.is_empty()) {
            (None, _) => WalletPhase::Uninitialized,
            (Some(_), true) => WalletPhase::Created,
            (Some(_), false) => WalletPhase::Initialized,
        }
    }

    /// 当前钱包公开标识（xpub）
    pub async fn public_key(&self) -> Option<String> {
        self.session.read().await.public_key.clone()
    }

    // ============ 创建 / 恢复 / 打开 ============

    /// 创建新钱包，返回助记词（只返回这一次）
    pub async fn create(&self, ctx: &CallContext, password: &str) -> Result<Zeroizing<String>> {
        let phrase = mnemonic::generate(MNEMONIC_ENTROPY_BITS)?;
        let public_key = self.persist_root(ctx, password, &phrase).await?;
        tracing::info!(wallet = %public_key, "wallet created");
        Ok(phrase)
    }

    /// 用助记词恢复钱包，可设置新口令；覆盖已有记录
    pub async fn restore(&self, ctx: &CallContext, password: &str, phrase: &str) -> Result<()> {
        if !mnemonic::validate(phrase) {
            return Err(WalletError::InvalidMnemonic);
        }
        let public_key = self.persist_root(ctx, password, phrase).await?;
        tracing::info!(wallet = %public_key, "wallet restored");
        Ok(())
    }

    async fn persist_root(&self, ctx: &CallContext, password: &str, phrase: &str) -> Result<String> {
        let seed = mnemonic::to_seed(phrase, "")?;
        let root = HdKey::master_from_seed(&seed[..])?;
        let public_key = root.to_xpub();
        let encrypted_root_key = self.vault.encrypt(password, root.to_xprv().as_bytes())?;
        drop(root);

        let record = WalletRecord {
            public_key: public_key.clone(),
            encrypted_root_key,
            created_at: Utc::now(),
        };

        let _guard = self.record_lock.write().await;
        let changed = ctx
            .run("wallets.replace", self.wallets.replace(&record))
            .await?;

        let mut session = self.session.write().await;
        session.public_key = Some(public_key.clone());
        session.registries.clear();
        if changed {
            tracing::debug!(wallet = %public_key, "wallet identity changed, account pools cleared");
        }

        Ok(public_key)
    }

    /// 打开已存在的钱包（无需口令）
    pub async fn open(&self, ctx: &CallContext) -> Result<String> {
        let record = {
            let _guard = self.record_lock.read().await;
            ctx.run("wallets.find", self.wallets.find()).await?
        }
        .ok_or_else(|| WalletError::NotFound("wallet".into()))?;

        let mut session = self.session.write().await;
        if session.public_key.as_deref() != Some(record.public_key.as_str()) {
            session.registries.clear();
        }
        session.public_key = Some(record.public_key.clone());

        tracing::info!(wallet = %record.public_key, "wallet opened");
        Ok(record.public_key)
    }

    pub async fn wallet_exists(&self, ctx: &CallContext) -> Result<bool> {
        ctx.run("wallets.exists", self.wallets.exists()).await
    }

    /// 校验口令；错误口令返回 [`WalletError::Decryption`]
    pub async fn validate_password(&self, ctx: &CallContext, password: &str) -> Result<()> {
        self.unseal_root(ctx, password).await.map(drop)
    }

    /// 读取并解密根密钥
    async fn unseal_root(&self, ctx: &CallContext, password: &str) -> Result<HdKey> {
        let _guard = self.record_lock.read().await;
        self.unseal_root_locked(ctx, password).await
    }

    /// 调用方须持有 `record_lock`
    async fn unseal_root_locked(&self, ctx: &CallContext, password: &str) -> Result<HdKey> {
        let record = ctx
            .run("wallets.find", self.wallets.find())
            .await?
            .ok_or_else(|| WalletError::WalletState("no wallet has been created".into()))?;

        let plaintext = self.vault.decrypt(password, &record.encrypted_root_key)?;
        let encoded = std::str::from_utf8(&plaintext)
            .map_err(|_| WalletError::Corrupt("root key is not valid text".into()))?;
        let root = HdKey::from_xprv(encoded)?;

        if root.to_xpub() != record.public_key {
            return Err(WalletError::Corrupt(
                "root key does not match wallet identifier".into(),
            ));
        }
        Ok(root)
    }

    // ============ 地址池 ============

    /// 为每个币种确保地址池存在
    pub async fn initialize(&self, ctx: &CallContext, tokens: &[&str], password: &str) -> Result<()> {
        if self.session.read().await.public_key.is_none() {
            return Err(WalletError::WalletState(
                "create, restore or open a wallet first".into(),
            ));
        }

        let specs = tokens
            .iter()
            .map(|t| chain_config::lookup(t))
            .collect::<Result<Vec<_>>>()?;

        // 地址池写入与 restore/create 互斥，直到会话更新完成
        let _guard = self.record_lock.read().await;
        let root = self.unseal_root_locked(ctx, password).await?;
        let public_key = root.to_xpub();

        let mut ready = Vec::with_capacity(specs.len());
        for spec in specs {
            let registry =
                AccountRegistry::new(spec, self.config.accounts.pool_size, self.accounts.clone());
            registry.ensure_pool(ctx, &root).await?;
            ready.push(Arc::new(registry));
        }
        drop(root);

        let mut session = self.session.write().await;
        if session.public_key.as_deref() != Some(public_key.as_str()) {
            return Err(WalletError::WalletState(
                "stored wallet differs from the open one, open it again".into(),
            ));
        }
        for registry in ready {
            session
                .registries
                .insert(registry.currency().symbol, registry);
        }

        tracing::info!(tokens = ?tokens, "accounts initialized");
        Ok(())
    }

    async fn registry(&self, token: &str) -> Result<Arc<AccountRegistry>> {
        let spec = chain_config::lookup(token)?;
        self.session
            .read()
            .await
            .registries
            .get(spec.symbol)
            .cloned()
            .ok_or_else(|| {
                WalletError::WalletState(format!("accounts for {} not initialized", spec.symbol))
            })
    }

    async fn account(&self, ctx: &CallContext, token: &str, index: u32) -> Result<Account> {
        self.registry(token).await?.account(ctx, index).await
    }

    /// 索引 → 地址
    pub async fn accounts(&self, ctx: &CallContext, token: &str) -> Result<BTreeMap<u32, String>> {
        self.registry(token).await?.all_addresses(ctx).await
    }

    pub async fn address(&self, ctx: &CallContext, token: &str, index: u32) -> Result<String> {
        self.registry(token).await?.address_at(ctx, index).await
    }

    // ============ 链上操作 ============

    async fn client(&self) -> Arc<BlockchainClient> {
        self.client.read().await.clone()
    }

    /// 余额（人类可读单位）
    pub async fn get_balance(&self, ctx: &CallContext, token: &str, index: u32) -> Result<String> {
        let account = self.account(ctx, token, index).await?;
        let wei = account.retrieve_balance(ctx, &*self.client().await).await?;
        Ok(units::wei_to_ether(wei))
    }

    /// 手续费估算（人类可读单位，18 位小数）
    pub async fn estimate_gas(
        &self,
        ctx: &CallContext,
        token: &str,
        to: &str,
        value: &str,
        index: u32,
    ) -> Result<String> {
        let account = self.account(ctx, token, index).await?;
        let wei = units::ether_to_wei(value)?;
        let estimate = account
            .estimate_gas(ctx, &*self.client().await, to, wei)
            .await?;
        estimate.fee_in_ether()
    }

    /// 签名并广播交易
    ///
    /// 口令解密在任何网络调用之前完成；只有节点返回哈希后才写历史记录。
    pub async fn send_transaction(
        &self,
        ctx: &CallContext,
        token: &str,
        password: &str,
        to: &str,
        value: &str,
        index: u32,
    ) -> Result<TransactionRecord> {
        let account = self.account(ctx, token, index).await?;
        if !AddressValidator::validate(to, account.currency()) {
            return Err(WalletError::InvalidAddress(to.to_string()));
        }
        let wei = units::ether_to_wei(value)?;
        let coin_type = chain_config::coin_type(account.currency())?;

        let key = {
            let root = self.unseal_root(ctx, password).await?;
            root.derive_account_key(coin_type, index)?
        };

        let submission = account
            .send_transaction(ctx, &*self.client().await, &key, to, wei)
            .await?;
        drop(key);

        let record = TransactionRecord {
            status: TransactionStatus::from_submitted_hash(&submission.tx_hash),
            tx_hash: submission.tx_hash,
            sender: account.address().to_string(),
            recipient: to.to_string(),
            value: units::wei_to_ether(wei),
            token: account.currency().to_string(),
            // 与存储精度（微秒）一致
            created_at: Utc::now().trunc_subsecs(6),
        };

        if let Err(e) = ctx
            .run("transactions.insert", self.transactions.insert(&record))
            .await
        {
            tracing::error!(tx_hash = %record.tx_hash, error = %e, "transaction submitted but not recorded");
            return Err(e);
        }

        tracing::info!(
            tx_hash = %record.tx_hash,
            token = %record.token,
            status = %record.status,
            "transaction recorded"
        );
        Ok(record)
    }

    /// 交易历史，最新的在前
    pub async fn transaction_history(&self, ctx: &CallContext) -> Result<Vec<TransactionRecord>> {
        ctx.run(
            "transactions.list",
            self.transactions.list(&TransactionFilter::default()),
        )
        .await
    }

    pub async fn transaction_history_for(
        &self,
        ctx: &CallContext,
        token: &str,
    ) -> Result<Vec<TransactionRecord>> {
        let spec = chain_config::lookup(token)?;
        let filter = TransactionFilter {
            token: Some(spec.symbol.to_string()),
            limit: None,
        };
        ctx.run("transactions.list", self.transactions.list(&filter))
            .await
    }

    // ============ 校验 / 节点 ============

    pub fn validate_mnemonic(&self, phrase: &str) -> bool {
        mnemonic::validate(phrase)
    }

    pub fn validate_address(&self, address: &str, token: &str) -> bool {
        AddressValidator::validate(address, token)
    }

    /// 切换到配置中的另一个命名节点
    pub async fn change_network(&self, name: &str) -> Result<()> {
        let url = self
            .config
            .network
            .providers
            .get(name)
            .ok_or_else(|| WalletError::UnknownNetwork(name.to_string()))?;
        self.swap_client(url).await?;
        tracing::info!(network = %name, url = %url, "network changed");
        Ok(())
    }

    /// 直接指定 RPC URL
    pub async fn set_rpc_url(&self, url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(WalletError::Config(format!(
                "RPC URL must be http(s): {}",
                url
            )));
        }
        self.swap_client(url).await?;
        tracing::info!(url = %url, "rpc url changed");
        Ok(())
    }

    async fn swap_client(&self, url: &str) -> Result<()> {
        let client = Self::client_for(&self.config, Some(url))?;
        *self.client.write().await = Arc::new(client);
        Ok(())
    }

    pub async fn rpc_url(&self) -> String {
        self.client().await.rpc_url().to_string()
    }

    pub async fn node_listening(&self, ctx: &CallContext) -> bool {
        self.client().await.is_node_listening(ctx).await
    }

    /// 关闭存储连接
    pub async fn close(self) {
        self.pool.close().await;
        tracing::debug!("wallet storage closed");
    }
}
