//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 默认节点名称
pub const DEFAULT_NETWORK: &str = "hardhat";

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 本地存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
}

/// 节点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// 当前选中的节点名
    pub active: String,
    /// 节点名 → RPC URL
    pub providers: BTreeMap<String, String>,
    /// 覆盖 `active` 对应的 URL
    #[serde(default)]
    pub rpc_url: Option<String>,
}

/// 账户池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// 覆盖币种默认的地址池大小
    #[serde(default)]
    pub pool_size: Option<u32>,
}

/// 超时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub call_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Argon2id 参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("WALLET_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://wallet.db?mode=rwc".into()),
            max_connections: env_parse("WALLET_DB_MAX_CONNS").unwrap_or(4),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert(DEFAULT_NETWORK.to_string(), "http://localhost:8545".to_string());
        Self {
            active: std::env::var("WALLET_NETWORK").unwrap_or_else(|_| DEFAULT_NETWORK.into()),
            providers,
            rpc_url: std::env::var("WALLET_RPC_URL").ok(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            pool_size: env_parse("WALLET_POOL_SIZE"),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: env_parse("WALLET_TIMEOUT_SECS").unwrap_or(5),
            connect_timeout_secs: env_parse("WALLET_CONNECT_TIMEOUT_SECS").unwrap_or(3),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        // 约 64 MiB / 3 轮，普通桌面机器上 ~0.3s
        Self {
            memory_kib: env_parse("WALLET_KDF_MEMORY_KIB").unwrap_or(64 * 1024),
            iterations: env_parse("WALLET_KDF_ITERATIONS").unwrap_or(3),
            parallelism: env_parse("WALLET_KDF_PARALLELISM").unwrap_or(1),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl NetworkConfig {
    /// 当前生效的 RPC URL
    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_url
            .as_deref()
            .or_else(|| self.providers.get(&self.active).map(String::as_str))
    }
}

impl TimeoutConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl VaultConfig {
    /// 测试用低成本参数
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Config {
    /// 从环境变量加载配置（先读取 .env）
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Ok(Self::default())
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.storage.database_url.starts_with("sqlite:") {
            anyhow::bail!("WALLET_DATABASE_URL must start with sqlite:");
        }

        let url = self
            .network
            .rpc_url()
            .with_context(|| format!("No RPC URL for network '{}'", self.network.active))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("RPC URL must start with http:// or https://");
        }

        if let Some(size) = self.accounts.pool_size {
            if !(1..=1000).contains(&size) {
                anyhow::bail!("WALLET_POOL_SIZE must be within 1..=1000");
            }
        }

        if self.timeouts.call_timeout_secs == 0 {
            anyhow::bail!("WALLET_TIMEOUT_SECS must be positive");
        }

        if self.vault.memory_kib < 8 * self.vault.parallelism || self.vault.iterations == 0 {
            anyhow::bail!("Argon2 parameters out of range");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
