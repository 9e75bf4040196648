// 钱包记录数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{Result, WalletError},
    infrastructure::db::SqlitePool,
};

// ============ 领域模型 ============

/// 钱包记录：公开标识（xpub）→ 口令加密的根私钥
#[derive(Clone)]
pub struct WalletRecord {
    pub public_key: String,
    pub encrypted_root_key: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRecord")
            .field("public_key", &self.public_key)
            .field("encrypted_root_key", &format_args!("<{} bytes>", self.encrypted_root_key.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WalletError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

// ============ Repository Trait ============

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// 当前钱包（存储中至多一条）
    async fn find(&self) -> Result<Option<WalletRecord>>;

    async fn exists(&self) -> Result<bool>;

    /// 覆盖写入钱包记录
    ///
    /// 与旧记录公钥不同时同时清空地址池，返回 `true` 表示钱包身份已更换。
    async fn replace(&self, record: &WalletRecord) -> Result<bool>;
}

// ============ SQLite 实现 ============

pub struct SqliteWalletRepository {
    pool: SqlitePool,
}

impl SqliteWalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WalletRepository for SqliteWalletRepository {
    async fn find(&self) -> Result<Option<WalletRecord>> {
        let row = sqlx::query_as::<_, (String, Vec<u8>, String)>(
            "SELECT public_key, encrypted_root_key, created_at FROM wallets LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(public_key, encrypted_root_key, created_at)| {
            Ok(WalletRecord {
                public_key,
                encrypted_root_key,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    async fn exists(&self) -> Result<bool> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallets")
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    async fn replace(&self, record: &WalletRecord) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<(String,)> = sqlx::query_as("SELECT public_key FROM wallets LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM wallets").execute(&mut *tx).await?;
        sqlx::query(
            "INSERT INTO wallets (public_key, encrypted_root_key, created_at) VALUES (?, ?, ?)",
        )
        .bind(&record.public_key)
        .bind(&record.encrypted_root_key)
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let changed = previous
            .map(|(pk,)| pk != record.public_key)
            .unwrap_or(true);
        if changed {
            // 旧钱包派生的地址池作废
            sqlx::query("DELETE FROM accounts").execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(changed)
    }
}
