// 交易历史数据访问 Repository

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::{
    domain::TransactionStatus,
    error::Result,
    infrastructure::db::SqlitePool,
    repository::wallet_repository::parse_timestamp,
};

// ============ 领域模型 ============

/// 交易历史记录（仅在节点返回哈希后写入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub tx_hash: String,
    pub sender: String,
    pub recipient: String,
    /// 人类可读单位（ETH）的十进制字符串
    pub value: String,
    pub status: TransactionStatus,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub token: Option<String>,
    pub limit: Option<u32>,
}

// ============ Repository Trait ============

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, record: &TransactionRecord) -> Result<i64>;

    /// 最新的在前
    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>>;
}

// ============ SQLite 实现 ============

pub struct SqliteTransactionRepository {
    pool: SqlitePool,
}

impl SqliteTransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for SqliteTransactionRepository {
    async fn insert(&self, record: &TransactionRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO transactions (tx_hash, sender, recipient, value, status, token, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.tx_hash)
        .bind(&record.sender)
        .bind(&record.recipient)
        .bind(&record.value)
        .bind(record.status.as_str())
        .bind(&record.token)
        // 固定宽度，按字符串排序即按时间排序
        .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let rows = sqlx::query_as::<_, (String, String, String, String, String, String, String)>(
            "SELECT tx_hash, sender, recipient, value, status, token, created_at
             FROM transactions
             WHERE (?1 IS NULL OR token = ?1)
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )
        .bind(filter.token.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(tx_hash, sender, recipient, value, status, token, created_at)| {
                    Ok(TransactionRecord {
                        tx_hash,
                        sender,
                        recipient,
                        value,
                        status: status.parse()?,
                        token,
                        created_at: parse_timestamp(&created_at)?,
                    })
                },
            )
            .collect()
    }
}
