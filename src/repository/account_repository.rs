// 地址池数据访问 Repository

use async_trait::async_trait;
use serde::Serialize;

use crate::{error::Result, infrastructure::db::SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRecord {
    pub currency: String,
    pub index: u32,
    pub address: String,
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn count(&self, currency: &str) -> Result<u32>;

    async fn find_address(&self, currency: &str, index: u32) -> Result<Option<String>>;

    /// 按索引升序
    async fn list(&self, currency: &str) -> Result<Vec<AccountRecord>>;

    /// 在一个事务里删除该币种全部地址并写入新池
    async fn replace_pool(&self, currency: &str, accounts: &[AccountRecord]) -> Result<()>;
}

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn count(&self, currency: &str) -> Result<u32> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE currency = ?")
            .bind(currency)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as u32)
    }

    async fn find_address(&self, currency: &str, index: u32) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT address FROM accounts WHERE currency = ? AND account_index = ?",
        )
        .bind(currency)
        .bind(i64::from(index))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(address,)| address))
    }

    async fn list(&self, currency: &str) -> Result<Vec<AccountRecord>> {
        let rows = sqlx::query_as::<_, (String, i64, String)>(
            "SELECT currency, account_index, address FROM accounts
             WHERE currency = ? ORDER BY account_index ASC",
        )
        .bind(currency)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(currency, index, address)| AccountRecord {
                currency,
                index: index as u32,
                address,
            })
            .collect())
    }

    async fn replace_pool(&self, currency: &str, accounts: &[AccountRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM accounts WHERE currency = ?")
            .bind(currency)
            .execute(&mut *tx)
            .await?;

        for account in accounts {
            sqlx::query(
                "INSERT INTO accounts (currency, account_index, address) VALUES (?, ?, ?)",
            )
            .bind(currency)
            .bind(i64::from(account.index))
            .bind(&account.address)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
