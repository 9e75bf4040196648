//! SQLx SQLite 连接池初始化、内嵌迁移与健康检查
//!
//! 用法：
//! let pool = init_pool(&config.storage).await?;
//! health_check(&pool).await?;

use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{config::StorageConfig, error::Result};

pub type SqlitePool = sqlx::Pool<sqlx::Sqlite>;

/// 初始化连接池并执行迁移
pub async fn init_pool(config: &StorageConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    // 内存库每个连接独立，只能用单连接
    let max_conns = if config.database_url.contains(":memory:") {
        1
    } else {
        config.max_connections.max(1)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_conns)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to open wallet database");
            e
        })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    tracing::info!(max_connections = max_conns, "wallet database ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn health_check(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_migrates() {
        let pool = init_pool(&StorageConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 8,
        })
        .await
        .unwrap();

        let (n,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('wallets', 'accounts', 'transactions')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn test_file_pool_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("wallet.db").display());
        let config = StorageConfig {
            database_url: url,
            max_connections: 2,
        };

        let pool = init_pool(&config).await.unwrap();
        pool.close().await;

        // 迁移幂等
        let pool = init_pool(&config).await.unwrap();
        health_check(&pool).await.unwrap();
    }
}
