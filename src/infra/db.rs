use crate::types::{ConfigError, LedgerConfig, LedgerError, LedgerResult};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;

/// データベース接続プールを作成
/// STORE_URLの接続先に、STORE_KEYをパスワードとして適用します
pub async fn create_pool(config: &LedgerConfig) -> LedgerResult<PgPool> {
    let options = PgConnectOptions::from_str(&config.store_url)
        .map_err(|e| {
            ConfigError::invalid_value(format!("STORE_URLを解釈できません: {}", e))
        })?
        .password(&config.store_key);

    let mut pool_options = PgPoolOptions::new().max_connections(config.max_connections);
    if let Some(timeout) = config.acquire_timeout {
        pool_options = pool_options.acquire_timeout(timeout);
    }

    pool_options
        .connect_with(options)
        .await
        .map_err(LedgerError::connection)
}

/// データベースの初期化（マイグレーション実行）
pub async fn initialize_database(pool: &PgPool) -> LedgerResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(LedgerError::connection)
}

/// プールの作成と、設定に応じたデータベース初期化を一括で行う便利関数
pub async fn setup_database(config: &LedgerConfig) -> LedgerResult<PgPool> {
    let pool = create_pool(config).await?;
    if config.run_migrations {
        initialize_database(&pool).await?;
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_store_url_is_config_error() {
        let config = LedgerConfig::new("not a url", "secret");
        let result = create_pool(&config).await;
        assert!(
            matches!(result, Err(LedgerError::Config(ConfigError::InvalidValue { .. }))),
            "不正なURLは設定エラーになるべき"
        );
    }
}
