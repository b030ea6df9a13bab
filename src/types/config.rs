use std::env;
use std::time::Duration;
use thiserror::Error;

/// 接続先URLの環境変数名
pub const STORE_URL_ENV: &str = "STORE_URL";
/// 接続用クレデンシャルの環境変数名
pub const STORE_KEY_ENV: &str = "STORE_KEY";
/// テストモード切り替えの環境変数名
pub const TEST_MODE_ENV: &str = "SCRAPER_TEST_MODE";
pub const MAX_CONNECTIONS_ENV: &str = "STORE_MAX_CONNECTIONS";
pub const ACQUIRE_TIMEOUT_ENV: &str = "STORE_ACQUIRE_TIMEOUT_SECS";
pub const RUN_MIGRATIONS_ENV: &str = "STORE_RUN_MIGRATIONS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// 設定関連のエラー型
/// 環境変数の不足や設定値の検証エラーを定義
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 環境変数が見つからない
    #[error("環境変数が見つかりません: {name}")]
    MissingEnvironmentVariable { name: String },

    /// 設定値が不正
    #[error("設定値が不正です: {reason}")]
    InvalidValue { reason: String },
}

impl ConfigError {
    /// 環境変数不足エラーを作成
    pub fn missing_env_var<N: Into<String>>(name: N) -> Self {
        Self::MissingEnvironmentVariable { name: name.into() }
    }

    /// 不正な設定値エラーを作成
    pub fn invalid_value<R: Into<String>>(reason: R) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

/// 設定エラーのResult型エイリアス
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// 記事台帳の接続設定
///
/// テストモードはプロセス全体の環境変数ではなく、この構造体の値として
/// 台帳に渡される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Postgresの接続URL
    pub store_url: String,
    /// 接続パスワードとして使うクレデンシャル
    pub store_key: String,
    /// 有効時は全URLを未処理として扱う
    pub test_mode: bool,
    pub max_connections: u32,
    /// コネクション取得の上限時間（未指定ならsqlxの既定値）
    pub acquire_timeout: Option<Duration>,
    /// 接続時にマイグレーションを実行するか
    pub run_migrations: bool,
}

impl LedgerConfig {
    /// 必須項目のみを指定して設定を作成
    pub fn new<U: Into<String>, K: Into<String>>(store_url: U, store_key: K) -> Self {
        Self {
            store_url: store_url.into(),
            store_key: store_key.into(),
            test_mode: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: None,
            run_migrations: false,
        }
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn with_run_migrations(mut self, run_migrations: bool) -> Self {
        self.run_migrations = run_migrations;
        self
    }

    /// 環境変数から設定を読み込む
    /// .envファイルがあれば先に読み込みます
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> ConfigResult<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::missing_env_var(name))
        };

        let store_url = required(STORE_URL_ENV)?;
        let store_key = required(STORE_KEY_ENV)?;

        let test_mode = parse_bool(TEST_MODE_ENV, lookup(TEST_MODE_ENV))?;
        let run_migrations = parse_bool(RUN_MIGRATIONS_ENV, lookup(RUN_MIGRATIONS_ENV))?;

        let max_connections = match lookup(MAX_CONNECTIONS_ENV) {
            Some(raw) => {
                let value: u32 = raw.trim().parse().map_err(|_| {
                    ConfigError::invalid_value(format!("{}={}", MAX_CONNECTIONS_ENV, raw))
                })?;
                if value == 0 {
                    return Err(ConfigError::invalid_value(format!(
                        "{}は1以上である必要があります",
                        MAX_CONNECTIONS_ENV
                    )));
                }
                value
            }
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let acquire_timeout = lookup(ACQUIRE_TIMEOUT_ENV)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| {
                        ConfigError::invalid_value(format!("{}={}", ACQUIRE_TIMEOUT_ENV, raw))
                    })
            })
            .transpose()?;

        Ok(Self {
            store_url,
            store_key,
            test_mode,
            max_connections,
            acquire_timeout,
            run_migrations,
        })
    }
}

/// 真偽値の環境変数を解釈する（未設定・空文字はfalse）
///
/// true/1/yes/on と false/0/no/off を大文字小文字を区別せずに受け付ける。
/// 以前のトラッカーは"true"以外をすべてfalse扱いしていたが、ここでは
/// それ以外の値（例: "maybe"）を`ConfigError::InvalidValue`として構築時に拒否する。
fn parse_bool(name: &str, raw: Option<String>) -> ConfigResult<bool> {
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::invalid_value(format!("{}={}", name, raw))),
    }
}
