use crate::types::ConfigError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 記事台帳のエラー型
///
/// 公開操作から呼び出し元に返るのは`Config`・`NotConnected`・`Connection`のみ。
/// `RemoteQuery`はログ出力用に組み立てられ、各操作の既定値にフォールバックする。
#[derive(Error, Debug)]
pub enum LedgerError {
    /// 設定エラー
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// connect()前に操作が呼ばれた
    #[error("記事台帳がデータベースに接続されていません")]
    NotConnected,

    /// データベース接続エラー
    #[error("データベースへの接続に失敗しました: {source}")]
    Connection {
        #[source]
        source: BoxError,
    },

    /// データベースクエリエラー
    #[error(
        "データベースクエリエラー: {} (source_id={}) - {}",
        .operation,
        .source_id.as_deref().unwrap_or("-"),
        .source
    )]
    RemoteQuery {
        operation: String,
        source_id: Option<String>,
        #[source]
        source: BoxError,
    },
}

impl LedgerError {
    /// データベース接続エラーを作成
    pub fn connection<E: Into<BoxError>>(source: E) -> Self {
        Self::Connection {
            source: source.into(),
        }
    }

    /// データベースクエリエラーを作成
    pub fn remote_query<O, E>(operation: O, source_id: Option<&str>, source: E) -> Self
    where
        O: Into<String>,
        E: Into<BoxError>,
    {
        Self::RemoteQuery {
            operation: operation.into(),
            source_id: source_id.map(str::to_string),
            source: source.into(),
        }
    }
}

/// 記事台帳のResult型エイリアス
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
