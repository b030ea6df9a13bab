//! 型定義モジュール
//!
//! クレート全体で使用される共通的な型定義を管理します。
//! - 設定: 環境変数からの接続設定の読み込み
//! - エラー: 設定・接続・クエリのエラー表現
//! - 結果型: 集計結果とフィルタ結果

pub mod config;
pub mod error;
pub mod result;

// 便利な再エクスポート
pub use config::{ConfigError, ConfigResult, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use result::{FilterOutcome, LedgerStats, SourceCount, SourceCounts};
