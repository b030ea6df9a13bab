//! スクレイパー向けの処理済み記事URL台帳
//!
//! (source_id, url) の組をPostgresの`scraped_articles`テーブルに記録し、
//! スクレイパーの再実行時に未処理のURLだけを取り出せるようにします。

pub mod domain;
pub mod infra;
pub mod types;

pub use domain::ledger::{ArticleLedger, SeenArticle};
pub use infra::store::{MockSeenArticleStore, PgSeenArticleStore, SeenArticleStore};
pub use types::{
    ConfigError, FilterOutcome, LedgerConfig, LedgerError, LedgerResult, LedgerStats,
    SourceCount, SourceCounts,
};
