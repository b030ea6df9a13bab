//! 処理済み記事テーブルへのアクセスを抽象化するストア層
//!
//! 本番では`PgSeenArticleStore`、テストやスクレイパー開発時には
//! `MockSeenArticleStore`を記事台帳に注入します。

pub mod mock;
pub mod postgres;

use crate::domain::ledger::SeenArticle;
use crate::types::{LedgerStats, SourceCount};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use mock::MockSeenArticleStore;
pub use postgres::PgSeenArticleStore;

/// 処理済み記事テーブルに対する操作のトレイト
///
/// 一意性制約 (source_id, url) と原子的なUPSERTはストア側が保証する。
#[async_trait]
pub trait SeenArticleStore: Send + Sync {
    /// テーブルが参照できるかを軽量クエリで確認する
    async fn probe(&self) -> Result<()>;

    /// 指定URLのうち、source_idに記録済みのURLを返す
    async fn select_seen_urls(&self, source_id: &str, urls: &[String]) -> Result<Vec<String>>;

    /// 未登録なら挿入し、登録済みならlast_checkedのみ更新する
    async fn upsert_seen(&self, source_id: &str, url: &str, checked_at: DateTime<Utc>)
        -> Result<()>;

    async fn find(&self, source_id: &str, url: &str) -> Result<Option<SeenArticle>>;

    async fn exists(&self, source_id: &str, url: &str) -> Result<bool>;

    /// 全体、またはsource_idで絞り込んだ件数と初回検出日時の範囲
    async fn stats(&self, source_id: Option<&str>) -> Result<LedgerStats>;

    /// ソースごとの件数（順序は問わない）
    async fn count_by_source(&self) -> Result<Vec<SourceCount>>;

    /// source_idの行を削除し、削除件数を返す
    async fn delete_source(&self, source_id: &str) -> Result<u64>;

    /// テーブルの全行を削除し、削除件数を返す
    async fn delete_all(&self) -> Result<u64>;

    /// 保持している接続を解放する
    async fn close(&self);
}

