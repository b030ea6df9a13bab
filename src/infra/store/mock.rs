use super::SeenArticleStore;
use crate::domain::ledger::SeenArticle;
use crate::types::{LedgerStats, SourceCount};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// 複数のハンドルから参照されるインメモリのテーブル
#[derive(Debug, Default)]
struct MockTable {
    rows: Mutex<Vec<SeenArticle>>,
    next_id: Mutex<i64>,
    /// trueの間は全操作がエラーを返す（DB障害に相当）
    should_fail: AtomicBool,
    /// upsert_seenでエラーにするURL
    failing_urls: Mutex<HashSet<String>>,
    /// ストアに届いた操作の回数
    queries: AtomicUsize,
    closed_handles: AtomicUsize,
}

/// テスト用のインメモリストア
///
/// Postgres実装と同じ一意性・UPSERTの振る舞いを持ち、
/// 全操作の失敗やURL単位の失敗を注入できます。
/// `handle()`で同じテーブルを指す別の接続ハンドルを作れます。
/// 解放はハンドル単位で、他のハンドルには影響しません。
#[derive(Debug, Default)]
pub struct MockSeenArticleStore {
    table: Arc<MockTable>,
    closed: AtomicBool,
}

impl MockSeenArticleStore {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 全操作がエラーを返すストアを作成
    pub fn new_failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    /// 同じテーブルを参照する新しい接続ハンドルを作成
    pub fn handle(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            closed: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.table.should_fail.store(failing, Ordering::SeqCst);
    }

    /// 指定URLの登録だけを失敗させる
    pub fn fail_url(&self, url: &str) {
        if let Ok(mut urls) = self.table.failing_urls.lock() {
            urls.insert(url.to_string());
        }
    }

    /// このハンドルが解放済みかどうか
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// テーブルを共有するハンドルのうち解放済みの数
    pub fn closed_handle_count(&self) -> usize {
        self.table.closed_handles.load(Ordering::SeqCst)
    }

    /// テーブルを共有する全ハンドルからの操作回数（失敗した操作も含む）
    pub fn query_count(&self) -> usize {
        self.table.queries.load(Ordering::SeqCst)
    }

    /// 保持している行数（失敗モードに関係なく参照できる）
    pub fn row_count(&self) -> usize {
        self.table.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    fn check(&self, operation: &str) -> Result<()> {
        self.table.queries.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Err(anyhow!("モックストアは解放済みです: {}", operation));
        }
        if self.table.should_fail.load(Ordering::SeqCst) {
            return Err(anyhow!("モックDBエラー: {}", operation));
        }
        Ok(())
    }

    fn rows(&self) -> Result<MutexGuard<'_, Vec<SeenArticle>>> {
        self.table
            .rows
            .lock()
            .map_err(|_| anyhow!("モックストアのロックが破損しています"))
    }

    fn matches(row: &SeenArticle, source_id: Option<&str>) -> bool {
        source_id.map_or(true, |s| row.source_id == s)
    }

    fn find_row(&self, source_id: &str, url: &str) -> Result<Option<SeenArticle>> {
        Ok(self
            .rows()?
            .iter()
            .find(|row| row.source_id == source_id && row.url == url)
            .cloned())
    }
}

#[async_trait]
impl SeenArticleStore for MockSeenArticleStore {
    async fn probe(&self) -> Result<()> {
        self.check("probe")
    }

    async fn select_seen_urls(&self, source_id: &str, urls: &[String]) -> Result<Vec<String>> {
        self.check("select_seen_urls")?;
        let wanted: HashSet<&str> = urls.iter().map(String::as_str).collect();
        Ok(self
            .rows()?
            .iter()
            .filter(|row| row.source_id == source_id && wanted.contains(row.url.as_str()))
            .map(|row| row.url.clone())
            .collect())
    }

    async fn upsert_seen(
        &self,
        source_id: &str,
        url: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check("upsert_seen")?;
        let url_fails = self
            .table
            .failing_urls
            .lock()
            .map(|urls| urls.contains(url))
            .unwrap_or(false);
        if url_fails {
            return Err(anyhow!("モックDBエラー: upsert_seen {}", url));
        }

        let mut rows = self.rows()?;
        if let Some(row) = rows
            .iter_mut()
            .find(|row| row.source_id == source_id && row.url == url)
        {
            row.last_checked = checked_at;
            return Ok(());
        }

        let mut next_id = self
            .table
            .next_id
            .lock()
            .map_err(|_| anyhow!("モックストアのロックが破損しています"))?;
        *next_id += 1;
        rows.push(SeenArticle {
            id: *next_id,
            source_id: source_id.to_string(),
            url: url.to_string(),
            first_seen: checked_at,
            last_checked: checked_at,
        });
        Ok(())
    }

    async fn find(&self, source_id: &str, url: &str) -> Result<Option<SeenArticle>> {
        self.check("find")?;
        self.find_row(source_id, url)
    }

    async fn exists(&self, source_id: &str, url: &str) -> Result<bool> {
        self.check("exists")?;
        Ok(self.find_row(source_id, url)?.is_some())
    }

    async fn stats(&self, source_id: Option<&str>) -> Result<LedgerStats> {
        self.check("stats")?;
        let rows = self.rows()?;
        let scoped: Vec<&SeenArticle> = rows
            .iter()
            .filter(|row| Self::matches(row, source_id))
            .collect();

        Ok(LedgerStats {
            total_articles: scoped.len() as i64,
            oldest_seen: scoped.iter().map(|row| row.first_seen).min(),
            newest_seen: scoped.iter().map(|row| row.first_seen).max(),
        })
    }

    async fn count_by_source(&self) -> Result<Vec<SourceCount>> {
        self.check("count_by_source")?;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for row in self.rows()?.iter() {
            *counts.entry(row.source_id.clone()).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(source_id, count)| SourceCount { source_id, count })
            .collect())
    }

    async fn delete_source(&self, source_id: &str) -> Result<u64> {
        self.check("delete_source")?;
        let mut rows = self.rows()?;
        let before = rows.len();
        rows.retain(|row| row.source_id != source_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        self.check("delete_all")?;
        let mut rows = self.rows()?;
        let deleted = rows.len() as u64;
        rows.clear();
        Ok(deleted)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.table.closed_handles.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_upsert_semantics() {
        let store = MockSeenArticleStore::new();
        let first = Utc::now();
        let second = first + chrono::Duration::seconds(10);

        store.upsert_seen("siteA", "http://a/1", first).await.unwrap();
        store.upsert_seen("siteA", "http://a/1", second).await.unwrap();
        store.upsert_seen("siteB", "http://a/1", second).await.unwrap();

        assert_eq!(store.row_count(), 2, "(source_id, url)ごとに1行のはず");
        let record = store.find("siteA", "http://a/1").await.unwrap().unwrap();
        assert_eq!(record.first_seen, first);
        assert_eq!(record.last_checked, second);
    }

    #[tokio::test]
    async fn test_mock_failure_modes() {
        let store = MockSeenArticleStore::new();
        store.fail_url("http://bad");
        assert!(store.upsert_seen("s", "http://bad", Utc::now()).await.is_err());
        assert!(store.upsert_seen("s", "http://ok", Utc::now()).await.is_ok());

        store.set_failing(true);
        let err = store.probe().await.unwrap_err();
        assert!(err.to_string().contains("モックDBエラー"));
        assert!(store.stats(None).await.is_err());

        store.set_failing(false);
        assert_eq!(store.stats(None).await.unwrap().total_articles, 1);
    }

    #[tokio::test]
    async fn test_handles_close_independently() {
        let first = MockSeenArticleStore::new();
        let second = first.handle();

        first.upsert_seen("siteA", "http://a/1", Utc::now()).await.unwrap();
        assert!(second.exists("siteA", "http://a/1").await.unwrap(), "テーブルは共有される");

        first.close().await;
        first.close().await;
        assert!(first.is_closed());
        assert!(!second.is_closed(), "他のハンドルは解放されないはず");
        assert_eq!(second.closed_handle_count(), 1);

        assert!(first.probe().await.is_err(), "解放済みハンドルは使えないはず");
        assert!(second.probe().await.is_ok());
    }
}
