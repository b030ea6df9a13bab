use super::model::{retain_unseen, SeenArticle};
use crate::infra::db::setup_database;
use crate::infra::store::{PgSeenArticleStore, SeenArticleStore};
use crate::types::{
    FilterOutcome, LedgerConfig, LedgerError, LedgerResult, LedgerStats, SourceCounts,
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// スクレイパーが処理済みの記事URLを追跡する台帳
///
/// 状態はストアへの接続ハンドルのみで、キャッシュは持たない。
/// DBエラーは呼び出し元へ伝播させず、ログに記録したうえで
/// 読み取り系は「未処理扱い」、書き込み・保守系は0件/空の結果を返す。
///
/// ```no_run
/// # async fn run() -> seen_ledger::LedgerResult<()> {
/// use seen_ledger::ArticleLedger;
///
/// let mut ledger = ArticleLedger::from_env()?;
/// ledger.connect().await?;
///
/// let found = vec!["https://example.com/a".to_string()];
/// let new_urls = ledger.filter_new("example", &found).await?;
/// ledger.mark_seen("example", &new_urls).await?;
/// ledger.close().await;
/// # Ok(())
/// # }
/// ```
pub struct ArticleLedger {
    config: LedgerConfig,
    store: Option<Box<dyn SeenArticleStore>>,
}

impl ArticleLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            store: None,
        }
    }

    /// 環境変数（STORE_URL / STORE_KEY / SCRAPER_TEST_MODE）から台帳を作成
    pub fn from_env() -> LedgerResult<Self> {
        Ok(Self::new(LedgerConfig::from_env()?))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn is_test_mode(&self) -> bool {
        self.config.test_mode
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    /// 設定に従ってPostgresへ接続する。接続済みなら何もしない
    pub async fn connect(&mut self) -> LedgerResult<()> {
        if self.store.is_some() {
            return Ok(());
        }
        let pool = setup_database(&self.config).await?;
        self.connect_with_store(Box::new(PgSeenArticleStore::from_pool(pool)))
            .await
    }

    /// 指定されたストアを使用して接続する
    ///
    /// テスト時にモックストアを注入することで、
    /// 実際のデータベースへの通信を避けることができます。
    /// ストアの所有権は台帳に移り、close()で解放されます。
    /// 接続済みの場合、渡されたストアは使わずに解放します。
    pub async fn connect_with_store(
        &mut self,
        store: Box<dyn SeenArticleStore>,
    ) -> LedgerResult<()> {
        if self.store.is_some() {
            store.close().await;
            return Ok(());
        }

        if let Err(e) = store.probe().await {
            store.close().await;
            return Err(LedgerError::connection(e));
        }

        if self.config.test_mode {
            warn!("記事台帳のテストモードが有効です。全URLを未処理として扱います");
        }
        info!("記事台帳がデータベースに接続しました");

        self.store = Some(store);
        Ok(())
    }

    /// 接続を解放する。未接続なら何もしない
    pub async fn close(&mut self) {
        if let Some(store) = self.store.take() {
            store.close().await;
            info!("記事台帳の接続を解放しました");
        }
    }

    fn store(&self) -> LedgerResult<&dyn SeenArticleStore> {
        self.store.as_deref().ok_or(LedgerError::NotConnected)
    }

    /// 未処理のURLだけを入力順のまま返す
    ///
    /// テストモードでは入力をそのまま返す。DBエラー時も全件を未処理として返す。
    pub async fn filter_new(&self, source_id: &str, urls: &[String]) -> LedgerResult<Vec<String>> {
        Ok(self.filter_new_with_status(source_id, urls).await?.new_urls)
    }

    /// filter_newと同じ判定に加え、DBエラーで全件を返したかどうかを報告する
    pub async fn filter_new_with_status(
        &self,
        source_id: &str,
        urls: &[String],
    ) -> LedgerResult<FilterOutcome> {
        let store = self.store()?;

        if urls.is_empty() {
            return Ok(FilterOutcome::passthrough(urls));
        }

        if self.config.test_mode {
            debug!(source_id, count = urls.len(), "テストモード: 全URLを未処理として返します");
            return Ok(FilterOutcome::passthrough(urls));
        }

        match store.select_seen_urls(source_id, urls).await {
            Ok(seen) => {
                let new_urls = retain_unseen(urls, &seen);
                let seen_count = urls.len() - new_urls.len();
                debug!(source_id, seen = seen_count, new = new_urls.len(), "URLを判定しました");
                Ok(FilterOutcome {
                    new_urls,
                    seen_count,
                    degraded: false,
                })
            }
            Err(e) => {
                let err = LedgerError::remote_query("filter_new", Some(source_id), e);
                warn!(error = %err, "URL判定に失敗したため全件を未処理として扱います");
                Ok(FilterOutcome::degraded(urls))
            }
        }
    }

    /// URLを処理済みとして記録し、記録できた件数を返す
    ///
    /// 1件ごとの失敗はログに記録してスキップする。テストモードでも記録は行う。
    pub async fn mark_seen(&self, source_id: &str, urls: &[String]) -> LedgerResult<usize> {
        let store = self.store()?;

        if urls.is_empty() {
            return Ok(0);
        }

        let checked_at = Utc::now();
        let mut marked = 0;

        for url in urls {
            match store.upsert_seen(source_id, url, checked_at).await {
                Ok(()) => marked += 1,
                Err(e) => {
                    let err = LedgerError::remote_query("mark_seen", Some(source_id), e);
                    warn!(url = url.as_str(), error = %err, "URLの記録に失敗しました");
                }
            }
        }

        debug!(source_id, marked, total = urls.len(), "URLを処理済みとして記録しました");
        Ok(marked)
    }

    /// 単一URLが処理済みかを判定する（テストモードでは常にfalse）
    pub async fn is_seen(&self, source_id: &str, url: &str) -> LedgerResult<bool> {
        let store = self.store()?;

        if self.config.test_mode {
            return Ok(false);
        }

        match store.exists(source_id, url).await {
            Ok(seen) => Ok(seen),
            Err(e) => {
                let err = LedgerError::remote_query("is_seen", Some(source_id), e);
                warn!(url, error = %err, "URLの存在確認に失敗しました");
                Ok(false)
            }
        }
    }

    /// 記録そのものを取得する（テストモードの影響を受けない）
    pub async fn get_record(&self, source_id: &str, url: &str) -> LedgerResult<Option<SeenArticle>> {
        let store = self.store()?;

        match store.find(source_id, url).await {
            Ok(record) => Ok(record),
            Err(e) => {
                let err = LedgerError::remote_query("get_record", Some(source_id), e);
                warn!(url, error = %err, "記録の取得に失敗しました");
                Ok(None)
            }
        }
    }

    /// 全体、またはsource_idで絞り込んだ統計情報
    pub async fn get_stats(&self, source_id: Option<&str>) -> LedgerResult<LedgerStats> {
        let store = self.store()?;

        match store.stats(source_id).await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                let err = LedgerError::remote_query("get_stats", source_id, e);
                warn!(error = %err, "統計情報の取得に失敗しました");
                Ok(LedgerStats::default())
            }
        }
    }

    /// ソースごとの件数（件数の降順）
    pub async fn get_source_counts(&self) -> LedgerResult<SourceCounts> {
        let store = self.store()?;

        match store.count_by_source().await {
            Ok(counts) => Ok(SourceCounts::new(counts)),
            Err(e) => {
                let err = LedgerError::remote_query("get_source_counts", None, e);
                warn!(error = %err, "ソース別件数の取得に失敗しました");
                Ok(SourceCounts::empty())
            }
        }
    }

    /// ソースの記録をすべて削除し、削除件数を返す
    pub async fn clear_source(&self, source_id: &str) -> LedgerResult<u64> {
        let store = self.store()?;

        match store.delete_source(source_id).await {
            Ok(deleted) => {
                info!(source_id, deleted, "ソースの追跡URLを削除しました");
                Ok(deleted)
            }
            Err(e) => {
                let err = LedgerError::remote_query("clear_source", Some(source_id), e);
                warn!(error = %err, "ソースの追跡URL削除に失敗しました");
                Ok(0)
            }
        }
    }

    /// 全ソースの記録を削除する。取り消しできない保守操作
    pub async fn clear_all(&self) -> LedgerResult<u64> {
        let store = self.store()?;

        match store.delete_all().await {
            Ok(deleted) => {
                warn!(deleted, "全ソースの追跡URLを削除しました");
                Ok(deleted)
            }
            Err(e) => {
                let err = LedgerError::remote_query("clear_all", None, e);
                warn!(error = %err, "全追跡URLの削除に失敗しました");
                Ok(0)
            }
        }
    }
}
