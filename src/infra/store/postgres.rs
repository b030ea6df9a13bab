use super::SeenArticleStore;
use crate::domain::ledger::SeenArticle;
use crate::types::{LedgerStats, SourceCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// sqlxのPostgres接続プールを使ったストア実装
///
/// プールはこのストアが専有し、close()でプールごと解放する。
/// 台帳ごとに別のストア（別のプール）を作ること。
#[derive(Debug)]
pub struct PgSeenArticleStore {
    pool: PgPool,
}

impl PgSeenArticleStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SeenArticleStore for PgSeenArticleStore {
    async fn probe(&self) -> Result<()> {
        sqlx::query("SELECT id FROM scraped_articles LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("scraped_articlesテーブルの疎通確認に失敗しました")?;
        Ok(())
    }

    async fn select_seen_urls(&self, source_id: &str, urls: &[String]) -> Result<Vec<String>> {
        let seen = sqlx::query_scalar::<_, String>(
            r#"
            SELECT url
            FROM scraped_articles
            WHERE source_id = $1 AND url = ANY($2)
            "#,
        )
        .bind(source_id)
        .bind(urls)
        .fetch_all(&self.pool)
        .await
        .context("処理済みURLの検索に失敗しました")?;

        Ok(seen)
    }

    async fn upsert_seen(
        &self,
        source_id: &str,
        url: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        // first_seenは挿入時のみ。競合時はlast_checkedだけを更新する
        sqlx::query(
            r#"
            INSERT INTO scraped_articles (source_id, url, first_seen, last_checked)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (source_id, url) DO UPDATE SET
                last_checked = EXCLUDED.last_checked
            "#,
        )
        .bind(source_id)
        .bind(url)
        .bind(checked_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("URLの登録・更新に失敗しました: {}", url))?;

        Ok(())
    }

    async fn find(&self, source_id: &str, url: &str) -> Result<Option<SeenArticle>> {
        sqlx::query_as::<_, SeenArticle>(
            r#"
            SELECT id, source_id, url, first_seen, last_checked
            FROM scraped_articles
            WHERE source_id = $1 AND url = $2
            "#,
        )
        .bind(source_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .context("記録の取得に失敗しました")
    }

    async fn exists(&self, source_id: &str, url: &str) -> Result<bool> {
        let row = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM scraped_articles
            WHERE source_id = $1 AND url = $2
            LIMIT 1
            "#,
        )
        .bind(source_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .context("URLの存在確認に失敗しました")?;

        Ok(row.is_some())
    }

    async fn stats(&self, source_id: Option<&str>) -> Result<LedgerStats> {
        // 単一の静的SQL + オプション引数方式
        let (total_articles, oldest_seen, newest_seen) =
            sqlx::query_as::<_, (i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>(
                r#"
                SELECT COUNT(*), MIN(first_seen), MAX(first_seen)
                FROM scraped_articles
                WHERE ($1::text IS NULL OR source_id = $1)
                "#,
            )
            .bind(source_id)
            .fetch_one(&self.pool)
            .await
            .context("統計情報の取得に失敗しました")?;

        Ok(LedgerStats {
            total_articles,
            oldest_seen,
            newest_seen,
        })
    }

    async fn count_by_source(&self) -> Result<Vec<SourceCount>> {
        sqlx::query_as::<_, SourceCount>(
            r#"
            SELECT source_id, COUNT(*) AS count
            FROM scraped_articles
            GROUP BY source_id
            ORDER BY count DESC, source_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("ソース別件数の取得に失敗しました")
    }

    async fn delete_source(&self, source_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM scraped_articles WHERE source_id = $1")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .context("ソースの記録削除に失敗しました")?;

        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM scraped_articles")
            .execute(&self.pool)
            .await
            .context("全記録の削除に失敗しました")?;

        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(all(test, feature = "online"))]
mod tests {
    use super::*;
    use chrono::Duration;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // データ永続化・DB操作系テスト
    mod storage {
        use super::*;

        #[sqlx::test]
        async fn test_upsert_keeps_single_row(pool: PgPool) -> Result<(), anyhow::Error> {
            let store = PgSeenArticleStore::from_pool(pool.clone());
            let first = Utc::now();
            let second = first + Duration::seconds(30);

            store.upsert_seen("siteA", "http://a/1", first).await?;
            store.upsert_seen("siteA", "http://a/1", second).await?;

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scraped_articles")
                .fetch_one(&pool)
                .await?;
            assert_eq!(count, 1, "重複行が作成されてしまいました");

            let record = store
                .find("siteA", "http://a/1")
                .await?
                .expect("記録が見つからない");
            // Postgresのtimestamptzはマイクロ秒精度
            assert_eq!(record.first_seen.timestamp_micros(), first.timestamp_micros());
            assert_eq!(record.last_checked.timestamp_micros(), second.timestamp_micros());

            println!("✅ UPSERT一意性テスト成功");
            Ok(())
        }

        #[sqlx::test]
        async fn test_select_seen_urls(pool: PgPool) -> Result<(), anyhow::Error> {
            let store = PgSeenArticleStore::from_pool(pool);
            let now = Utc::now();
            store.upsert_seen("siteA", "http://a/1", now).await?;
            store.upsert_seen("siteB", "http://a/2", now).await?;

            let seen = store
                .select_seen_urls("siteA", &urls(&["http://a/1", "http://a/2", "http://a/3"]))
                .await?;
            assert_eq!(seen, urls(&["http://a/1"]));
            assert!(store.exists("siteA", "http://a/1").await?);
            assert!(!store.exists("siteA", "http://a/2").await?);
            Ok(())
        }

        #[sqlx::test]
        async fn test_stats_and_counts(pool: PgPool) -> Result<(), anyhow::Error> {
            let store = PgSeenArticleStore::from_pool(pool);
            let now = Utc::now();
            for url in ["http://a/1", "http://a/2", "http://a/3"] {
                store.upsert_seen("siteA", url, now).await?;
            }
            store
                .upsert_seen("siteB", "http://b/1", now - Duration::days(1))
                .await?;

            let all = store.stats(None).await?;
            assert_eq!(all.total_articles, 4);
            assert!(all.oldest_seen < all.newest_seen);

            let site_b = store.stats(Some("siteB")).await?;
            assert_eq!(site_b.total_articles, 1);

            let empty = store.stats(Some("unknown")).await?;
            assert_eq!(empty, LedgerStats::default());

            let counts = store.count_by_source().await?;
            assert_eq!(counts[0].source_id, "siteA");
            assert_eq!(counts[0].count, 3);
            assert_eq!(counts[1].count, 1);
            Ok(())
        }

        #[sqlx::test]
        async fn test_delete_source_and_all(pool: PgPool) -> Result<(), anyhow::Error> {
            let store = PgSeenArticleStore::from_pool(pool);
            let now = Utc::now();
            store.upsert_seen("siteA", "http://a/1", now).await?;
            store.upsert_seen("siteA", "http://a/2", now).await?;
            store.upsert_seen("siteB", "http://b/1", now).await?;

            assert_eq!(store.delete_source("siteA").await?, 2);
            assert_eq!(store.stats(Some("siteB")).await?.total_articles, 1);
            assert_eq!(store.delete_all().await?, 1);
            assert_eq!(store.stats(None).await?.total_articles, 0);
            Ok(())
        }
    }
}
