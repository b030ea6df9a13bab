use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 追跡中の記事URLの集計結果
/// 取得に失敗した場合は`Default`（0件・日時なし）を返す
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_articles: i64,
    pub oldest_seen: Option<DateTime<Utc>>,
    pub newest_seen: Option<DateTime<Utc>>,
}

impl fmt::Display for LedgerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format_time = |t: &Option<DateTime<Utc>>| {
            t.map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "なし".to_string())
        };
        write!(
            f,
            "追跡URL{}件（最古: {}、最新: {}）",
            self.total_articles,
            format_time(&self.oldest_seen),
            format_time(&self.newest_seen)
        )
    }
}

/// ソースごとの追跡URL件数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceCount {
    pub source_id: String,
    pub count: i64,
}

/// ソース別件数の一覧（件数の降順、同数はsource_idの昇順）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts(Vec<SourceCount>);

impl SourceCounts {
    /// 任意順の件数から並び順を確定させて作成
    pub fn new(mut counts: Vec<SourceCount>) -> Self {
        counts.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        Self(counts)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, source_id: &str) -> Option<i64> {
        self.0
            .iter()
            .find(|c| c.source_id == source_id)
            .map(|c| c.count)
    }

    pub fn total(&self) -> i64 {
        self.0.iter().map(|c| c.count).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceCount> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<SourceCount> {
        self.0
    }
}

impl IntoIterator for SourceCounts {
    type Item = SourceCount;
    type IntoIter = std::vec::IntoIter<SourceCount>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// filter_new_with_statusの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// 未処理と判定されたURL（入力順を保持）
    pub new_urls: Vec<String>,
    /// 処理済みとして除外された入力の件数
    pub seen_count: usize,
    /// DBエラーにより全件を未処理として返した場合にtrue
    pub degraded: bool,
}

impl FilterOutcome {
    pub fn passthrough(urls: &[String]) -> Self {
        Self {
            new_urls: urls.to_vec(),
            seen_count: 0,
            degraded: false,
        }
    }

    pub fn degraded(urls: &[String]) -> Self {
        Self {
            degraded: true,
            ..Self::passthrough(urls)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn count(source_id: &str, count: i64) -> SourceCount {
        SourceCount {
            source_id: source_id.to_string(),
            count,
        }
    }

    #[test]
    fn test_source_counts_order() {
        let counts = SourceCounts::new(vec![
            count("bauwelt", 3),
            count("archdaily", 10),
            count("dezeen", 3),
        ]);
        let order: Vec<&str> = counts.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(order, vec!["archdaily", "bauwelt", "dezeen"]);
        assert_eq!(counts.get("dezeen"), Some(3));
        assert_eq!(counts.get("unknown"), None);
        assert_eq!(counts.total(), 16);
    }

    #[test]
    fn test_stats_default_and_display() {
        let stats = LedgerStats::default();
        assert_eq!(stats.total_articles, 0);
        assert!(stats.oldest_seen.is_none());
        assert!(stats.to_string().contains("0件"));

        let seen = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let stats = LedgerStats {
            total_articles: 2,
            oldest_seen: Some(seen),
            newest_seen: Some(seen),
        };
        assert!(stats.to_string().contains("2025-01-01T12:00:00"));
    }

    #[test]
    fn test_degraded_outcome_keeps_input() {
        let urls = vec!["x".to_string(), "y".to_string()];
        let outcome = FilterOutcome::degraded(&urls);
        assert_eq!(outcome.new_urls, urls);
        assert!(outcome.degraded);
        assert_eq!(outcome.seen_count, 0);
    }
}
