use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// scraped_articlesテーブルの1行
///
/// (source_id, url) の組ごとに高々1行。`first_seen`は挿入時にのみ設定され、
/// `last_checked`はmark_seenのたびに更新される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SeenArticle {
    pub id: i64,
    pub source_id: String,
    pub url: String,
    pub first_seen: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
}

impl SeenArticle {
    /// 初回登録以降にmark_seenで再確認されたかどうか
    pub fn was_rechecked(&self) -> bool {
        self.last_checked > self.first_seen
    }
}

/// 入力順を保ったまま、既知URLに含まれないものだけを残す
/// 入力の重複はそのまま残す
pub fn retain_unseen<'a, I>(urls: &[String], seen: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let seen: std::collections::HashSet<&str> = seen.into_iter().map(String::as_str).collect();
    urls.iter()
        .filter(|url| !seen.contains(url.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_retain_unseen_keeps_order_and_duplicates() {
        let input = urls(&["http://a/3", "http://a/1", "http://a/3", "http://a/2"]);
        let seen = urls(&["http://a/1"]);
        let result = retain_unseen(&input, &seen);
        assert_eq!(result, urls(&["http://a/3", "http://a/3", "http://a/2"]));
    }

    #[test]
    fn test_retain_unseen_ignores_unknown_seen_values() {
        let input = urls(&["x", "y"]);
        let seen = urls(&["z"]);
        assert_eq!(retain_unseen(&input, &seen), input);
    }

    #[test]
    fn test_was_rechecked() {
        let now = Utc::now();
        let mut record = SeenArticle {
            id: 1,
            source_id: "siteA".to_string(),
            url: "http://a/1".to_string(),
            first_seen: now,
            last_checked: now,
        };
        assert!(!record.was_rechecked());
        record.last_checked = now + Duration::seconds(5);
        assert!(record.was_rechecked());
    }
}
