use seen_ledger::{ArticleLedger, LedgerStats, SourceCounts};
use serde::Serialize;
use std::process::ExitCode;
use tracing::error;

/// レポート出力用の構造体
#[derive(Serialize)]
struct LedgerReport {
    stats: LedgerStats,
    sources: SourceCounts,
}

#[tokio::main]
async fn main() -> ExitCode {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut ledger = match ArticleLedger::from_env() {
        Ok(ledger) => ledger,
        Err(e) => {
            error!("設定の読み込みに失敗しました: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = ledger.connect().await {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    let report = match collect_report(&ledger).await {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            ledger.close().await;
            return ExitCode::FAILURE;
        }
    };
    ledger.close().await;

    println!("=== 記事台帳レポート ===");
    println!("{}", report.stats);
    for source in report.sources.iter() {
        println!("  {}: {}件", source.source_id, source.count);
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("レポートのJSON変換に失敗しました: {}", e),
    }

    ExitCode::SUCCESS
}

async fn collect_report(ledger: &ArticleLedger) -> seen_ledger::LedgerResult<LedgerReport> {
    let stats = ledger.get_stats(None).await?;
    let sources = ledger.get_source_counts().await?;
    Ok(LedgerReport { stats, sources })
}
