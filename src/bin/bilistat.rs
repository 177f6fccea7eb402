use std::path::PathBuf;

use bilistat::{
    api::client::ApiClient,
    config::{AppConfig, ConfigManager},
    display::{LogPanel, NdjsonPanel, StatsPanel},
    poller::StreamPoller,
    RoomId,
};
use clap::Parser;

/// Bilibili直播のリアルタイム統計モニター
#[derive(Debug, Parser)]
#[command(
    name = "bilistat",
    version,
    about = "Bilibili live stream statistics monitor"
)]
struct Args {
    /// 監視する直播間ID
    room_id: u64,

    /// スナップショットのNDJSON出力先（設定ファイルより優先）
    #[arg(long)]
    output: Option<String>,

    /// バケット幅（分）
    #[arg(long)]
    bucket_minutes: Option<u32>,

    /// 基準値計算に使う過去配信数
    #[arg(long)]
    lookback: Option<usize>,

    /// 設定ファイルのパス（XDGデフォルトの代わりに使う）
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 既存の設定管理システムを使用（ログ初期化前なのでエラーは後で出す）
    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new()?,
    };
    let mut load_error = None;
    let mut config = match config_manager.load_config() {
        Ok(config) => config,
        Err(e) => {
            load_error = Some(e);
            AppConfig::default()
        }
    };

    // tokio-consoleの初期化（プロファイリング用）
    #[cfg(feature = "debug-tokio")]
    console_subscriber::init();

    // 強化されたログ初期化
    #[cfg(not(feature = "debug-tokio"))]
    let _log_guard = bilistat::utils::init_logging(&config.log)?;

    if let Some(e) = load_error {
        tracing::warn!("設定読み込みエラー、デフォルト設定を使用: {}", e);
    }

    // CLI引数は設定ファイルを上書きする
    if let Some(bucket_minutes) = args.bucket_minutes {
        config.bucket_minutes = bucket_minutes;
    }
    if let Some(lookback) = args.lookback {
        config.lookback_count = lookback;
    }
    if let Some(output) = &args.output {
        config.output.ndjson_enabled = true;
        config.output.ndjson_file = output.clone();
    }

    tracing::info!("🎬 Starting bilistat - Bilibili live stats monitor");
    tracing::info!(
        room_id = args.room_id,
        bucket_minutes = config.bucket_minutes,
        lookback = config.lookback_count,
        "⚙️ Effective configuration"
    );

    let client = ApiClient::with_base_urls(
        config.api.stats_base_url.clone(),
        config.api.liveness_base_url.clone(),
    )?;

    let panel: Box<dyn StatsPanel> = if config.output.ndjson_enabled {
        tracing::info!(file = %config.output.ndjson_file, "💾 Snapshot output enabled");
        Box::new(NdjsonPanel::new(config.output.ndjson_file.clone()))
    } else {
        Box::new(LogPanel::new())
    };

    let poller = StreamPoller::new(client, panel, RoomId(args.room_id), &config);

    tokio::select! {
        _ = poller.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("🛑 終了シグナルを受信しました");
        }
    }

    tracing::info!("👋 bilistat shutting down");
    Ok(())
}
