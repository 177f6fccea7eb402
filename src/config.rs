//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリを使用した設定ファイルの永続化と管理を提供します。

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::client::{DEFAULT_LIVENESS_BASE_URL, DEFAULT_STATS_BASE_URL};

/// ポーリング間隔設定（秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// 配信中の再取得間隔
    pub live_secs: u64,
    /// 未配信時の監視間隔
    pub offline_secs: u64,
    /// イベント0件（配信開始直後）の待ち時間
    pub empty_secs: u64,
    /// 配信検出からチャンネル解決までの再試行間隔
    pub detect_retry_secs: u64,
    /// 過去配信の取得失敗時の固定バックオフ
    pub retry_backoff_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            live_secs: 30,
            offline_secs: 15,
            empty_secs: 10,
            detect_retry_secs: 10,
            retry_backoff_secs: 5,
        }
    }
}

impl PollConfig {
    pub fn live(&self) -> Duration {
        Duration::from_secs(self.live_secs)
    }

    pub fn offline(&self) -> Duration {
        Duration::from_secs(self.offline_secs)
    }

    pub fn empty(&self) -> Duration {
        Duration::from_secs(self.empty_secs)
    }

    pub fn detect_retry(&self) -> Duration {
        Duration::from_secs(self.detect_retry_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

/// リモートAPI設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub stats_base_url: String,
    pub liveness_base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            stats_base_url: DEFAULT_STATS_BASE_URL.to_string(),
            liveness_base_url: DEFAULT_LIVENESS_BASE_URL.to_string(),
        }
    }
}

/// スナップショット出力設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub ndjson_enabled: bool,
    pub ndjson_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ndjson_enabled: false,
            ndjson_file: "bilistat_snapshots.ndjson".to_string(),
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
            enable_file_logging: false,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// バケット幅（分）
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: u32,

    /// 基準値計算に使う直近配信数
    #[serde(default = "default_lookback_count")]
    pub lookback_count: usize,

    /// ポーリング間隔
    #[serde(default)]
    pub poll: PollConfig,

    /// リモートAPI
    #[serde(default)]
    pub api: ApiConfig,

    /// スナップショット出力
    #[serde(default)]
    pub output: OutputConfig,

    /// ログ設定
    #[serde(default)]
    pub log: LogConfig,
}

fn default_bucket_minutes() -> u32 {
    10
}

fn default_lookback_count() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: default_bucket_minutes(),
            lookback_count: default_lookback_count(),
            poll: PollConfig::default(),
            api: ApiConfig::default(),
            output: OutputConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// 新しい設定マネージャーを作成
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        // 設定ディレクトリを作成（存在しない場合）
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        Ok(Self { config_path })
    }

    /// XDGデフォルトの代わりに任意のパスを使うマネージャー
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("dev", "sifyfy", "bilistat")
            .context("Failed to get project directories")?;

        let config_dir = project_dirs.config_dir();
        let config_file = config_dir.join("config.toml");

        debug!("Config file path: {}", config_file.display());

        Ok(config_file)
    }

    /// 設定を読み込み
    pub fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config: AppConfig = toml::from_str(&content).with_context(|| {
            format!("Failed to parse config file: {}", self.config_path.display())
        })?;

        debug!("Config loaded from: {}", self.config_path.display());

        Ok(config)
    }

    /// 設定を保存
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        let content =
            toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;

        fs::write(&self.config_path, content).with_context(|| {
            format!("Failed to write config file: {}", self.config_path.display())
        })?;

        info!("💾 Config saved to: {}", self.config_path.display());

        Ok(())
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }
}
