// 共通ユーティリティ関数

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// 時刻フォーマット（状態ラベル用）
pub fn format_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// 強化されたログ初期化
///
/// ファイル出力が有効な場合は日次ローテーションのレイヤーを重ねる。
/// 返ってきたguardはファイル出力を使う間は保持しておくこと。
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.enable_file_logging {
        let log_dir = match &config.log_dir {
            Some(dir) => dir.clone(),
            None => default_log_dir()?,
        };
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        let appender = tracing_appender::rolling::daily(&log_dir, "bilistat.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);

        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .try_init()?;

        Ok(Some(guard))
    } else {
        registry.try_init()?;
        Ok(None)
    }
}

fn default_log_dir() -> Result<std::path::PathBuf> {
    let project_dirs = directories::ProjectDirs::from("dev", "sifyfy", "bilistat")
        .context("Failed to get project directories")?;
    Ok(project_dirs.data_dir().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        let formatted = format_timestamp();
        assert_eq!(formatted.len(), 8);
        assert_eq!(formatted.chars().nth(2), Some(':'));
        assert_eq!(formatted.chars().nth(5), Some(':'));
    }
}
