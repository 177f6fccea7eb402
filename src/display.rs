//! 表示境界（フローティングパネル相当）
//!
//! コアは1回の更新ごとに6系列のメトリクスと最大3つの基準値だけを
//! この境界へ渡す。それ以外の状態は越境しない。

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analytics::{Baselines, MetricSeries, StreamMetrics};
use crate::io::snapshot::{append_snapshot, StatsSnapshot};

/// パネルの状態ラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    /// 未配信
    NotLive,
    /// データ取得失敗（再試行待ち）
    FetchFailed,
    /// 配信中・正常
    Live,
}

/// 描画側が実装する境界トレイト
#[async_trait]
pub trait StatsPanel: Send {
    async fn show_status(&mut self, status: PanelStatus);
    async fn update_baselines(&mut self, baselines: &Baselines);
    async fn update_metrics(&mut self, metrics: &StreamMetrics);
}

#[async_trait]
impl StatsPanel for Box<dyn StatsPanel> {
    async fn show_status(&mut self, status: PanelStatus) {
        (**self).show_status(status).await;
    }

    async fn update_baselines(&mut self, baselines: &Baselines) {
        (**self).update_baselines(baselines).await;
    }

    async fn update_metrics(&mut self, metrics: &StreamMetrics) {
        (**self).update_metrics(metrics).await;
    }
}

/// 構造化ログへ要約を流すだけのパネル（デフォルト）
#[derive(Debug, Default)]
pub struct LogPanel {
    status: Option<PanelStatus>,
}

impl LogPanel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsPanel for LogPanel {
    async fn show_status(&mut self, status: PanelStatus) {
        if self.status == Some(status) {
            // 同じ状態の繰り返しは debug に落とす
            tracing::debug!(status = ?status, "📊 Panel status unchanged");
            return;
        }
        self.status = Some(status);

        match status {
            PanelStatus::NotLive => {
                tracing::info!("💤 Not live - waiting for the stream to start");
            }
            PanelStatus::FetchFailed => {
                tracing::warn!(
                    at = %crate::utils::format_timestamp(),
                    "❌ Failed to fetch stream data - will retry"
                );
            }
            PanelStatus::Live => {
                tracing::info!("🎬 Live stream detected - collecting stats");
            }
        }
    }

    async fn update_baselines(&mut self, baselines: &Baselines) {
        tracing::info!(
            message_rate = ?baselines.message_rate,
            active_viewers = ?baselines.active_viewers,
            online = ?baselines.online,
            "📐 Baselines from recent streams"
        );
    }

    async fn update_metrics(&mut self, metrics: &StreamMetrics) {
        tracing::info!(
            buckets = metrics.bucket_count(),
            messages = latest(&metrics.messages),
            active_viewers = latest(&metrics.active_viewers),
            online = latest(&metrics.online),
            revenue_total = metrics.revenue.values.iter().sum::<f64>(),
            new_viewers = latest(&metrics.new_viewers),
            "📈 Metrics refreshed"
        );
    }
}

fn latest(series: &MetricSeries) -> f64 {
    series.values.last().copied().unwrap_or(f64::NAN)
}

/// 更新のたびにNDJSONスナップショットを追記するパネル
#[derive(Debug)]
pub struct NdjsonPanel {
    path: PathBuf,
    status: PanelStatus,
    baselines: Baselines,
}

impl NdjsonPanel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: PanelStatus::NotLive,
            baselines: Baselines::default(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl StatsPanel for NdjsonPanel {
    async fn show_status(&mut self, status: PanelStatus) {
        self.status = status;
    }

    async fn update_baselines(&mut self, baselines: &Baselines) {
        self.baselines = *baselines;
    }

    async fn update_metrics(&mut self, metrics: &StreamMetrics) {
        let snapshot = StatsSnapshot {
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: self.status,
            metrics: metrics.clone(),
            baselines: self.baselines,
        };

        match append_snapshot(&self.path, &snapshot).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "💾 Snapshot saved");
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "❌ Failed to save snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MetricSeries;

    fn metrics_with_one_bucket() -> StreamMetrics {
        let labels = vec!["12:00".to_string()];
        StreamMetrics {
            messages: MetricSeries::new(labels.clone(), vec![3.0]),
            active_viewers: MetricSeries::new(labels.clone(), vec![2.0]),
            online: MetricSeries::new(labels.clone(), vec![50.0]),
            revenue: MetricSeries::new(labels.clone(), vec![0.0]),
            engagement: MetricSeries::new(labels.clone(), vec![f64::NAN]),
            new_viewers: MetricSeries::new(labels, vec![2.0]),
        }
    }

    #[tokio::test]
    async fn ndjson_panel_appends_one_line_per_refresh() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("panel.ndjson");
        let mut panel = NdjsonPanel::new(&path);

        panel.show_status(PanelStatus::Live).await;
        panel
            .update_baselines(&Baselines {
                message_rate: Some(10.0),
                active_viewers: None,
                online: None,
            })
            .await;
        panel.update_metrics(&metrics_with_one_bucket()).await;
        panel.update_metrics(&metrics_with_one_bucket()).await;

        let parsed = crate::io::snapshot::parse_snapshot_file(
            path.to_str().expect("utf-8 path"),
        )
        .expect("parse panel output");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].status, PanelStatus::Live);
        assert_eq!(parsed[0].baselines.message_rate, Some(10.0));
    }

    #[tokio::test]
    async fn log_panel_accepts_all_updates() {
        let mut panel = LogPanel::new();
        panel.show_status(PanelStatus::NotLive).await;
        panel.show_status(PanelStatus::NotLive).await;
        panel.show_status(PanelStatus::Live).await;
        panel.update_baselines(&Baselines::default()).await;
        panel.update_metrics(&metrics_with_one_bucket()).await;
    }
}
