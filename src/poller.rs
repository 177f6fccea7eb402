//! 配信監視のステートマシン
//!
//! OFFLINE →（配信検出）→ DETECTING →（基準値計算）→ POLLING →
//! 配信終了で OFFLINE へ戻る。再帰ではなく明示的なループ + sleep で駆動し、
//! 可変な集計状態（視聴者レジストリと基準値）はすべてこの構造体が所有して
//! 参照渡しする。
//!
//! 既知の制約: 過去配信の取得は成功するまで固定間隔で再試行し続ける
//! （回数上限・バックオフ増加なし）。持続的な部分障害では DETECTING に
//! 留まり続ける。

use futures_util::future;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::analytics::{
    aggregate, compute_baselines, digest_stream, Baselines, IntervalIndex, ViewerRegistry,
};
use crate::api::bilibili::{LiveStatus, RoomId};
use crate::api::client::StatsApi;
use crate::api::ukamnads::{LiveId, StreamData, Uid};
use crate::config::{AppConfig, PollConfig};
use crate::display::{PanelStatus, StatsPanel};

/// ポーリングの現在状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerState {
    /// 未配信。一定間隔で配信開始を監視
    Offline,
    /// 配信検出済み。チャンネル解決と基準値計算の途中
    Detecting { uid: Uid },
    /// 配信中。イベント列を定期再取得して集計
    Polling { live_id: LiveId },
}

/// 1部屋ぶんの監視ループ
pub struct StreamPoller<C, P> {
    client: C,
    panel: P,
    room_id: RoomId,
    bucket_minutes: u32,
    lookback_count: usize,
    poll: PollConfig,
    registry: ViewerRegistry,
    baselines: Baselines,
    state: PollerState,
}

impl<C: StatsApi, P: StatsPanel> StreamPoller<C, P> {
    pub fn new(client: C, panel: P, room_id: RoomId, config: &AppConfig) -> Self {
        Self {
            client,
            panel,
            room_id,
            bucket_minutes: config.bucket_minutes,
            lookback_count: config.lookback_count,
            poll: config.poll.clone(),
            registry: ViewerRegistry::default(),
            baselines: Baselines::default(),
            state: PollerState::Offline,
        }
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    pub fn baselines(&self) -> Baselines {
        self.baselines
    }

    /// プロセスが生きている限り回り続ける監視ループ
    pub async fn run(mut self) {
        info!(room_id = %self.room_id, "🚀 Stream poller started");
        loop {
            self.step().await;
        }
    }

    /// ステートマシンを1遷移ぶんだけ進める（必要な待機を含む）
    pub async fn step(&mut self) {
        match self.state.clone() {
            PollerState::Offline => self.step_offline().await,
            PollerState::Detecting { uid } => self.step_detecting(uid).await,
            PollerState::Polling { live_id } => self.step_polling(live_id).await,
        }
    }

    async fn step_offline(&mut self) {
        match self.client.live_status(self.room_id).await {
            LiveStatus::Live { uid } => {
                info!(room_id = %self.room_id, uid = %uid, "🔴 Room went live");
                self.state = PollerState::Detecting { uid };
            }
            LiveStatus::Offline => {
                self.panel.show_status(PanelStatus::NotLive).await;
                sleep(self.poll.offline()).await;
            }
        }
    }

    async fn step_detecting(&mut self, uid: Uid) {
        let channel = match self.client.get_channel(uid).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(uid = %uid, error = %e, "⚠️ Failed to resolve channel, retrying");
                sleep(self.poll.detect_retry()).await;
                return;
            }
        };

        let Some(live_id) = channel.living_live_id else {
            // 配信状態APIとチャンネルAPIの反映ラグがあるので待って引き直す
            debug!(uid = %uid, "Channel not reporting a live session yet");
            sleep(self.poll.detect_retry()).await;
            return;
        };

        let recent: Vec<LiveId> = channel
            .live_ids
            .iter()
            .skip(1) // 先頭は進行中の配信
            .take(self.lookback_count)
            .cloned()
            .collect();

        info!(
            uid = %uid,
            live_id = %live_id,
            lookback = recent.len(),
            "👀 Live session detected, computing baselines"
        );

        let streams = self.fetch_recent_streams(recent).await;

        self.registry.reset();
        let digests: Vec<_> = streams
            .iter()
            .map(|stream| digest_stream(stream, &mut self.registry))
            .collect();
        self.baselines = compute_baselines(&digests, self.bucket_minutes);

        info!(
            streams = digests.len(),
            historical_viewers = self.registry.historical_count(),
            message_rate = ?self.baselines.message_rate,
            active_viewers = ?self.baselines.active_viewers,
            online = ?self.baselines.online,
            "📐 Baselines ready"
        );

        self.panel.update_baselines(&self.baselines).await;
        self.state = PollerState::Polling { live_id };
    }

    async fn step_polling(&mut self, live_id: LiveId) {
        // 各周期の頭で配信継続を確認する
        match self.client.live_status(self.room_id).await {
            LiveStatus::Live { .. } => {}
            LiveStatus::Offline => {
                info!(live_id = %live_id, "🏁 Stream ended, back to offline watch");
                self.state = PollerState::Offline;
                self.panel.show_status(PanelStatus::NotLive).await;
                return;
            }
        }

        let mut data = match self.client.get_live(&live_id).await {
            Ok(data) => data,
            Err(e) => {
                error!(live_id = %live_id, error = %e, "❌ Failed to fetch stream data");
                self.panel.show_status(PanelStatus::FetchFailed).await;
                sleep(self.poll.live()).await;
                return;
            }
        };

        data.events.sort_by_key(|event| event.timestamp);
        let span = data
            .events
            .first()
            .zip(data.events.last())
            .map(|(first, last)| (first.timestamp, last.timestamp));
        let Some((first_ts, last_ts)) = span else {
            // 配信開始直後でイベントが無い。表示は変えずに短い間隔で再取得
            debug!(live_id = %live_id, "📪 No events yet, retrying shortly");
            sleep(self.poll.empty()).await;
            return;
        };

        let index = IntervalIndex::from_minutes(first_ts, last_ts, self.bucket_minutes);
        let metrics = aggregate(
            &data.events,
            &data.online_samples,
            &index,
            &mut self.registry,
        );

        debug!(
            live_id = %live_id,
            events = data.events.len(),
            buckets = metrics.bucket_count(),
            "📈 Aggregation pass finished"
        );

        self.panel.show_status(PanelStatus::Live).await;
        self.panel.update_metrics(&metrics).await;
        sleep(self.poll.live()).await;
    }

    /// 直近配信をまとめて取得する。失敗した分だけを固定間隔で
    /// 取り直し、全件そろうまで繰り返す（上限なし）
    async fn fetch_recent_streams(&self, ids: Vec<LiveId>) -> Vec<StreamData> {
        let mut pending = ids;
        let mut fetched = Vec::new();

        while !pending.is_empty() {
            let results =
                future::join_all(pending.iter().map(|id| self.client.get_live(id))).await;

            let mut failed = Vec::new();
            for (live_id, result) in pending.into_iter().zip(results) {
                match result {
                    Ok(data) => fetched.push(data),
                    Err(e) => {
                        warn!(live_id = %live_id, error = %e, "⚠️ Failed to fetch a recent stream");
                        failed.push(live_id);
                    }
                }
            }

            if failed.is_empty() {
                break;
            }

            warn!(
                remaining = failed.len(),
                backoff_secs = self.poll.retry_backoff_secs,
                "⏳ Retrying failed stream fetches"
            );
            pending = failed;
            sleep(self.poll.retry_backoff()).await;
        }

        fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::StatsApi;
    use crate::api::ukamnads::{ChannelInfo, FetchError};
    use crate::display::LogPanel;
    use async_trait::async_trait;

    struct OfflineApi;

    #[async_trait]
    impl StatsApi for OfflineApi {
        async fn live_status(&self, _room_id: RoomId) -> LiveStatus {
            LiveStatus::Offline
        }

        async fn get_channel(&self, _uid: Uid) -> Result<ChannelInfo, FetchError> {
            Err(FetchError::MissingData)
        }

        async fn get_live(&self, _live_id: &LiveId) -> Result<StreamData, FetchError> {
            Err(FetchError::MissingData)
        }
    }

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.poll.live_secs = 0;
        config.poll.offline_secs = 0;
        config.poll.empty_secs = 0;
        config.poll.detect_retry_secs = 0;
        config.poll.retry_backoff_secs = 0;
        config
    }

    #[test]
    fn poller_starts_offline() {
        let poller = StreamPoller::new(OfflineApi, LogPanel::new(), RoomId(1), &fast_config());
        assert_eq!(*poller.state(), PollerState::Offline);
        assert!(poller.baselines().is_empty());
    }

    #[tokio::test]
    async fn offline_room_stays_offline() {
        let mut poller = StreamPoller::new(OfflineApi, LogPanel::new(), RoomId(1), &fast_config());
        poller.step().await;
        assert_eq!(*poller.state(), PollerState::Offline);
    }
}
