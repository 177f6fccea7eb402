//! 統合APIクライアント実装
//!
//! 統計API（ukamnads）と配信状態API（Bilibili）を1つのreqwestクライアントで
//! まとめて扱う。ベースURLを差し替えられるのでモックサーバーでの試験も可能。

use std::time::Duration;

use async_trait::async_trait;

use super::bilibili::{parse_live_status, LiveStatus, RoomId};
use super::ukamnads::{
    parse_channel, parse_live, ChannelInfo, FetchError, LiveId, StreamData, Uid,
};

pub const DEFAULT_STATS_BASE_URL: &str = "https://api.ukamnads.icu/api/v2";
pub const DEFAULT_LIVENESS_BASE_URL: &str = "https://api.live.bilibili.com";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// リモートAPI境界。ポーリング側はこのトレイト越しにだけ外部へ出る
#[async_trait]
pub trait StatsApi: Send + Sync {
    /// 配信状態を確認する。ネットワーク・解析失敗は Offline に畳む
    async fn live_status(&self, room_id: RoomId) -> LiveStatus;

    /// チャンネルの配信中ID・直近配信ID一覧を取得する
    async fn get_channel(&self, uid: Uid) -> Result<ChannelInfo, FetchError>;

    /// 1配信分のイベント列と高能サンプルを取得する
    async fn get_live(&self, live_id: &LiveId) -> Result<StreamData, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    stats_base_url: String,
    liveness_base_url: String,
}

impl ApiClient {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_urls(DEFAULT_STATS_BASE_URL, DEFAULT_LIVENESS_BASE_URL)
    }

    pub fn with_base_urls(
        stats_base_url: impl Into<String>,
        liveness_base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            stats_base_url: stats_base_url.into(),
            liveness_base_url: liveness_base_url.into(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let started = std::time::Instant::now();
        let body = self.http.get(url).send().await?.text().await?;

        tracing::debug!(
            url = %url,
            response_size_bytes = body.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "📡 API response received"
        );

        Ok(body)
    }
}

#[async_trait]
impl StatsApi for ApiClient {
    async fn live_status(&self, room_id: RoomId) -> LiveStatus {
        let url = format!(
            "{}/xlive/web-room/v1/index/getInfoByRoom?room_id={}",
            self.liveness_base_url, room_id
        );

        match self.get_text(&url).await {
            Ok(body) => parse_live_status(&body),
            Err(e) => {
                tracing::debug!(error = %e, "Liveness check failed, treating as offline");
                LiveStatus::Offline
            }
        }
    }

    async fn get_channel(&self, uid: Uid) -> Result<ChannelInfo, FetchError> {
        let url = format!("{}/channel?uid={}", self.stats_base_url, uid);
        let body = self.get_text(&url).await?;
        parse_channel(&body)
    }

    async fn get_live(&self, live_id: &LiveId) -> Result<StreamData, FetchError> {
        let url = format!(
            "{}/live?includeExtra=true&liveId={}",
            self.stats_base_url, live_id
        );
        let body = self.get_text(&url).await?;
        parse_live(&body)
    }
}
