//! ukamnads統計APIのレスポンス解析
//!
//! `/channel?uid=` と `/live?includeExtra=true&liveId=` の2エンドポイントを
//! 型付きのドメインモデルへ正規化する。HTTP送信は `client` モジュール側。

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Request failed")]
    Request(#[from] reqwest::Error),
    #[error("Failed to parse JSON")]
    Parse(#[from] serde_json::Error),
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },
    #[error("Response payload is missing data")]
    MissingData,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Uid(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveId(pub String);

impl LiveId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// イベント種別。ワイヤ上の type 0〜3 に対応し、それ以外は正規化時に捨てる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// 弾幕コメント（type 0、金額なし）
    Message,
    /// ギフト（type 1）
    Gift,
    /// スーパーチャット（type 2）
    SuperChat,
    /// 艦長購入（type 3）
    GuardPurchase,
}

impl EventKind {
    fn from_wire(code: i32) -> Option<Self> {
        match code {
            0 => Some(EventKind::Message),
            1 => Some(EventKind::Gift),
            2 => Some(EventKind::SuperChat),
            3 => Some(EventKind::GuardPurchase),
            _ => None,
        }
    }
}

/// 正規化済みのチャットイベント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatEvent {
    pub kind: EventKind,
    /// エポックミリ秒
    pub timestamp: i64,
    pub user_id: u64,
    /// Message は常に 0
    pub price: f64,
}

/// 配信セッションのメタデータ
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub live_id: LiveId,
    pub start_time: i64,
    /// 配信中は None
    pub stop_time: Option<i64>,
    pub message_count: u64,
    pub total_income: f64,
    pub interaction_count: u64,
}

/// 1配信分のフルペイロード（イベント列 + 高能サンプル）
#[derive(Debug, Clone)]
pub struct StreamData {
    pub info: StreamInfo,
    /// ワイヤ順のまま。時刻順は保証されない
    pub events: Vec<ChatEvent>,
    /// タイムスタンプ（ミリ秒）→ オンライン人数
    pub online_samples: BTreeMap<i64, u32>,
}

/// チャンネル情報（配信中IDと直近の配信ID一覧）
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub living_live_id: Option<LiveId>,
    /// 新しい順。配信中の場合は先頭が現在の配信
    pub live_ids: Vec<LiveId>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i32,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self) -> Result<T, FetchError> {
        if self.code != 200 {
            return Err(FetchError::Api {
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        self.data.ok_or(FetchError::MissingData)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChannelData {
    channel: ChannelMeta,
    #[serde(default)]
    lives: Vec<LiveSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelMeta {
    #[serde(default)]
    living_info: Option<LivingInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LivingInfo {
    live_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveSummary {
    live_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct LiveOuter {
    data: LiveDetail,
}

#[derive(Debug, Default, Deserialize)]
struct LiveDetail {
    #[serde(default)]
    danmakus: Vec<DanmakuDto>,
    live: LiveMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DanmakuDto {
    #[serde(rename = "type")]
    kind: i32,
    send_date: i64,
    u_id: u64,
    #[serde(default)]
    price: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveMeta {
    live_id: String,
    start_date: i64,
    #[serde(default)]
    stop_date: Option<i64>,
    #[serde(default)]
    danmakus_count: u64,
    #[serde(default)]
    total_income: f64,
    #[serde(default)]
    interaction_count: u64,
    #[serde(default)]
    extra: LiveExtra,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveExtra {
    #[serde(default)]
    online_rank: HashMap<String, u32>,
}

/// `/channel` レスポンスを解析する
pub fn parse_channel(body: &str) -> Result<ChannelInfo, FetchError> {
    let envelope: ApiEnvelope<ChannelData> = serde_json::from_str(body)?;
    let data = envelope.into_data()?;

    Ok(ChannelInfo {
        living_live_id: data.channel.living_info.map(|info| LiveId(info.live_id)),
        live_ids: data.lives.into_iter().map(|s| LiveId(s.live_id)).collect(),
    })
}

/// `/live` レスポンスを解析して正規化する
pub fn parse_live(body: &str) -> Result<StreamData, FetchError> {
    let envelope: ApiEnvelope<LiveOuter> = serde_json::from_str(body)?;
    let detail = envelope.into_data()?.data;

    let events = detail
        .danmakus
        .iter()
        .filter_map(normalize_event)
        .collect();

    let mut online_samples = BTreeMap::new();
    for (timestamp, count) in detail.live.extra.online_rank {
        match timestamp.parse::<i64>() {
            Ok(ts) => {
                online_samples.insert(ts, count);
            }
            Err(_) => {
                tracing::debug!(key = %timestamp, "Skipping unparsable onlineRank key");
            }
        }
    }

    Ok(StreamData {
        info: StreamInfo {
            live_id: LiveId(detail.live.live_id),
            start_time: detail.live.start_date,
            stop_time: detail.live.stop_date.filter(|&t| t > 0),
            message_count: detail.live.danmakus_count,
            total_income: detail.live.total_income,
            interaction_count: detail.live.interaction_count,
        },
        events,
        online_samples,
    })
}

fn normalize_event(dto: &DanmakuDto) -> Option<ChatEvent> {
    let kind = EventKind::from_wire(dto.kind)?;
    let price = match kind {
        EventKind::Message => 0.0,
        _ => dto.price,
    };
    Some(ChatEvent {
        kind,
        timestamp: dto.send_date,
        user_id: dto.u_id,
        price,
    })
}
