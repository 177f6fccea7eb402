//! Bilibili直播間の配信状態チェック
//!
//! `getInfoByRoom` の応答から配信中かどうかと配信者UIDを引く。応答が解析
//! できない場合は保守的に「未配信」として扱う（ポーリング側は次周期で再試行）。

use serde::Deserialize;

use super::ukamnads::Uid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub struct RoomId(pub u64);

/// 配信状態。判定不能も Offline に畳む
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Live { uid: Uid },
    Offline,
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live { .. })
    }
}

#[derive(Debug, Deserialize)]
struct RoomInfoResponse {
    #[serde(default)]
    data: Option<RoomInfoData>,
}

#[derive(Debug, Deserialize)]
struct RoomInfoData {
    #[serde(default)]
    room_info: Option<RoomInfo>,
}

#[derive(Debug, Deserialize)]
struct RoomInfo {
    live_status: i32,
    uid: u64,
}

/// `getInfoByRoom` レスポンスを解析する。壊れた応答は Offline
pub fn parse_live_status(body: &str) -> LiveStatus {
    let response: RoomInfoResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse room info, treating as offline");
            return LiveStatus::Offline;
        }
    };

    match response.data.and_then(|d| d.room_info) {
        // live_status: 0 = 未配信, 1 = 配信中, 2 = 輪播
        Some(info) if info.live_status == 1 => LiveStatus::Live {
            uid: Uid(info.uid),
        },
        _ => LiveStatus::Offline,
    }
}
