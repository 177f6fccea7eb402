//! 過去配信からの基準値（ベースライン）計算
//!
//! 直近N配信を取り込み、弾幕レート・ウィンドウあたりユニーク視聴者数・
//! 高能人数の3つのスカラー基準値を出す。履歴に現れた視聴者は
//! [`ViewerRegistry`] に記録され、現在配信の新規視聴者判定から除外される。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::api::ukamnads::StreamData;

const MINUTE_MS: i64 = 60_000;

/// 視聴者レジストリ。履歴視聴者集合と、集計パス内の既出集合を持つ。
/// 新しい配信を検出したら [`reset`](Self::reset) で作り直す。
#[derive(Debug, Clone, Default)]
pub struct ViewerRegistry {
    historical: HashSet<u64>,
    session: HashSet<u64>,
}

impl ViewerRegistry {
    /// 新しい配信セッションの開始。両集合を空に戻す
    pub fn reset(&mut self) {
        self.historical.clear();
        self.session.clear();
    }

    /// 過去配信で見かけた視聴者を記録する
    pub fn record_historical(&mut self, user_id: u64) {
        self.historical.insert(user_id);
    }

    pub fn is_known(&self, user_id: u64) -> bool {
        self.historical.contains(&user_id)
    }

    pub fn historical_count(&self) -> usize {
        self.historical.len()
    }

    /// 集計パスの開始。イベント全件を毎回取り直す前提なので、
    /// セッション内既出集合はパスごとに空から積み直す
    pub fn begin_pass(&mut self) {
        self.session.clear();
    }

    /// 視聴者の出現を1件記録し、セッション内でも履歴でも初見なら true
    pub fn observe(&mut self, user_id: u64) -> bool {
        let fresh = !self.session.contains(&user_id) && !self.historical.contains(&user_id);
        self.session.insert(user_id);
        fresh
    }
}

/// 過去配信1本分のダイジェスト
#[derive(Debug, Clone)]
pub struct HistoricalStream {
    pub start_time: i64,
    pub end_time: i64,
    /// メタデータ上の総弾幕数
    pub message_count: u64,
    /// 先頭イベントを起点とした1分刻みのユニーク視聴者タイムライン。
    /// イベントのない分も空集合で埋める
    pub viewer_timeline: Vec<HashSet<u64>>,
    /// 下位10%トリム済みの高能平均。サンプルなしは NaN
    pub online_mean: f64,
}

impl HistoricalStream {
    pub fn duration_minutes(&self) -> f64 {
        (self.end_time - self.start_time).max(0) as f64 / MINUTE_MS as f64
    }
}

/// メトリクスごとのスカラー基準値。データ不足のものは None（表示しない）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    /// ウィンドウ幅あたりの弾幕数
    pub message_rate: Option<f64>,
    /// ウィンドウ幅あたりのユニーク視聴者数
    pub active_viewers: Option<f64>,
    /// 高能人数
    pub online: Option<f64>,
}

impl Baselines {
    pub fn is_empty(&self) -> bool {
        self.message_rate.is_none() && self.active_viewers.is_none() && self.online.is_none()
    }
}

/// 過去配信1本をダイジェスト化し、視聴者を履歴レジストリへ記録する
pub fn digest_stream(data: &StreamData, registry: &mut ViewerRegistry) -> HistoricalStream {
    let mut ordered: Vec<_> = data.events.iter().collect();
    ordered.sort_by_key(|event| event.timestamp);

    for event in &ordered {
        registry.record_historical(event.user_id);
    }

    let mut timeline = Vec::new();
    if let Some(first) = ordered.first() {
        let mut slot_start = first.timestamp;
        let mut current = HashSet::new();
        for event in &ordered {
            while event.timestamp - slot_start > MINUTE_MS {
                timeline.push(std::mem::take(&mut current));
                slot_start += MINUTE_MS;
            }
            current.insert(event.user_id);
        }
        timeline.push(current);
    }

    let samples: Vec<u32> = data.online_samples.values().copied().collect();

    HistoricalStream {
        start_time: data.info.start_time,
        end_time: data.info.stop_time.unwrap_or(data.info.start_time),
        message_count: data.info.message_count,
        viewer_timeline: timeline,
        online_mean: trimmed_low_mean(&samples),
    }
}

/// 直近配信群から3つの基準値を計算する
pub fn compute_baselines(streams: &[HistoricalStream], window_minutes: u32) -> Baselines {
    let total_messages: u64 = streams.iter().map(|s| s.message_count).sum();
    let total_minutes: f64 = streams.iter().map(|s| s.duration_minutes()).sum();
    let message_rate = if total_minutes > 0.0 {
        Some(total_messages as f64 / total_minutes * f64::from(window_minutes))
    } else {
        None
    };

    let window = window_minutes.max(1) as usize;
    let mut chunk_cardinalities = Vec::new();
    for stream in streams {
        for chunk in stream.viewer_timeline.chunks(window) {
            let mut merged = HashSet::new();
            for slot in chunk {
                merged.extend(slot.iter().copied());
            }
            chunk_cardinalities.push(merged.len() as f64);
        }
    }
    let active_viewers = if chunk_cardinalities.is_empty() {
        None
    } else {
        Some(chunk_cardinalities.iter().sum::<f64>() / chunk_cardinalities.len() as f64)
    };

    // サンプルのない配信（NaN）は外側の平均から除外する
    let session_means: Vec<f64> = streams
        .iter()
        .map(|s| s.online_mean)
        .filter(|mean| !mean.is_nan())
        .collect();
    let online = if session_means.is_empty() {
        None
    } else {
        Some(session_means.iter().sum::<f64>() / session_means.len() as f64)
    };

    Baselines {
        message_rate,
        active_viewers,
        online,
    }
}

/// 下位10%（件数は切り捨て）だけを落とす非対称トリム平均。
/// 配信開始直後や配信事故の一時的な落ち込みを均す。上位側は刈らない
fn trimmed_low_mean(samples: &[u32]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let dropped = sorted.len() / 10;
    let kept = &sorted[dropped..];
    kept.iter().map(|&v| f64::from(v)).sum::<f64>() / kept.len() as f64
}
