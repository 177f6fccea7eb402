//! 配信1本分のイベント列を6系列のメトリクスへ集計する
//!
//! 系列は弾幕数・アクティブ視聴者数・高能（オンライン）平均・営収・
//! 互動/高能比・新規視聴者数。欠損バケットは例外ではなく NaN で表現し、
//! 描画側は NaN を「データなし」として扱う。

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::baseline::ViewerRegistry;
use super::interval::IntervalIndex;
use crate::api::ukamnads::{ChatEvent, EventKind};

/// バケットラベルと値が1:1で並ぶ1本のメトリクス系列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub labels: Vec<String>,
    /// NaN は「データなし」。JSONでは null として往復する
    #[serde(with = "nan_as_null")]
    pub values: Vec<f64>,
}

impl MetricSeries {
    pub fn new(labels: Vec<String>, values: Vec<f64>) -> Self {
        Self { labels, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 1回の集計で得られる6系列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMetrics {
    /// 弾幕数
    pub messages: MetricSeries,
    /// アクティブ視聴者数（ユニークuId）
    pub active_viewers: MetricSeries,
    /// 高能ランキング人数の平均
    pub online: MetricSeries,
    /// 営収
    pub revenue: MetricSeries,
    /// 互動/高能比
    pub engagement: MetricSeries,
    /// 新規視聴者数
    pub new_viewers: MetricSeries,
}

impl StreamMetrics {
    pub fn bucket_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// イベント列と高能サンプルをバケット集計する。
///
/// イベントは時刻順が保証されないのでここでソートする。新規視聴者の判定は
/// 時刻順の初出だけを数える必要があるため、ソート後の1パスで registry に
/// 問い合わせる。ポーリングのたびに全イベントを取り直す前提なので、
/// セッション内既出集合はパスごとに作り直される。
pub fn aggregate(
    events: &[ChatEvent],
    online_samples: &BTreeMap<i64, u32>,
    index: &IntervalIndex,
    registry: &mut ViewerRegistry,
) -> StreamMetrics {
    let buckets = index.len();
    if buckets == 0 {
        return StreamMetrics::default();
    }

    let mut messages = vec![0u64; buckets];
    let mut active: Vec<HashSet<u64>> = vec![HashSet::new(); buckets];
    let mut revenue = vec![0f64; buckets];
    let mut new_viewers = vec![0u64; buckets];
    let mut samples: Vec<Vec<u32>> = vec![Vec::new(); buckets];

    let mut ordered: Vec<&ChatEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.timestamp);

    registry.begin_pass();
    for event in ordered {
        let Some(slot) = index.locate(event.timestamp) else {
            continue;
        };

        match event.kind {
            EventKind::Message => messages[slot] += 1,
            _ => revenue[slot] += event.price,
        }
        active[slot].insert(event.user_id);
        if registry.observe(event.user_id) {
            new_viewers[slot] += 1;
        }
    }

    for (&timestamp, &count) in online_samples {
        if let Some(slot) = index.locate(timestamp) {
            samples[slot].push(count);
        }
    }

    let labels = index.labels();
    let active_counts: Vec<f64> = active.iter().map(|set| set.len() as f64).collect();
    let online_means: Vec<f64> = samples.iter().map(|bucket| mean(bucket)).collect();

    let engagement: Vec<f64> = online_means
        .iter()
        .enumerate()
        .map(|(slot, &online_mean)| {
            if slot == 0 {
                // 先頭バケットは比較対象がないため常にデータなし扱い
                f64::NAN
            } else {
                round_to(active_counts[slot] / online_mean, 3)
            }
        })
        .collect();

    StreamMetrics {
        messages: MetricSeries::new(labels.clone(), messages.iter().map(|&n| n as f64).collect()),
        active_viewers: MetricSeries::new(labels.clone(), active_counts),
        online: MetricSeries::new(
            labels.clone(),
            online_means.iter().map(|&m| round_to(m, 1)).collect(),
        ),
        revenue: MetricSeries::new(labels.clone(), revenue),
        engagement: MetricSeries::new(labels.clone(), engagement),
        new_viewers: MetricSeries::new(labels, new_viewers.iter().map(|&n| n as f64).collect()),
    }
}

fn mean(samples: &[u32]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().map(|&s| f64::from(s)).sum::<f64>() / samples.len() as f64
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// NaN/非有限値を null に落として往復させる
mod nan_as_null {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for &value in values {
            if value.is_finite() {
                seq.serialize_element(&Some(value))?;
            } else {
                seq.serialize_element(&None::<f64>)?;
            }
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}
