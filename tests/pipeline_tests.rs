//! 集計パイプラインの統合テスト
//!
//! APIレスポンスの解析から6系列の集計・基準値計算までを一気通貫で確認する

use bilistat::api::ukamnads::parse_live;
use bilistat::{aggregate, compute_baselines, digest_stream, IntervalIndex, ViewerRegistry};

const T0: i64 = 1_700_000_000_000;
const MINUTE: i64 = 60_000;

/// 25分・3バケットぶんの既知データ。イベントはわざと時刻順に並べない
const LIVE_FIXTURE: &str = r#"{
    "code": 200,
    "data": {
        "data": {
            "danmakus": [
                {"type": 3, "sendDate": 1700001320000, "uId": 102, "price": 198.0},
                {"type": 0, "sendDate": 1700000000000, "uId": 101, "price": 0},
                {"type": 2, "sendDate": 1700000660000, "uId": 103, "price": 30.0},
                {"type": 0, "sendDate": 1700001440000, "uId": 104, "price": 0},
                {"type": 1, "sendDate": 1700000120000, "uId": 101, "price": 5.2},
                {"type": 0, "sendDate": 1700000600000, "uId": 101, "price": 0},
                {"type": 5, "sendDate": 1700000700000, "uId": 999, "price": 0},
                {"type": 0, "sendDate": 1700000060000, "uId": 102, "price": 0}
            ],
            "live": {
                "liveId": "live-fixture",
                "startDate": 1700000000000,
                "stopDate": 1700001800000,
                "danmakusCount": 4,
                "totalIncome": 233.2,
                "interactionCount": 4,
                "extra": {
                    "onlineRank": {
                        "1700000060000": 100,
                        "1700000120000": 110,
                        "1700000660000": 200
                    }
                }
            }
        }
    }
}"#;

fn close_to(actual: f64, expected: f64) -> bool {
    (actual - expected).abs() < 1e-9
}

#[test]
fn fixture_aggregates_into_three_known_buckets() {
    let data = parse_live(LIVE_FIXTURE).expect("parse fixture");
    // type 5 の1件は正規化で落ちる
    assert_eq!(data.events.len(), 7);

    let mut events = data.events.clone();
    events.sort_by_key(|event| event.timestamp);
    let first = events.first().expect("events present").timestamp;
    let last = events.last().expect("events present").timestamp;
    assert_eq!(first, T0);
    assert_eq!(last, T0 + 24 * MINUTE);

    let index = IntervalIndex::from_minutes(first, last, 10);
    assert_eq!(index.len(), 3);

    let mut registry = ViewerRegistry::default();
    let metrics = aggregate(&data.events, &data.online_samples, &index, &mut registry);

    assert_eq!(metrics.messages.values, vec![2.0, 1.0, 1.0]);
    assert_eq!(metrics.active_viewers.values, vec![2.0, 2.0, 2.0]);
    assert_eq!(metrics.revenue.values, vec![5.2, 30.0, 198.0]);
    assert_eq!(metrics.new_viewers.values, vec![2.0, 1.0, 1.0]);

    assert_eq!(metrics.online.values[0], 105.0);
    assert_eq!(metrics.online.values[1], 200.0);
    assert!(metrics.online.values[2].is_nan());

    // 先頭は常にNaN、2番目は 2人 / 平均200 = 0.010
    assert!(metrics.engagement.values[0].is_nan());
    assert_eq!(metrics.engagement.values[1], 0.010);
    assert!(metrics.engagement.values[2].is_nan());

    // 弾幕の総数はバケット割りで失われない
    let total_messages: f64 = metrics.messages.values.iter().sum();
    assert_eq!(total_messages, 4.0);
}

#[test]
fn historical_viewers_suppress_new_viewer_counts() {
    let data = parse_live(LIVE_FIXTURE).expect("parse fixture");
    let index = IntervalIndex::from_minutes(T0, T0 + 24 * MINUTE, 10);

    let mut registry = ViewerRegistry::default();
    registry.record_historical(103);
    let metrics = aggregate(&data.events, &data.online_samples, &index, &mut registry);

    // 103 は過去配信組なのでどのバケットでも新規にならない
    assert_eq!(metrics.new_viewers.values, vec![2.0, 0.0, 1.0]);

    let distinct_users = 4.0;
    let total_new: f64 = metrics.new_viewers.values.iter().sum();
    assert!(total_new <= distinct_users);
}

#[test]
fn fixture_doubles_as_a_baseline_stream() {
    let data = parse_live(LIVE_FIXTURE).expect("parse fixture");
    let mut registry = ViewerRegistry::default();
    let digest = digest_stream(&data, &mut registry);

    // 視聴者は全員履歴レジストリへ入る
    assert_eq!(registry.historical_count(), 4);
    assert!(registry.is_known(101));
    assert!(registry.is_known(104));

    let baselines = compute_baselines(&[digest], 10);

    // 4弾幕 / 30分 * 10分
    let message_rate = baselines.message_rate.expect("rate defined");
    assert!(close_to(message_rate, 4.0 / 3.0));

    // 3サンプルでは10%トリムは0件、平均 (100+110+200)/3
    let online = baselines.online.expect("online defined");
    assert!(close_to(online, 410.0 / 3.0));

    // 24分スロットを10分ごとに3チャンクへ: ユニーク数 {101,102}, {103}, {102,104}
    let active = baselines.active_viewers.expect("active defined");
    assert!(close_to(active, 5.0 / 3.0));
}

#[test]
fn baselines_stay_undefined_without_history() {
    let baselines = compute_baselines(&[], 10);
    assert_eq!(baselines.message_rate, None);
    assert_eq!(baselines.active_viewers, None);
    assert_eq!(baselines.online, None);
    assert!(baselines.is_empty());
}
