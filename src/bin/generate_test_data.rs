use std::fs::File;
use std::io::Write;

use rand::prelude::*;
use serde_json::json;

fn main() -> anyhow::Result<()> {
    // 実際のAPIレスポンス構造に合わせた45分配信ぶんのテストデータを生成
    let mut rng = rand::thread_rng();
    let start: i64 = 1_700_000_000_000;
    let duration_ms: i64 = 45 * 60_000;

    let viewer_pool: Vec<u64> = (0..80).map(|_| rng.gen_range(10_000..10_000_000)).collect();

    let mut danmakus = Vec::new();
    let mut message_count: u64 = 0;
    let mut total_income = 0.0;
    let mut seen_viewers = std::collections::HashSet::new();

    for _ in 0..600 {
        let send_date = start + rng.gen_range(0..duration_ms);
        let u_id = viewer_pool[rng.gen_range(0..viewer_pool.len())];
        seen_viewers.insert(u_id);

        // おおよそ9割が弾幕、残りをギフト・スパチャ・艦長で割る
        let kind = match rng.gen_range(0..100) {
            0..=89 => 0,
            90..=95 => 1,
            96..=98 => 2,
            _ => 3,
        };
        let price = match kind {
            0 => 0.0,
            1 => [0.1, 1.0, 5.2][rng.gen_range(0..3)],
            2 => [30.0, 50.0, 100.0][rng.gen_range(0..3)],
            _ => 198.0,
        };

        if kind == 0 {
            message_count += 1;
        } else {
            total_income += price;
        }

        danmakus.push(json!({
            "type": kind,
            "sendDate": send_date,
            "uId": u_id,
            "price": price,
        }));
    }

    let mut online_rank = serde_json::Map::new();
    for minute in 0..45 {
        let ts = start + minute * 60_000;
        online_rank.insert(ts.to_string(), json!(rng.gen_range(80..220)));
    }

    let payload = json!({
        "code": 200,
        "data": {
            "data": {
                "danmakus": danmakus,
                "live": {
                    "liveId": "31349978573",
                    "startDate": start,
                    "stopDate": start + duration_ms,
                    "danmakusCount": message_count,
                    "totalIncome": total_income,
                    "interactionCount": seen_viewers.len(),
                    "extra": {"onlineRank": online_rank},
                }
            }
        }
    });

    std::fs::create_dir_all("tests/data")?;
    let mut file = File::create("tests/data/live_sample.json")?;
    writeln!(file, "{}", serde_json::to_string_pretty(&payload)?)?;

    println!("✅ テストデータファイルを生成しました: tests/data/live_sample.json");
    Ok(())
}
