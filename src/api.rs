pub mod bilibili; // 配信状態チェック（Bilibili直播間API）
pub mod client; // 統合APIクライアント実装
pub mod ukamnads; // 統計データAPI（ukamnads v2）
