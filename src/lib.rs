pub mod analytics;
pub mod api;
pub mod config;
pub mod display;
pub mod io;
pub mod poller;
pub mod utils;

// Re-export the main error types for convenience
pub use api::ukamnads::FetchError;
pub use io::SnapshotError;

// Re-export the remote boundary
pub use api::bilibili::{LiveStatus, RoomId};
pub use api::client::{ApiClient, StatsApi};
pub use api::ukamnads::{ChannelInfo, ChatEvent, EventKind, LiveId, StreamData, StreamInfo, Uid};

// Re-export analytics modules
pub use analytics::{
    aggregate, compute_baselines, digest_stream, Baselines, HistoricalStream, IntervalIndex,
    MetricSeries, StreamMetrics, ViewerRegistry,
};

// Re-export the presentation boundary and orchestration
pub use config::{AppConfig, ConfigManager};
pub use display::{LogPanel, NdjsonPanel, PanelStatus, StatsPanel};
pub use io::snapshot::{append_snapshot, parse_snapshot_file, StatsSnapshot};
pub use poller::{PollerState, StreamPoller};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Test that the main modules are accessible
        assert!(std::any::type_name::<api::client::ApiClient>().contains("ApiClient"));
        assert!(std::any::type_name::<analytics::IntervalIndex>().contains("IntervalIndex"));
    }

    #[test]
    fn test_error_types_re_exported() {
        // Test that error types are available from the crate root
        let _fetch_error = FetchError::MissingData;
        let _snapshot_error = SnapshotError::NoData {
            context: "test".to_string(),
        };
    }

    #[test]
    fn test_public_api_availability() {
        // Test that key public types are constructible from the crate root
        let _room = RoomId(21_452_505);
        let _uid = Uid(672_328_094);
        let _live = LiveId::new("31349978573");
        let _registry = ViewerRegistry::default();
        let _baselines = Baselines::default();
        let _series = MetricSeries::default();
        let _config = AppConfig::default();
    }
}
