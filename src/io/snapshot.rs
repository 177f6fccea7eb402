//! NDJSON snapshot persistence.
//!
//! Every poller refresh can be appended as one JSON line, giving a replayable
//! record of the series and baselines the panel displayed.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::analytics::{Baselines, StreamMetrics};
use crate::display::PanelStatus;

/// Error types for snapshot file I/O and parsing.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// I/O error when reading or writing files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error with the offending line
    #[error("JSON parsing error at line {line}: {source}")]
    JsonParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialize(serde_json::Error),

    /// Empty or invalid data
    #[error("No valid data found: {context}")]
    NoData { context: String },
}

/// One refresh worth of display state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Unix timestamp (milliseconds) when the snapshot was taken
    pub timestamp: i64,
    pub status: PanelStatus,
    pub metrics: StreamMetrics,
    pub baselines: Baselines,
}

/// Append one snapshot as a JSON line.
pub async fn append_snapshot(
    path: impl AsRef<Path>,
    snapshot: &StatsSnapshot,
) -> Result<(), SnapshotError> {
    let json_line = serde_json::to_string(snapshot).map_err(SnapshotError::Serialize)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .await?;

    file.write_all(format!("{}\n", json_line).as_bytes()).await?;
    file.flush().await?;

    Ok(())
}

/// Parse an NDJSON snapshot file back into memory.
///
/// Blank lines are skipped; a malformed line fails with its line number.
pub fn parse_snapshot_file(path: &str) -> Result<Vec<StatsSnapshot>, SnapshotError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;

        if line.trim().is_empty() {
            continue;
        }

        let entry: StatsSnapshot =
            serde_json::from_str(&line).map_err(|e| SnapshotError::JsonParse {
                line: line_number + 1,
                source: e,
            })?;
        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(SnapshotError::NoData {
            context: format!("No snapshots found in file '{}'", path),
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MetricSeries;

    fn sample_snapshot() -> StatsSnapshot {
        let labels = vec!["12:00".to_string(), "12:10".to_string()];
        StatsSnapshot {
            timestamp: 1_700_000_000_000,
            status: PanelStatus::Live,
            metrics: StreamMetrics {
                messages: MetricSeries::new(labels.clone(), vec![12.0, 7.0]),
                active_viewers: MetricSeries::new(labels.clone(), vec![5.0, 4.0]),
                online: MetricSeries::new(labels.clone(), vec![100.5, f64::NAN]),
                revenue: MetricSeries::new(labels.clone(), vec![0.0, 52.0]),
                engagement: MetricSeries::new(labels.clone(), vec![f64::NAN, 0.04]),
                new_viewers: MetricSeries::new(labels, vec![5.0, 1.0]),
            },
            baselines: Baselines {
                message_rate: Some(80.0),
                active_viewers: Some(6.5),
                online: None,
            },
        }
    }

    #[tokio::test]
    async fn snapshots_round_trip_through_ndjson() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("snapshots.ndjson");

        append_snapshot(&path, &sample_snapshot())
            .await
            .expect("append first snapshot");
        append_snapshot(&path, &sample_snapshot())
            .await
            .expect("append second snapshot");

        let parsed =
            parse_snapshot_file(path.to_str().expect("utf-8 path")).expect("parse file back");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].status, PanelStatus::Live);
        assert_eq!(parsed[0].metrics.messages.values, vec![12.0, 7.0]);
        // NaN は null 経由で NaN に戻る
        assert!(parsed[0].metrics.online.values[1].is_nan());
        assert!(parsed[0].metrics.engagement.values[0].is_nan());
        assert_eq!(parsed[0].baselines.online, None);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("snapshots.ndjson");
        let line = serde_json::to_string(&sample_snapshot()).expect("serialize snapshot");
        std::fs::write(&path, format!("{}\n\n   \n{}\n", line, line)).expect("write file");

        let parsed =
            parse_snapshot_file(path.to_str().expect("utf-8 path")).expect("parse file back");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn malformed_line_reports_its_position() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("snapshots.ndjson");
        let line = serde_json::to_string(&sample_snapshot()).expect("serialize snapshot");
        std::fs::write(&path, format!("{}\n{{not json\n", line)).expect("write file");

        match parse_snapshot_file(path.to_str().expect("utf-8 path")) {
            Err(SnapshotError::JsonParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected JsonParse error, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("snapshots.ndjson");
        std::fs::write(&path, "").expect("write file");

        assert!(matches!(
            parse_snapshot_file(path.to_str().expect("utf-8 path")),
            Err(SnapshotError::NoData { .. })
        ));
    }
}
