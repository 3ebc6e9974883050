//! Snapshot exporters
//!
//! Renders aggregated snapshots as a terminal table or a JSON file.

use crate::types::{format_bytes, TrafficSnapshot};
use anyhow::{Context, Result};
use std::{fs::File, io::Write, path::PathBuf};

/// Trait for snapshot exporters
pub trait TrafficExporter {
    /// Export one snapshot
    fn export(&self, snapshot: &TrafficSnapshot) -> Result<()>;
}

/// JSON exporter
pub struct JsonExporter {
    output_path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    ///
    /// * `output_path` - Path to output file
    /// * `pretty` - Enable pretty-printing
    pub fn new(output_path: PathBuf, pretty: bool) -> Self {
        Self {
            output_path,
            pretty,
        }
    }
}

impl TrafficExporter for JsonExporter {
    fn export(&self, snapshot: &TrafficSnapshot) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(snapshot)?
        } else {
            serde_json::to_string(snapshot)?
        };

        let mut file = File::create(&self.output_path)
            .with_context(|| format!("Failed to create output file: {:?}", self.output_path))?;

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write to output file: {:?}", self.output_path))?;

        Ok(())
    }
}

/// Terminal table exporter
///
/// Prints the busiest flows in a tcptop-style table.
pub struct TableExporter {
    /// Maximum number of flows to print (0 = all)
    limit: usize,
}

impl TableExporter {
    /// Create a new table exporter
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Render a snapshot as a table
    pub fn render(&self, snapshot: &TrafficSnapshot) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "{:<8} {:<5} {:<28} {:<28} {:>12} {:>12}\n",
            "PID", "PROTO", "LOCAL", "REMOTE", "TX", "RX"
        ));

        let shown = if self.limit == 0 {
            snapshot.flows.len()
        } else {
            self.limit.min(snapshot.flows.len())
        };

        for flow in &snapshot.flows[..shown] {
            out.push_str(&format!(
                "{:<8} {:<5} {:<28} {:<28} {:>12} {:>12}\n",
                flow.pid,
                flow.protocol,
                flow.local,
                flow.remote,
                format_bytes(flow.tx_bytes),
                format_bytes(flow.rx_bytes),
            ));
        }

        if shown < snapshot.flows.len() {
            out.push_str(&format!("... {} more flows\n", snapshot.flows.len() - shown));
        }

        out
    }
}

impl TrafficExporter for TableExporter {
    fn export(&self, snapshot: &TrafficSnapshot) -> Result<()> {
        print!("{}", self.render(snapshot));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlowEntry;

    fn snapshot() -> TrafficSnapshot {
        TrafficSnapshot {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            duration_seconds: 10,
            total_samples: 3,
            dropped_samples: 0,
            flows: vec![
                FlowEntry {
                    pid: 42,
                    protocol: "TCP".to_string(),
                    local: "10.0.0.1:44000".to_string(),
                    remote: "10.0.0.2:8080".to_string(),
                    tx_bytes: 2048,
                    rx_bytes: 512,
                    samples: 2,
                },
                FlowEntry {
                    pid: 7,
                    protocol: "UDP".to_string(),
                    local: "[2001:db8::1]:5000".to_string(),
                    remote: "[2001:db8::2]:53".to_string(),
                    tx_bytes: 0,
                    rx_bytes: 120,
                    samples: 1,
                },
            ],
        }
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let original = snapshot();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: TrafficSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.total_samples, original.total_samples);
        assert_eq!(decoded.flows, original.flows);
    }

    #[test]
    fn table_renders_every_flow() {
        let table = TableExporter::new(0).render(&snapshot());

        assert!(table.contains("PID"));
        assert!(table.contains("10.0.0.1:44000"));
        assert!(table.contains("[2001:db8::2]:53"));
        assert!(table.contains("2.0 KiB"));
        assert!(table.contains("120 B"));
    }

    #[test]
    fn table_limit_truncates_and_counts_the_rest() {
        let table = TableExporter::new(1).render(&snapshot());

        assert!(table.contains("10.0.0.1:44000"));
        assert!(!table.contains("2001:db8::1"));
        assert!(table.contains("... 1 more flows"));
    }
}
