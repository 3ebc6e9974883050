//! Traffic Probe Userspace Library
//!
//! Provides reusable components for loading and managing the eBPF traffic probe.

pub mod collector;
pub mod events;
pub mod exporter;
pub mod loader;
pub mod types;

pub use collector::TrafficCollector;
pub use events::{EventProcessor, SampleQueue};
pub use exporter::{JsonExporter, TableExporter, TrafficExporter};
pub use loader::ProbeLoader;
pub use types::*;
