//! eBPF Traffic Probe - Userspace Program
//!
//! Loads the eBPF traffic sampling program, attaches the probe group,
//! drains the four per-(protocol, family) channels, and prints a
//! per-process traffic table at each interval.
//!
//! ## Usage
//!
//! ```bash
//! # Refresh every second until interrupted
//! sudo ./traffic-probe --ebpf-object path/to/traffic-probe
//!
//! # Five 2-second intervals, then write a JSON snapshot
//! sudo ./traffic-probe --interval 2 --count 5 --output traffic.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    signal,
    sync::Mutex,
    time::{interval, Instant},
};
use traffic_probe_userspace::{
    collector::TrafficCollector,
    events::EventProcessor,
    exporter::{JsonExporter, TableExporter, TrafficExporter},
    loader::ProbeLoader,
    types::{ChannelId, TrafficSnapshot},
};

/// Per-process network traffic sampling using eBPF
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Refresh interval in seconds
    #[clap(short, long, default_value_t = 1)]
    interval: u64,

    /// Number of intervals to run (0 = until interrupted)
    #[clap(short, long, default_value_t = 0)]
    count: u64,

    /// Maximum flows to show per interval (0 = all)
    #[clap(short, long, default_value_t = 20)]
    top: usize,

    /// Write a final JSON snapshot to this file on exit
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    verbose: bool,

    /// Path to eBPF object file (if not embedded)
    #[clap(long)]
    ebpf_object: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if args.interval == 0 {
        anyhow::bail!("Interval must be >= 1 second");
    }

    info!("Starting eBPF traffic probe...");
    info!("   Interval: {} s", args.interval);
    info!(
        "   Count: {}",
        if args.count == 0 {
            "until interrupted".to_string()
        } else {
            args.count.to_string()
        }
    );

    // Load eBPF program and attach the probe group
    let mut loader = ProbeLoader::load(args.ebpf_object.clone())?;
    loader.attach_kprobes()?;

    // Shared collector fed by the per-CPU readers
    let collector = Arc::new(Mutex::new(TrafficCollector::new()));
    let (processor, samples_rx) = EventProcessor::new(Arc::clone(&collector), args.verbose);
    let _drain = processor.spawn_drain_task(samples_rx);

    // One reader set per channel
    for channel in [
        ChannelId::TcpV4,
        ChannelId::TcpV6,
        ChannelId::UdpV4,
        ChannelId::UdpV6,
    ] {
        let perf_array = loader.channel_array(channel)?;
        processor.spawn_channel_readers(channel, perf_array)?;
    }

    info!("Sampling traffic... Ctrl-C to stop");

    let table = TableExporter::new(args.top);
    let start = Instant::now();
    let mut ticker = interval(Duration::from_secs(args.interval));
    // The first tick completes immediately; swallow it so the first
    // table covers a full interval
    ticker.tick().await;

    let mut iterations = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snapshot = {
                    let collector = collector.lock().await;
                    collector.snapshot(start.elapsed().as_secs())
                };

                println!();
                table.export(&snapshot)?;

                iterations += 1;
                if args.count > 0 && iterations >= args.count {
                    info!("Requested interval count reached, shutting down...");
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!("Interrupted, shutting down...");
                break;
            }
        }
    }

    let snapshot = {
        let collector = collector.lock().await;
        collector.snapshot(start.elapsed().as_secs())
    };

    if let Some(path) = &args.output {
        JsonExporter::new(path.clone(), true).export(&snapshot)?;
        info!("Snapshot written to {:?}", path);
    }

    print_summary(&snapshot);

    Ok(())
}

fn print_summary(snapshot: &TrafficSnapshot) {
    info!("============================================");
    info!("             Summary Report");
    info!("============================================");
    info!("  Duration:        {} seconds", snapshot.duration_seconds);
    info!("  Samples:         {}", snapshot.total_samples);
    info!("  Dropped samples: {}", snapshot.dropped_samples);
    info!("  Distinct flows:  {}", snapshot.flows.len());
    info!("============================================");
}
