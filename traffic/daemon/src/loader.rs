//! eBPF program loader
//!
//! Handles loading the eBPF object and attaching the probe group.

use anyhow::{Context, Result};
use aya::{
    maps::{perf::AsyncPerfEventArray, MapData},
    programs::KProbe,
    Bpf,
};
use log::info;
use probe_common::ChannelId;
use std::path::PathBuf;

/// The six instrumented kernel symbols
///
/// Program names match the symbols they attach to, so one table drives
/// the whole group.
const PROBED_SYMBOLS: [&str; 6] = [
    "tcp_sendmsg",
    "tcp_cleanup_rbuf",
    "udp_sendmsg",
    "udpv6_sendmsg",
    "udp_recvmsg",
    "udpv6_recvmsg",
];

/// eBPF program loader and manager
///
/// Dropping the loader detaches every attached probe, so a failed
/// attach sequence never leaves the group partially attached: the
/// caller drops the loader and everything unwinds together.
pub struct ProbeLoader {
    ebpf: Bpf,
}

impl ProbeLoader {
    /// Load eBPF program from file or embedded bytecode
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to eBPF object file. If None, uses embedded bytecode.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        info!("Loading eBPF program...");

        let ebpf = if let Some(obj_path) = path {
            info!("Loading eBPF object from: {:?}", obj_path);
            let data = std::fs::read(&obj_path)
                .with_context(|| format!("Failed to read eBPF object file: {:?}", obj_path))?;
            Bpf::load(&data).context("Failed to load eBPF program")?
        } else {
            #[cfg(feature = "embedded")]
            {
                info!("Loading embedded eBPF program...");
                let data = include_bytes!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/../kernel/target/bpfel-unknown-none/release/traffic-probe"
                ));
                Bpf::load(data).context("Failed to load embedded eBPF program")?
            }
            #[cfg(not(feature = "embedded"))]
            {
                anyhow::bail!(
                    "No eBPF object file provided. Use --ebpf-object or compile with 'embedded' feature"
                );
            }
        };

        info!("eBPF program loaded successfully");

        Ok(Self { ebpf })
    }

    /// Attach the probe group
    ///
    /// All six kprobes attach or none stay attached: an error here means
    /// the caller discards the loader, and dropping it detaches whatever
    /// part of the group already went in.
    pub fn attach_kprobes(&mut self) -> Result<()> {
        info!("Attaching traffic probes...");

        for symbol in PROBED_SYMBOLS {
            let program: &mut KProbe = self
                .ebpf
                .program_mut(symbol)
                .with_context(|| format!("{} program not found in eBPF object", symbol))?
                .try_into()
                .with_context(|| format!("Failed to get {} as KProbe", symbol))?;
            program
                .load()
                .with_context(|| format!("Failed to load {}", symbol))?;
            program
                .attach(symbol, 0)
                .with_context(|| format!("Failed to attach {} kprobe", symbol))?;
            info!("  Attached to {}", symbol);
        }

        info!("All probes attached");

        Ok(())
    }

    /// Take a channel's perf array out of the eBPF object
    ///
    /// Each channel can be taken exactly once.
    pub fn channel_array(&mut self, channel: ChannelId) -> Result<AsyncPerfEventArray<MapData>> {
        let map = self
            .ebpf
            .take_map(channel.map_name())
            .with_context(|| format!("{} map not found in eBPF object", channel.map_name()))?;

        AsyncPerfEventArray::try_from(map).with_context(|| {
            format!(
                "Failed to create AsyncPerfEventArray from {} map",
                channel.map_name()
            )
        })
    }

    /// Get reference to the eBPF object
    ///
    /// Useful for accessing maps or programs directly.
    pub fn ebpf(&mut self) -> &mut Bpf {
        &mut self.ebpf
    }
}
