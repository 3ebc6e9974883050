//! Event processing from eBPF perf buffers
//!
//! Reads records from the four per-CPU perf channels and hands them to
//! the collector through a bounded queue. The hand-off mirrors the
//! kernel-side policy: it never blocks a reader, and a full queue loses
//! the sample rather than applying backpressure.

use crate::{
    collector::TrafficCollector,
    types::{ChannelId, FlowSample, Ipv4FlowEvent, Ipv6FlowEvent},
};
use anyhow::Result;
use aya::{maps::perf::AsyncPerfEventArray, maps::MapData, util::online_cpus};
use bytes::BytesMut;
use log::{debug, warn};
use probe_common::constants::EVENT_QUEUE_DEPTH;
use std::{
    mem::size_of,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};

/// Bounded, lossy hand-off from the per-CPU readers to the collector
#[derive(Clone)]
pub struct SampleQueue {
    tx: mpsc::Sender<FlowSample>,
    dropped: Arc<AtomicU64>,
}

impl SampleQueue {
    /// Create a queue with the given capacity
    pub fn bounded(depth: usize) -> (Self, mpsc::Receiver<FlowSample>) {
        let (tx, rx) = mpsc::channel(depth);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Publish one sample
    ///
    /// Never blocks. When the queue is full the sample is dropped and
    /// counted; per-producer ordering of delivered samples is preserved.
    pub fn publish(&self, sample: FlowSample) {
        if self.tx.try_send(sample).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total samples dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Decode one perf sample according to its channel's record shape
fn decode_sample(channel: ChannelId, bytes: &[u8]) -> Option<FlowSample> {
    match channel {
        ChannelId::TcpV4 | ChannelId::UdpV4 => {
            Ipv4FlowEvent::from_bytes(bytes).map(|event| FlowSample::from_v4(channel, &event))
        }
        ChannelId::TcpV6 | ChannelId::UdpV6 => {
            Ipv6FlowEvent::from_bytes(bytes).map(|event| FlowSample::from_v6(channel, &event))
        }
    }
}

/// Size of the record shape carried by a channel
fn record_size(channel: ChannelId) -> usize {
    match channel {
        ChannelId::TcpV4 | ChannelId::UdpV4 => size_of::<Ipv4FlowEvent>(),
        ChannelId::TcpV6 | ChannelId::UdpV6 => size_of::<Ipv6FlowEvent>(),
    }
}

/// Event processor that drains the perf channels
pub struct EventProcessor {
    collector: Arc<Mutex<TrafficCollector>>,
    queue: SampleQueue,
    verbose: bool,
}

impl EventProcessor {
    /// Create a new event processor
    ///
    /// Returns the processor and the receiving end of its sample queue;
    /// pass the receiver to [`EventProcessor::spawn_drain_task`].
    pub fn new(
        collector: Arc<Mutex<TrafficCollector>>,
        verbose: bool,
    ) -> (Self, mpsc::Receiver<FlowSample>) {
        let (queue, rx) = SampleQueue::bounded(EVENT_QUEUE_DEPTH);
        (
            Self {
                collector,
                queue,
                verbose,
            },
            rx,
        )
    }

    /// Spawn per-CPU reader tasks for one channel
    ///
    /// Each CPU's sub-buffer gets its own task; records within one
    /// sub-buffer arrive in FIFO order. Sample loss reported by the perf
    /// layer is logged, not fatal.
    pub fn spawn_channel_readers(
        &self,
        channel: ChannelId,
        mut perf_array: AsyncPerfEventArray<MapData>,
    ) -> Result<()> {
        let cpus = online_cpus()?;
        debug!(
            "Spawning {} readers for {}",
            cpus.len(),
            channel.map_name()
        );

        for cpu_id in cpus {
            let mut buf = perf_array.open(cpu_id, None)?;
            let queue = self.queue.clone();
            let verbose = self.verbose;

            tokio::spawn(async move {
                // Pre-allocate buffers for reading events
                let mut buffers = (0..10)
                    .map(|_| BytesMut::with_capacity(record_size(channel)))
                    .collect::<Vec<_>>();

                loop {
                    let events = match buf.read_events(&mut buffers).await {
                        Ok(events) => events,
                        Err(e) => {
                            warn!(
                                "Error reading {} on CPU {}: {}",
                                channel.map_name(),
                                cpu_id,
                                e
                            );
                            continue;
                        }
                    };

                    if events.lost > 0 {
                        warn!(
                            "{}: perf ring dropped {} samples on CPU {}",
                            channel.map_name(),
                            events.lost,
                            cpu_id
                        );
                    }

                    for buf in buffers.iter_mut().take(events.read) {
                        let sample = match decode_sample(channel, buf) {
                            Some(sample) => sample,
                            None => {
                                warn!("{}: truncated record, skipping", channel.map_name());
                                continue;
                            }
                        };

                        if verbose {
                            debug!(
                                "{}: pid {} {} -> {} {} bytes {:?}",
                                channel.map_name(),
                                sample.pid,
                                sample.saddr,
                                sample.daddr,
                                sample.size,
                                sample.direction
                            );
                        }

                        queue.publish(sample);
                    }
                }
            });
        }

        Ok(())
    }

    /// Spawn the task that drains the sample queue into the collector
    pub fn spawn_drain_task(&self, mut rx: mpsc::Receiver<FlowSample>) -> JoinHandle<()> {
        let collector = Arc::clone(&self.collector);
        let dropped = Arc::clone(&self.queue.dropped);

        tokio::spawn(async move {
            let mut seen_dropped = 0u64;

            while let Some(sample) = rx.recv().await {
                let mut collector = collector.lock().await;
                collector.add_sample(&sample);

                let total = dropped.load(Ordering::Relaxed);
                if total > seen_dropped {
                    collector.add_dropped(total - seen_dropped);
                    seen_dropped = total;
                }
            }
        })
    }
}
