//! Traffic aggregation
//!
//! Aggregates flow samples from the kernel into per-flow byte counters.
//! All aggregation happens here, in userspace; the capture path emits
//! one record per operation and keeps no state.

use crate::types::{
    endpoint_to_string, protocol_label, Direction, FlowEntry, FlowKey, FlowSample, FlowStats,
    TrafficSnapshot,
};
use std::collections::HashMap;

/// Collector for per-flow traffic totals
#[derive(Default)]
pub struct TrafficCollector {
    /// Byte counters per (pid, protocol, 4-tuple)
    flows: HashMap<FlowKey, FlowStats>,
    /// Samples aggregated since attach
    total_samples: u64,
    /// Samples dropped by the bounded userspace queue
    dropped_samples: u64,
}

impl TrafficCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one sample into its flow
    pub fn add_sample(&mut self, sample: &FlowSample) {
        let stats = self.flows.entry(sample.key()).or_default();

        match sample.direction {
            Direction::Tx => stats.tx_bytes += sample.size,
            Direction::Rx => stats.rx_bytes += sample.size,
        }
        stats.samples += 1;
        self.total_samples += 1;
    }

    /// Record samples lost in the userspace hand-off
    pub fn add_dropped(&mut self, count: u64) {
        self.dropped_samples += count;
    }

    /// Generate an aggregated snapshot
    ///
    /// Flows are sorted by total traffic, busiest first.
    pub fn snapshot(&self, elapsed_secs: u64) -> TrafficSnapshot {
        let mut flows: Vec<FlowEntry> = self
            .flows
            .iter()
            .map(|(key, stats)| FlowEntry {
                pid: key.pid,
                protocol: protocol_label(key.protocol).to_string(),
                local: endpoint_to_string(key.laddr, key.lport),
                remote: endpoint_to_string(key.raddr, key.rport),
                tx_bytes: stats.tx_bytes,
                rx_bytes: stats.rx_bytes,
                samples: stats.samples,
            })
            .collect();

        flows.sort_by(|a, b| {
            (b.tx_bytes + b.rx_bytes)
                .cmp(&(a.tx_bytes + a.rx_bytes))
                .then_with(|| a.pid.cmp(&b.pid))
        });

        TrafficSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_seconds: elapsed_secs,
            total_samples: self.total_samples,
            dropped_samples: self.dropped_samples,
            flows,
        }
    }

    /// Get current sample count
    pub fn sample_count(&self) -> u64 {
        self.total_samples
    }

    /// Get number of distinct flows
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelId, Ipv4FlowEvent, Ipv6FlowEvent};
    use probe_common::constants::{DIRECTION_RX, DIRECTION_TX};

    fn tcp4_sample(size: u32, is_rx: u32) -> FlowSample {
        let event = Ipv4FlowEvent {
            pid: 4242,
            saddr: u32::to_be(0x0a000001), // 10.0.0.1
            daddr: u32::to_be(0x0a000002), // 10.0.0.2
            lport: 44000,
            dport: 8080,
            size,
            is_rx,
        };
        FlowSample::from_v4(ChannelId::TcpV4, &event)
    }

    #[test]
    fn send_then_receive_lands_on_one_flow() {
        let mut collector = TrafficCollector::new();

        // A process sends 1000 bytes, then receives 500 on the same socket
        collector.add_sample(&tcp4_sample(1000, DIRECTION_TX));
        collector.add_sample(&tcp4_sample(500, DIRECTION_RX));

        assert_eq!(collector.sample_count(), 2);
        assert_eq!(collector.flow_count(), 1);

        let snapshot = collector.snapshot(1);
        assert_eq!(snapshot.flows.len(), 1);

        let flow = &snapshot.flows[0];
        assert_eq!(flow.pid, 4242);
        assert_eq!(flow.protocol, "TCP");
        assert_eq!(flow.tx_bytes, 1000);
        assert_eq!(flow.rx_bytes, 500);
        assert_eq!(flow.samples, 2);
        assert_eq!(flow.local, "10.0.0.1:44000");
        assert_eq!(flow.remote, "10.0.0.2:8080");
    }

    #[test]
    fn distinct_tuples_stay_distinct() {
        let mut collector = TrafficCollector::new();

        collector.add_sample(&tcp4_sample(100, DIRECTION_TX));

        let mut other = tcp4_sample(100, DIRECTION_TX);
        other.dport = 9090;
        collector.add_sample(&other);

        let mut other_pid = tcp4_sample(100, DIRECTION_TX);
        other_pid.pid = 1;
        collector.add_sample(&other_pid);

        assert_eq!(collector.flow_count(), 3);
    }

    #[test]
    fn tcp_and_udp_on_the_same_tuple_stay_distinct() {
        let mut collector = TrafficCollector::new();

        let tcp = tcp4_sample(100, DIRECTION_TX);
        let mut udp = tcp;
        udp.channel = ChannelId::UdpV4;

        collector.add_sample(&tcp);
        collector.add_sample(&udp);

        assert_eq!(collector.flow_count(), 2);
    }

    #[test]
    fn snapshot_sorts_busiest_flows_first() {
        let mut collector = TrafficCollector::new();

        let small = tcp4_sample(10, DIRECTION_TX);
        let mut big = tcp4_sample(10_000, DIRECTION_RX);
        big.pid = 7;

        collector.add_sample(&small);
        collector.add_sample(&big);

        let snapshot = collector.snapshot(1);
        assert_eq!(snapshot.flows[0].pid, 7);
        assert_eq!(snapshot.flows[0].rx_bytes, 10_000);
        assert_eq!(snapshot.flows[1].tx_bytes, 10);
    }

    #[test]
    fn ipv6_flows_aggregate_by_address() {
        let mut collector = TrafficCollector::new();

        let event = Ipv6FlowEvent {
            saddr: u128::from_ne_bytes([
                0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
            ]),
            daddr: u128::from_ne_bytes([
                0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2,
            ]),
            pid: 99,
            lport: 5000,
            dport: 53,
            size: 120,
            is_rx: DIRECTION_RX,
        };

        collector.add_sample(&FlowSample::from_v6(ChannelId::UdpV6, &event));
        collector.add_sample(&FlowSample::from_v6(ChannelId::UdpV6, &event));

        assert_eq!(collector.flow_count(), 1);
        let snapshot = collector.snapshot(1);
        assert_eq!(snapshot.flows[0].rx_bytes, 240);
        assert_eq!(snapshot.flows[0].local, "[2001:db8::1]:5000");
        assert_eq!(snapshot.flows[0].remote, "[2001:db8::2]:53");
        assert_eq!(snapshot.flows[0].protocol, "UDP");
    }

    #[test]
    fn dropped_samples_are_reported() {
        let mut collector = TrafficCollector::new();
        collector.add_dropped(3);
        collector.add_dropped(2);
        assert_eq!(collector.snapshot(1).dropped_samples, 5);
    }
}
