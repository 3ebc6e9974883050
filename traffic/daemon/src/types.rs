//! Userspace type definitions
//!
//! Defines the data structures used by the userspace program for
//! aggregation and export.
//!
//! ## Organization
//!
//! This module separates kernel and userspace types:
//! - **Kernel Types**: Record shapes shared with eBPF programs (from probe_common)
//! - **Userspace Types**: Types used only in userspace for aggregation and export

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

// ============================================================================
// Kernel Types (from eBPF programs)
// ============================================================================

pub mod kernel {
    //! Types shared between kernel eBPF programs and userspace
    //!
    //! These are re-exported from the probe-common crate and must
    //! maintain binary compatibility with the eBPF programs.

    pub use probe_common::constants;
    pub use probe_common::types::{ChannelId, Direction, Ipv4FlowEvent, Ipv6FlowEvent, Protocol};
}

// Re-export commonly used kernel types at module level for convenience
pub use kernel::{ChannelId, Direction, Ipv4FlowEvent, Ipv6FlowEvent, Protocol};

/// One decoded traffic sample, normalized for userspace
///
/// Addresses are converted out of their wire representation; ports were
/// already host-order in the record.
#[derive(Clone, Copy, Debug)]
pub struct FlowSample {
    /// Channel the sample arrived on
    pub channel: ChannelId,
    /// Process that performed the socket operation
    pub pid: u32,
    /// Source address
    pub saddr: IpAddr,
    /// Destination address
    pub daddr: IpAddr,
    /// Local port
    pub lport: u16,
    /// Remote port
    pub dport: u16,
    /// Bytes processed by this operation
    pub size: u64,
    /// Transmit or receive
    pub direction: Direction,
}

impl FlowSample {
    /// Decode an IPv4 record from one of the V4 channels
    pub fn from_v4(channel: ChannelId, event: &Ipv4FlowEvent) -> Self {
        Self {
            channel,
            pid: event.pid,
            saddr: IpAddr::V4(Ipv4Addr::from(u32::from_be(event.saddr))),
            daddr: IpAddr::V4(Ipv4Addr::from(u32::from_be(event.daddr))),
            lport: event.lport,
            dport: event.dport,
            size: u64::from(event.size),
            direction: Direction::from_u32(event.is_rx),
        }
    }

    /// Decode an IPv6 record from one of the V6 channels
    pub fn from_v6(channel: ChannelId, event: &Ipv6FlowEvent) -> Self {
        Self {
            channel,
            pid: event.pid,
            saddr: IpAddr::V6(Ipv6Addr::from(event.saddr.to_ne_bytes())),
            daddr: IpAddr::V6(Ipv6Addr::from(event.daddr.to_ne_bytes())),
            lport: event.lport,
            dport: event.dport,
            size: u64::from(event.size),
            direction: Direction::from_u32(event.is_rx),
        }
    }

    /// Aggregation key for this sample
    pub fn key(&self) -> FlowKey {
        FlowKey {
            pid: self.pid,
            protocol: self.channel.protocol(),
            laddr: self.saddr,
            lport: self.lport,
            raddr: self.daddr,
            rport: self.dport,
        }
    }
}

/// Aggregation key: one process talking on one 4-tuple
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub pid: u32,
    pub protocol: Protocol,
    pub laddr: IpAddr,
    pub lport: u16,
    pub raddr: IpAddr,
    pub rport: u16,
}

/// Byte counters accumulated for one flow
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowStats {
    /// Bytes sent by the process
    pub tx_bytes: u64,
    /// Bytes received by the process
    pub rx_bytes: u64,
    /// Number of samples merged into this flow
    pub samples: u64,
}

impl FlowStats {
    /// Total traffic in both directions
    pub fn total_bytes(&self) -> u64 {
        self.tx_bytes + self.rx_bytes
    }
}

/// Aggregated snapshot for export
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrafficSnapshot {
    /// ISO 8601 timestamp when the snapshot was taken
    pub timestamp: String,
    /// Seconds since the probes were attached
    pub duration_seconds: u64,
    /// Total samples aggregated since attach
    pub total_samples: u64,
    /// Samples dropped by the bounded userspace queue
    pub dropped_samples: u64,
    /// Per-flow entries, sorted by total traffic descending
    pub flows: Vec<FlowEntry>,
}

/// One flow in an exported snapshot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlowEntry {
    /// Process ID
    pub pid: u32,
    /// "TCP" or "UDP"
    pub protocol: String,
    /// Local endpoint as "addr:port"
    pub local: String,
    /// Remote endpoint as "addr:port"
    pub remote: String,
    /// Bytes sent
    pub tx_bytes: u64,
    /// Bytes received
    pub rx_bytes: u64,
    /// Samples merged into this flow
    pub samples: u64,
}

/// Display label for a protocol
pub fn protocol_label(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Tcp => "TCP",
        Protocol::Udp => "UDP",
    }
}

/// Format an endpoint as "addr:port", bracketing IPv6 addresses
pub fn endpoint_to_string(addr: IpAddr, port: u16) -> String {
    match addr {
        IpAddr::V4(v4) => format!("{}:{}", v4, port),
        IpAddr::V6(v6) => format!("[{}]:{}", v6, port),
    }
}

/// Human-readable byte count (binary units)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_common::constants::{AF_INET, AF_INET6, DIRECTION_RX, DIRECTION_TX};
    use std::mem::size_of;
    use std::slice;

    fn v4_event(lport: u16, dport: u16) -> Ipv4FlowEvent {
        Ipv4FlowEvent {
            pid: 1234,
            saddr: u32::to_be(0x7f000001), // 127.0.0.1
            daddr: u32::to_be(0x0a000002), // 10.0.0.2
            lport,
            dport,
            size: 1000,
            is_rx: DIRECTION_TX,
        }
    }

    #[test]
    fn record_wire_sizes_are_fixed() {
        assert_eq!(size_of::<Ipv4FlowEvent>(), 24);
        assert_eq!(size_of::<Ipv6FlowEvent>(), 48);
    }

    #[test]
    fn ipv4_record_round_trips_through_bytes() {
        for (lport, dport) in [(0u16, 0u16), (1, 1), (0xFFFF, 0xFFFF), (80, 443)] {
            let event = v4_event(lport, dport);
            let bytes = unsafe {
                slice::from_raw_parts(
                    &event as *const Ipv4FlowEvent as *const u8,
                    size_of::<Ipv4FlowEvent>(),
                )
            };
            let decoded = Ipv4FlowEvent::from_bytes(bytes).unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn ipv6_record_round_trips_through_bytes() {
        for (saddr, daddr) in [
            (0u128, 0u128),
            (1, 1),
            (u128::MAX, u128::MAX),
            (0x2001_0db8_0000_0000_0000_0000_0000_0001, u128::MAX - 1),
        ] {
            let event = Ipv6FlowEvent {
                saddr,
                daddr,
                pid: 4321,
                lport: 0xFFFF,
                dport: 1,
                size: u32::MAX,
                is_rx: DIRECTION_RX,
            };
            let bytes = unsafe {
                slice::from_raw_parts(
                    &event as *const Ipv6FlowEvent as *const u8,
                    size_of::<Ipv6FlowEvent>(),
                )
            };
            let decoded = Ipv6FlowEvent::from_bytes(bytes).unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn short_buffers_decode_to_none() {
        let event = v4_event(80, 443);
        let bytes = unsafe {
            slice::from_raw_parts(
                &event as *const Ipv4FlowEvent as *const u8,
                size_of::<Ipv4FlowEvent>(),
            )
        };
        assert!(Ipv4FlowEvent::from_bytes(&bytes[..bytes.len() - 1]).is_none());
        assert!(Ipv6FlowEvent::from_bytes(bytes).is_none());
    }

    #[test]
    fn classifier_recognizes_only_inet_families() {
        // AF_UNIX, AF_NETLINK, and friends produce no channel
        for family in [0u16, 1, 3, 16, 0xFFFF] {
            assert_eq!(ChannelId::classify(Protocol::Tcp, family), None);
            assert_eq!(ChannelId::classify(Protocol::Udp, family), None);
        }
    }

    #[test]
    fn classifier_maps_each_pair_to_its_own_channel() {
        let channels = [
            ChannelId::classify(Protocol::Tcp, AF_INET).unwrap(),
            ChannelId::classify(Protocol::Tcp, AF_INET6).unwrap(),
            ChannelId::classify(Protocol::Udp, AF_INET).unwrap(),
            ChannelId::classify(Protocol::Udp, AF_INET6).unwrap(),
        ];
        assert_eq!(
            channels,
            [
                ChannelId::TcpV4,
                ChannelId::TcpV6,
                ChannelId::UdpV4,
                ChannelId::UdpV6
            ]
        );
        for (i, a) in channels.iter().enumerate() {
            for b in &channels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn direction_encoding_round_trips() {
        assert_eq!(Direction::Tx.as_u32(), DIRECTION_TX);
        assert_eq!(Direction::Rx.as_u32(), DIRECTION_RX);
        assert_eq!(Direction::from_u32(DIRECTION_TX), Direction::Tx);
        assert_eq!(Direction::from_u32(DIRECTION_RX), Direction::Rx);
    }

    #[test]
    fn v4_sample_converts_addresses_out_of_network_order() {
        let sample = FlowSample::from_v4(ChannelId::TcpV4, &v4_event(8080, 443));
        assert_eq!(sample.saddr, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(sample.daddr, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(sample.lport, 8080);
        assert_eq!(sample.dport, 443);
        assert_eq!(sample.direction, Direction::Tx);
    }

    #[test]
    fn v6_sample_preserves_address_bytes() {
        let addr_bytes: [u8; 16] = [
            0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
        ];
        let event = Ipv6FlowEvent {
            saddr: u128::from_ne_bytes(addr_bytes),
            daddr: 0,
            pid: 1,
            lport: 53,
            dport: 5353,
            size: 64,
            is_rx: DIRECTION_RX,
        };
        let sample = FlowSample::from_v6(ChannelId::UdpV6, &event);
        assert_eq!(sample.saddr, "2001:db8::1".parse::<IpAddr>().unwrap());
        assert_eq!(sample.daddr, "::".parse::<IpAddr>().unwrap());
        assert_eq!(sample.direction, Direction::Rx);
    }

    #[test]
    fn endpoints_format_with_ports() {
        assert_eq!(
            endpoint_to_string("10.0.0.1".parse().unwrap(), 80),
            "10.0.0.1:80"
        );
        assert_eq!(
            endpoint_to_string("2001:db8::1".parse().unwrap(), 443),
            "[2001:db8::1]:443"
        );
    }

    #[test]
    fn byte_counts_format_human_readable() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KiB");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}
