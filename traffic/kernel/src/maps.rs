//! BPF map definitions and record emission
//!
//! The four output channels, one per (protocol, family) pair, each a
//! per-CPU perf buffer carrying one fixed record shape. Publication
//! never blocks: when a CPU's buffer is full the sample is silently
//! lost and the probed call continues unaffected.

use aya_ebpf::{macros::map, maps::PerfEventArray, programs::ProbeContext};
use probe_common::{ChannelId, Direction, Ipv4FlowEvent, Ipv6FlowEvent, Protocol};

use crate::socket_parser::FlowTuple;

/// TCP over IPv4 traffic samples
#[map]
pub static TCP4_EVENTS: PerfEventArray<Ipv4FlowEvent> = PerfEventArray::new(0);

/// TCP over IPv6 traffic samples
#[map]
pub static TCP6_EVENTS: PerfEventArray<Ipv6FlowEvent> = PerfEventArray::new(0);

/// UDP over IPv4 traffic samples
#[map]
pub static UDP4_EVENTS: PerfEventArray<Ipv4FlowEvent> = PerfEventArray::new(0);

/// UDP over IPv6 traffic samples
#[map]
pub static UDP6_EVENTS: PerfEventArray<Ipv6FlowEvent> = PerfEventArray::new(0);

/// Classify a call site and publish one record on the matching channel
///
/// The record is built on the probe's stack and copied once into the
/// channel slot; it is never retained or mutated afterwards. An
/// unrecognized family publishes nothing.
#[inline(always)]
pub fn emit(
    ctx: &ProbeContext,
    protocol: Protocol,
    direction: Direction,
    tuple: FlowTuple,
    pid: u32,
    size: u32,
) {
    let channel = match ChannelId::classify(protocol, tuple.family()) {
        Some(c) => c,
        None => return,
    };

    match tuple {
        FlowTuple::V4 {
            saddr,
            daddr,
            lport,
            dport,
        } => {
            let event = Ipv4FlowEvent {
                pid,
                saddr,
                daddr,
                lport,
                dport,
                size,
                is_rx: direction.as_u32(),
            };
            match channel {
                ChannelId::TcpV4 => TCP4_EVENTS.output(ctx, &event, 0),
                ChannelId::UdpV4 => UDP4_EVENTS.output(ctx, &event, 0),
                _ => (),
            }
        }
        FlowTuple::V6 {
            saddr,
            daddr,
            lport,
            dport,
        } => {
            let event = Ipv6FlowEvent {
                saddr,
                daddr,
                pid,
                lport,
                dport,
                size,
                is_rx: direction.as_u32(),
            };
            match channel {
                ChannelId::TcpV6 => TCP6_EVENTS.output(ctx, &event, 0),
                ChannelId::UdpV6 => UDP6_EVENTS.output(ctx, &event, 0),
                _ => (),
            }
        }
    }
}
