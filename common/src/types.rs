//! Shared data structures between kernel and userspace
//!
//! These structures must be repr(C) to ensure consistent memory layout
//! between eBPF programs and userspace code. The two record shapes are
//! fixed-size, so perf samples carry no explicit framing.

use crate::constants::{AF_INET, AF_INET6, DIRECTION_RX, DIRECTION_TX};

/// One IPv4 traffic sample
///
/// Emitted once per successful, size-positive transport call on an
/// AF_INET socket. Addresses are in network byte order as the socket
/// reports them; `dport` has already been converted to host order by
/// the extractor, `lport` is stored host-order in the kernel.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4FlowEvent {
    /// Process that performed the socket operation (the caller, not
    /// the socket creator)
    pub pid: u32,
    /// Source IP address (network byte order)
    pub saddr: u32,
    /// Destination IP address (network byte order)
    pub daddr: u32,
    /// Local port (host byte order)
    pub lport: u16,
    /// Remote port (host byte order)
    pub dport: u16,
    /// Bytes the transport layer processed in this call
    pub size: u32,
    /// Direction flag: 0 = transmit, 1 = receive
    pub is_rx: u32,
}

/// One IPv6 traffic sample
///
/// Same semantics as [`Ipv4FlowEvent`] with 128-bit addresses. A failed
/// kernel address copy leaves `saddr`/`daddr` all-zero; the record is
/// still emitted because pid, ports and size remain informative.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv6FlowEvent {
    /// Source IPv6 address (network byte order)
    pub saddr: u128,
    /// Destination IPv6 address (network byte order)
    pub daddr: u128,
    /// Process that performed the socket operation
    pub pid: u32,
    /// Local port (host byte order)
    pub lport: u16,
    /// Remote port (host byte order)
    pub dport: u16,
    /// Bytes the transport layer processed in this call
    pub size: u32,
    /// Direction flag: 0 = transmit, 1 = receive
    pub is_rx: u32,
}

impl Ipv4FlowEvent {
    /// Decode one record from a raw perf sample
    ///
    /// Returns None when the buffer is shorter than the record.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < core::mem::size_of::<Self>() {
            return None;
        }
        Some(unsafe { (bytes.as_ptr() as *const Self).read_unaligned() })
    }
}

impl Ipv6FlowEvent {
    /// Decode one record from a raw perf sample
    ///
    /// Returns None when the buffer is shorter than the record.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < core::mem::size_of::<Self>() {
            return None;
        }
        Some(unsafe { (bytes.as_ptr() as *const Self).read_unaligned() })
    }
}

/// Transport protocol of a captured call site
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Direction of a captured call site
///
/// Encoded into the record's `is_rx` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Tx,
    Rx,
}

impl Direction {
    /// Wire encoding for the `is_rx` field
    pub const fn as_u32(self) -> u32 {
        match self {
            Direction::Tx => DIRECTION_TX,
            Direction::Rx => DIRECTION_RX,
        }
    }

    /// Decode an `is_rx` field; any nonzero value is a receive
    pub const fn from_u32(is_rx: u32) -> Direction {
        if is_rx == DIRECTION_TX {
            Direction::Tx
        } else {
            Direction::Rx
        }
    }
}

/// Output channel identity, one per (protocol, family) pair
///
/// Each channel carries exactly one record shape: the V4 channels carry
/// [`Ipv4FlowEvent`], the V6 channels carry [`Ipv6FlowEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    TcpV4,
    TcpV6,
    UdpV4,
    UdpV6,
}

impl ChannelId {
    /// Select the output channel for a call site
    ///
    /// Families other than AF_INET and AF_INET6 yield no channel; the
    /// event is dropped without a record. This is a defined no-op, not
    /// an error.
    pub const fn classify(protocol: Protocol, family: u16) -> Option<ChannelId> {
        match (protocol, family) {
            (Protocol::Tcp, AF_INET) => Some(ChannelId::TcpV4),
            (Protocol::Tcp, AF_INET6) => Some(ChannelId::TcpV6),
            (Protocol::Udp, AF_INET) => Some(ChannelId::UdpV4),
            (Protocol::Udp, AF_INET6) => Some(ChannelId::UdpV6),
            _ => None,
        }
    }

    /// Name of the BPF map backing this channel
    pub const fn map_name(self) -> &'static str {
        match self {
            ChannelId::TcpV4 => "TCP4_EVENTS",
            ChannelId::TcpV6 => "TCP6_EVENTS",
            ChannelId::UdpV4 => "UDP4_EVENTS",
            ChannelId::UdpV6 => "UDP6_EVENTS",
        }
    }

    /// Protocol half of the channel identity
    pub const fn protocol(self) -> Protocol {
        match self {
            ChannelId::TcpV4 | ChannelId::TcpV6 => Protocol::Tcp,
            ChannelId::UdpV4 | ChannelId::UdpV6 => Protocol::Udp,
        }
    }
}

// Compile-time layout checks
// These will fail to compile if the wire shape drifts
const _: () = {
    // Ipv4FlowEvent: pid + saddr + daddr + lport + dport + size + is_rx
    assert!(core::mem::size_of::<Ipv4FlowEvent>() == 24);
    // Ipv6FlowEvent: saddr + daddr + pid + lport + dport + size + is_rx
    assert!(core::mem::size_of::<Ipv6FlowEvent>() == 48);
    assert!(core::mem::size_of::<Ipv4FlowEvent>() % core::mem::align_of::<Ipv4FlowEvent>() == 0);
    assert!(core::mem::size_of::<Ipv6FlowEvent>() % core::mem::align_of::<Ipv6FlowEvent>() == 0);
};

// Implement Aya's Pod trait for userspace usage
#[cfg(feature = "userspace")]
mod userspace_impls {
    use super::*;

    // Pod trait implementations for reading from perf buffers in userspace
    unsafe impl aya::Pod for Ipv4FlowEvent {}
    unsafe impl aya::Pod for Ipv6FlowEvent {}
}
