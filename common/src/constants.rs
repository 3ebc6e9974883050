//! Shared constants for the traffic sampling probes
//!
//! These constants are used by both kernel and userspace programs
//! to ensure consistency in behavior and limits.

// ============================================================================
// Address Families (from linux/socket.h)
// ============================================================================

/// IPv4 address family
pub const AF_INET: u16 = 2;

/// IPv6 address family
pub const AF_INET6: u16 = 10;

// ============================================================================
// Direction Encoding (for the is_rx record field)
// ============================================================================

/// Transmit-path record (tcp_sendmsg, udp_sendmsg, udpv6_sendmsg)
pub const DIRECTION_TX: u32 = 0;

/// Receive-path record (tcp_cleanup_rbuf, udp_recvmsg, udpv6_recvmsg)
pub const DIRECTION_RX: u32 = 1;

// ============================================================================
// Userspace Queue Sizing
// ============================================================================

/// Depth of the bounded queue between the per-CPU perf readers and the
/// collector. A full queue drops the sample rather than blocking a reader.
pub const EVENT_QUEUE_DEPTH: usize = 4096;

// ============================================================================
// Protocol Numbers (from linux/in.h)
// ============================================================================

/// TCP protocol number
pub const IPPROTO_TCP: u8 = 6;

/// UDP protocol number
pub const IPPROTO_UDP: u8 = 17;
