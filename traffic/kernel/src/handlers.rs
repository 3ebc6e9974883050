//! Kprobe handlers for traffic sampling
//!
//! The six instrumentation points on the transport send/receive paths.
//! Every handler is stateless and runs the same pipeline: extract the
//! flow, classify the call site, publish one record or nothing. No
//! failure here may alter the behavior of the probed call.

use aya_ebpf::{macros::kprobe, programs::ProbeContext};
use probe_common::{Direction, Protocol};

use crate::{
    helpers::get_pid,
    maps::emit,
    socket_parser::{extract_flow, get_sock_from_context},
};

/// Sample TCP send operations
///
/// Attached to: tcp_sendmsg
///
/// Handles both IPv4 and IPv6 sockets; the size argument is the byte
/// count the caller asked the transport layer to send.
#[kprobe]
pub fn tcp_sendmsg(ctx: ProbeContext) -> u32 {
    match try_tcp_sendmsg(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_tcp_sendmsg(ctx: &ProbeContext) -> Result<u32, i64> {
    // tcp_sendmsg(struct sock *sk, struct msghdr *msg, size_t size)
    let size: u64 = ctx.arg(2).ok_or(-1)?;
    sample(ctx, Protocol::Tcp, Direction::Tx, size as i64)
}

/// Sample TCP receive completions
///
/// Attached to: tcp_cleanup_rbuf
///
/// tcp_recvmsg() would be the obvious symbol to trace, but it would
/// need entry and return probes to see both the socket and the size,
/// and it misses tcp_read_sock() traffic. tcp_cleanup_rbuf() sees the
/// bytes actually delivered to the application.
#[kprobe]
pub fn tcp_cleanup_rbuf(ctx: ProbeContext) -> u32 {
    match try_tcp_cleanup_rbuf(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_tcp_cleanup_rbuf(ctx: &ProbeContext) -> Result<u32, i64> {
    // tcp_cleanup_rbuf(struct sock *sk, int copied)
    let copied: i32 = ctx.arg(1).ok_or(-1)?;
    sample(ctx, Protocol::Tcp, Direction::Rx, copied as i64)
}

/// Sample UDP send operations (IPv4 sockets)
///
/// Attached to: udp_sendmsg
#[kprobe]
pub fn udp_sendmsg(ctx: ProbeContext) -> u32 {
    match try_udp_sendmsg(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_udp_sendmsg(ctx: &ProbeContext) -> Result<u32, i64> {
    // udp_sendmsg(struct sock *sk, struct msghdr *msg, size_t len)
    let len: u64 = ctx.arg(2).ok_or(-1)?;
    sample(ctx, Protocol::Udp, Direction::Tx, len as i64)
}

/// Sample UDP send operations (IPv6 sockets)
///
/// Attached to: udpv6_sendmsg
#[kprobe]
pub fn udpv6_sendmsg(ctx: ProbeContext) -> u32 {
    match try_udpv6_sendmsg(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_udpv6_sendmsg(ctx: &ProbeContext) -> Result<u32, i64> {
    // udpv6_sendmsg(struct sock *sk, struct msghdr *msg, size_t len)
    let len: u64 = ctx.arg(2).ok_or(-1)?;
    sample(ctx, Protocol::Udp, Direction::Tx, len as i64)
}

/// Sample UDP receive operations (IPv4 sockets)
///
/// Attached to: udp_recvmsg
#[kprobe]
pub fn udp_recvmsg(ctx: ProbeContext) -> u32 {
    match try_udp_recvmsg(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_udp_recvmsg(ctx: &ProbeContext) -> Result<u32, i64> {
    // udp_recvmsg(struct sock *sk, struct msghdr *msg, size_t len, ...)
    let len: u64 = ctx.arg(2).ok_or(-1)?;
    sample(ctx, Protocol::Udp, Direction::Rx, len as i64)
}

/// Sample UDP receive operations (IPv6 sockets)
///
/// Attached to: udpv6_recvmsg
#[kprobe]
pub fn udpv6_recvmsg(ctx: ProbeContext) -> u32 {
    match try_udpv6_recvmsg(&ctx) {
        Ok(ret) => ret,
        Err(_) => 1,
    }
}

fn try_udpv6_recvmsg(ctx: &ProbeContext) -> Result<u32, i64> {
    // udpv6_recvmsg(struct sock *sk, struct msghdr *msg, size_t len, ...)
    let len: u64 = ctx.arg(2).ok_or(-1)?;
    sample(ctx, Protocol::Udp, Direction::Rx, len as i64)
}

/// Shared probe pipeline: filter, extract, classify, publish
///
/// Zero- and negative-size operations are suppressed before extraction,
/// so every published record carries a strictly positive size.
#[inline(always)]
fn sample(ctx: &ProbeContext, protocol: Protocol, direction: Direction, size: i64) -> Result<u32, i64> {
    if size <= 0 {
        return Ok(0);
    }

    let sock = get_sock_from_context(ctx)?;

    let tuple = match extract_flow(sock)? {
        Some(t) => t,
        None => return Ok(0),
    };

    emit(ctx, protocol, direction, tuple, get_pid(), size as u32);

    Ok(0)
}
