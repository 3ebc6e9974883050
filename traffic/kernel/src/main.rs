//! eBPF Traffic Probe - Kernel Space Program
//!
//! This eBPF program samples per-socket-operation traffic at the kernel
//! level by attaching to the transport-layer send and receive paths for
//! TCP and UDP, under both IPv4 and IPv6.
//!
//! Each probe runs inline on the thread already performing the socket
//! operation: it extracts the flow identity from the socket, classifies
//! the call site into one of four (protocol, family) channels, and
//! publishes a fixed-shape record through a per-CPU perf buffer. Nothing
//! here blocks, allocates, or alters the instrumented call.
//!
//! ## Architecture
//!
//! ```text
//! tcp_sendmsg() ----.
//! tcp_cleanup_rbuf()-+-> extract flow -> classify -> TCP4/TCP6 channel
//! udp_sendmsg() ----.
//! udpv6_sendmsg() ---+-> extract flow -> classify -> UDP4/UDP6 channel
//! udp_recvmsg() ----'
//! udpv6_recvmsg() --'
//!                  |
//!                  v
//! Userspace     -> drain channels per CPU, aggregate per flow
//! ```
//!
//! ## Usage
//!
//! This program must be compiled for the bpfel-unknown-none target:
//!
//! ```bash
//! cargo build --release --target=bpfel-unknown-none
//! ```
//!
//! The compiled bytecode is then loaded by the userspace program.

#![no_std]
#![no_main]

mod handlers;
mod helpers;
mod maps;
mod socket_parser;

// Re-export kprobe functions so they're visible to the loader
pub use handlers::{
    tcp_cleanup_rbuf, tcp_sendmsg, udp_recvmsg, udp_sendmsg, udpv6_recvmsg, udpv6_sendmsg,
};

// Re-export maps for verification
pub use maps::{TCP4_EVENTS, TCP6_EVENTS, UDP4_EVENTS, UDP6_EVENTS};

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    // eBPF programs cannot panic - this should never be reached
    // The verifier should catch any potential panics
    loop {}
}
