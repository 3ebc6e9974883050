//! Socket structure parsing
//!
//! The flow extractor: given a kernel socket, derives the normalized flow
//! identity (family, source/destination address, local/remote port) that
//! every probe publishes. Pure and side-effect free; all kernel memory is
//! read through bpf_probe_read_kernel, never dereferenced directly.

// Kernel struct names are kept verbatim
#![allow(non_camel_case_types)]

use aya_ebpf::{helpers::bpf_probe_read_kernel, programs::ProbeContext};
use core::ptr::addr_of;
use probe_common::constants::{AF_INET, AF_INET6};

/// Kernel struct sock representation (partial)
///
/// We only define the fields we need, laid out as the kernel lays out
/// struct sock_common at the head of struct sock.
#[repr(C)]
pub struct sock {
    __sk_common: sock_common,
}

/// Kernel struct sock_common (partial)
///
/// Field order and padding mirror the kernel so the IPv6 addresses land
/// at their real offsets. Unions are collapsed to the member we read.
#[repr(C)]
#[allow(dead_code)]
struct sock_common {
    skc_daddr: u32,          // Destination address (network byte order)
    skc_rcv_saddr: u32,      // Source address (network byte order)
    skc_hash: u32,           // Hash union, unused here
    skc_dport: u16,          // Destination port (network byte order)
    skc_num: u16,            // Local port (host byte order)
    skc_family: u16,         // Address family (AF_INET, AF_INET6)
    skc_state: u8,           // Connection state
    skc_flags: u8,           // reuse/reuseport/ipv6only bitfield
    skc_bound_dev_if: i32,   // Bound device index
    skc_bind_node: [usize; 2],
    skc_prot: usize,
    skc_net: usize,
    skc_v6_daddr: [u8; 16],     // IPv6 destination address
    skc_v6_rcv_saddr: [u8; 16], // IPv6 source address
}

/// Normalized flow identity for one socket operation
///
/// Ports are already in host byte order: `lport` is stored host-order by
/// the kernel, `dport` is byte-swapped here and nowhere else.
#[derive(Clone, Copy)]
pub enum FlowTuple {
    V4 {
        saddr: u32,
        daddr: u32,
        lport: u16,
        dport: u16,
    },
    V6 {
        saddr: u128,
        daddr: u128,
        lport: u16,
        dport: u16,
    },
}

impl FlowTuple {
    /// Address family this tuple was extracted from
    pub fn family(&self) -> u16 {
        match self {
            FlowTuple::V4 { .. } => AF_INET,
            FlowTuple::V6 { .. } => AF_INET6,
        }
    }
}

/// Extract socket pointer from kprobe context
///
/// The first argument to every probed transport function is a pointer
/// to struct sock.
#[inline(always)]
pub fn get_sock_from_context(ctx: &ProbeContext) -> Result<*const sock, i64> {
    ctx.arg::<*const sock>(0).ok_or(-1)
}

/// Extract the flow identity from a socket
///
/// Returns Ok(None) for address families other than AF_INET/AF_INET6;
/// that is a defined no-op, not an error. A failed IPv6 address copy
/// degrades to an all-zero address rather than dropping the sample,
/// because pid, ports and size are still informative.
///
/// # Safety
///
/// Uses bpf_probe_read_kernel to safely read from kernel memory.
/// The BPF verifier ensures this is safe.
pub fn extract_flow(sock_ptr: *const sock) -> Result<Option<FlowTuple>, i64> {
    if sock_ptr.is_null() {
        return Err(-1);
    }

    let common_ptr = unsafe { addr_of!((*sock_ptr).__sk_common) };

    let family =
        unsafe { bpf_probe_read_kernel(addr_of!((*common_ptr).skc_family)).map_err(|_| -1)? };

    match family {
        AF_INET => {
            let saddr = unsafe {
                bpf_probe_read_kernel(addr_of!((*common_ptr).skc_rcv_saddr)).map_err(|_| -1)?
            };
            let daddr = unsafe {
                bpf_probe_read_kernel(addr_of!((*common_ptr).skc_daddr)).map_err(|_| -1)?
            };
            let (lport, dport) = read_ports(common_ptr)?;
            Ok(Some(FlowTuple::V4 {
                saddr,
                daddr,
                lport,
                dport,
            }))
        }
        AF_INET6 => {
            let saddr = unsafe {
                bpf_probe_read_kernel(addr_of!((*common_ptr).skc_v6_rcv_saddr)).unwrap_or([0; 16])
            };
            let daddr = unsafe {
                bpf_probe_read_kernel(addr_of!((*common_ptr).skc_v6_daddr)).unwrap_or([0; 16])
            };
            let (lport, dport) = read_ports(common_ptr)?;
            Ok(Some(FlowTuple::V6 {
                saddr: u128::from_ne_bytes(saddr),
                daddr: u128::from_ne_bytes(daddr),
                lport,
                dport,
            }))
        }
        _ => Ok(None),
    }
}

/// Read both ports, converting the remote port from network byte order
///
/// The one place in the capture path where byte order is converted.
#[inline(always)]
fn read_ports(common_ptr: *const sock_common) -> Result<(u16, u16), i64> {
    let lport =
        unsafe { bpf_probe_read_kernel(addr_of!((*common_ptr).skc_num)).map_err(|_| -1)? };
    let dport =
        unsafe { bpf_probe_read_kernel(addr_of!((*common_ptr).skc_dport)).map_err(|_| -1)? };
    Ok((lport, u16::from_be(dport)))
}
