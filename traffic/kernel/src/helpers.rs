//! Helper functions for eBPF programs

use aya_ebpf::helpers::bpf_get_current_pid_tgid;

/// Get current process ID
///
/// Resolved from the invoking thread at the moment the probe fires, so
/// records report the caller of the operation, not the socket creator.
#[inline(always)]
pub fn get_pid() -> u32 {
    let pid_tgid = unsafe { bpf_get_current_pid_tgid() };
    (pid_tgid >> 32) as u32
}
