//! Host-wide comparison values: online logical CPU count and physical RAM.
//!
//! The detection subsystem needs these to decide whether a cgroup-reported
//! limit is actually *limiting* anything (a limit equal to the host value is
//! not a constraint) and to cap `active_processor_count` at what the host
//! actually has.

use std::fs;
use std::path::{Path, PathBuf};

/// Root used to locate `/proc/cpuinfo` and `/proc/meminfo`. Overridable via
/// `CGRES_PROC_ROOT` so fixture-driven tests can point this at a synthetic
/// tree instead of the real host `/proc`.
fn proc_root() -> PathBuf {
    match std::env::var_os("CGRES_PROC_ROOT") {
        Some(root) => PathBuf::from(root),
        None => PathBuf::from("/proc"),
    }
}

/// Number of logical CPUs visible to the host (not cgroup-adjusted).
///
/// Counts `processor` lines in `/proc/cpuinfo`; falls back to
/// `sysconf(_SC_NPROCESSORS_ONLN)` if that yields nothing, and finally to 1.
pub fn host_online_cpus() -> u32 {
    host_online_cpus_from(&proc_root())
}

fn host_online_cpus_from(root: &Path) -> u32 {
    let path = root.join("cpuinfo");
    if let Ok(contents) = fs::read_to_string(&path) {
        let count = contents
            .lines()
            .filter(|line| line.trim_start().starts_with("processor"))
            .count() as u32;
        if count > 0 {
            return count;
        }
    }
    sysconf_nprocessors_onln().unwrap_or(1)
}

#[cfg(unix)]
fn sysconf_nprocessors_onln() -> Option<u32> {
    // SAFETY: `_SC_NPROCESSORS_ONLN` is a read-only query with no side
    // effects; a negative return means "unavailable", handled below.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n > 0 {
        Some(n as u32)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn sysconf_nprocessors_onln() -> Option<u32> {
    None
}

/// Total physical memory of the host, in bytes.
///
/// Reads `MemTotal` from `/proc/meminfo` (reported in kB). Returns `None` if
/// the file is missing or the line cannot be parsed.
pub fn host_physical_memory_bytes() -> Option<u64> {
    host_physical_memory_bytes_from(&proc_root())
}

fn host_physical_memory_bytes_from(root: &Path) -> Option<u64> {
    let path = root.join("meminfo");
    let contents = fs::read_to_string(path).ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            return kb.checked_mul(1024);
        }
    }
    None
}
