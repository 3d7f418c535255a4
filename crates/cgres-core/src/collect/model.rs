//! Shared data model for the cgroup detection subsystem: the tagged metric
//! result type returned across the facade, and the transient records the
//! factory builds while parsing `/proc`.

use serde::{Deserialize, Serialize};

/// Per-CPU-shares constant (1024): the convention cgroup v1's `cpu.shares`
/// and the inverse of cgroup v2's `cpu.weight` conversion both use, matching
/// what Kubernetes/AWS/Mesos treat as "one full CPU" of share weight.
pub const PER_CPU_SHARES: i64 = 1024;

/// Value read from `cpu.shares` (v1) or `cpu.weight` (v2) that means
/// "no share setup was requested" and is reported as `-1`.
pub const DEFAULT_CPU_SHARES: i64 = PER_CPU_SHARES;

/// Default `cpu.weight` (v2) corresponding to "no share setup".
pub const DEFAULT_CPU_WEIGHT: i64 = 100;

/// A value returned across the subsystem facade.
///
/// Replaces the overloaded sentinel values (`-1`, `OSCONTAINER_ERROR`,
/// `value_unlimited`) that a C implementation would use: every caller must
/// match on the variant rather than compare against a magic number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricResult {
    /// The metric could not be determined (missing file, parse failure,
    /// path too long, or no cgroup support at all). Callers fall back to a
    /// host-wide measurement.
    Unavailable,
    /// The controller imposes no limit for this metric.
    Unlimited,
    /// A byte count (memory limits/usage).
    Bytes(u64),
    /// A dimensionless count (PIDs, CPU shares/weight when not unlimited).
    Count(u64),
    /// A CPU core count, possibly fractional (`active_processor_count` is
    /// always a whole count but `Cpus` also backs any future fractional
    /// reporting such as a cpuset-derived effective count).
    Cpus(f64),
}

impl MetricResult {
    /// The byte value, if this is `Bytes`.
    pub fn as_bytes(&self) -> Option<u64> {
        match self {
            MetricResult::Bytes(v) => Some(*v),
            _ => None,
        }
    }

    /// True if the controller reported no limit at all.
    pub fn is_unlimited(&self) -> bool {
        matches!(self, MetricResult::Unlimited)
    }

    /// True if the metric could not be read.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, MetricResult::Unavailable)
    }
}

/// Which cgroup regime was detected on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CgroupVersion {
    V1,
    V2,
}

impl CgroupVersion {
    /// The literal string the facade's `container_type()` reports.
    pub fn container_type(&self) -> &'static str {
        match self {
            CgroupVersion::V1 => "cgroupv1",
            CgroupVersion::V2 => "cgroupv2",
        }
    }
}

/// One line of `/proc/cgroups`: `name hierarchy_id num_cgroups enabled`.
#[derive(Debug, Clone)]
pub struct CgroupRegistryEntry {
    pub name: String,
    pub hierarchy_id: u32,
    pub enabled: bool,
}

/// A process's cgroup path for one controller, from `/proc/self/cgroup`.
#[derive(Debug, Clone)]
pub struct CgroupInfo {
    pub name: String,
    pub hierarchy_id: u32,
    pub path: String,
}

/// One `cgroup`/`cgroup2` entry parsed from `/proc/self/mountinfo`.
#[derive(Debug, Clone)]
pub struct MountInfo {
    pub mount_id: u32,
    pub fs_type: String,
    /// Comma-separated controller names (v1 super-options); empty for v2.
    pub super_options: Vec<String>,
    /// Root inside the cgroup namespace (mountinfo field 4).
    pub root: String,
    /// Mount point inside the process's filesystem namespace (field 5).
    pub mount_point: String,
    pub read_only: bool,
}
