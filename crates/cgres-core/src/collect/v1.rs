//! cgroup v1 controller family (§4.C): one controller instance per
//! subsystem of interest, each over its own hierarchy mount.

use super::controller::{is_existing_directory, Controller, ControllerState};
use super::model::{MetricResult, DEFAULT_CPU_SHARES};
use super::reader::{read_key_value, read_number, read_number_or_max, read_signed, read_string, NumberOrMax};
use tracing::trace;

/// Construct the effective `subsystem_path` for a v1 controller (§4.C).
///
/// `root` is the cgroup that was the mount's root when it was created;
/// `cgroup_path` is this process's path as seen from the host. The three
/// cases correspond to: host or private-namespace container (1), a
/// host-namespace container pinned exactly at its cgroup root (2), and a
/// host-namespace container that has since moved to a sub-cgroup not fully
/// visible from inside the container (3).
pub fn construct_subsystem_path(root: &str, mount_point: &str, cgroup_path: &str) -> String {
    if root == "/" {
        return super::controller::concat_cgroup_path(mount_point, cgroup_path);
    }
    if root == cgroup_path {
        return mount_point.to_string();
    }

    // Try successive suffixes of cgroup_path, dropping leading components,
    // until mount_point + suffix names an existing directory. This makes
    // host-visible paths like /docker/<id>/x/y collapse to /x/y when only
    // /x/y is visible inside the container's own mount namespace.
    let components: Vec<&str> = cgroup_path.split('/').filter(|c| !c.is_empty()).collect();
    for start in 0..components.len() {
        let suffix = components[start..].join("/");
        let candidate = format!("{mount_point}/{suffix}");
        if is_existing_directory(&candidate) {
            return candidate;
        }
    }
    trace!(root, cgroup_path, mount_point, "v1 subsystem path suffix search exhausted; falling back to mount point");
    mount_point.to_string()
}

/// Which kernel subsystem a v1 controller instance backs. `Generic` covers
/// `cpuset` and `pids`, which need no special read logic beyond the shared
/// reader utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum V1Kind {
    Memory,
    Cpu,
    Cpuacct,
    Generic,
}

#[derive(Debug, Clone)]
pub struct V1Controller {
    pub kind: V1Kind,
    pub state: ControllerState,
}

impl V1Controller {
    pub fn new(kind: V1Kind, root: &str, mount_point: String, cgroup_path: String, read_only: bool) -> Self {
        let subsystem_path = construct_subsystem_path(root, &mount_point, &cgroup_path);
        let mut state = ControllerState::new(mount_point, cgroup_path, read_only);
        state.root_path = Some(root.to_string());
        state.subsystem_path = subsystem_path;
        V1Controller { kind, state }
    }
}

impl Controller for V1Controller {
    fn subsystem_path(&self) -> &str {
        &self.state.subsystem_path
    }
    fn mount_point(&self) -> &str {
        &self.state.mount_point
    }
    fn cgroup_path(&self) -> &str {
        &self.state.cgroup_path
    }
    fn is_read_only(&self) -> bool {
        self.state.read_only
    }
    fn needs_hierarchy_adjustment(&self) -> bool {
        match &self.state.root_path {
            Some(root) => root != &self.state.cgroup_path,
            None => false,
        }
    }
    fn set_subsystem_path(&mut self, path: String) {
        self.state.subsystem_path = path;
    }
}

impl V1Controller {
    /// `memory.limit_in_bytes`, preferring `memory.stat`'s
    /// `hierarchical_memory_limit` when `memory.use_hierarchy` is set and
    /// that value is strictly below the host-RAM upper bound.
    pub fn memory_limit_in_bytes(&self, host_mem_bound: u64) -> MetricResult {
        memory_limit_at(
            self.subsystem_path(),
            "memory.limit_in_bytes",
            "hierarchical_memory_limit",
            host_mem_bound,
        )
    }

    /// `memory.memsw.limit_in_bytes`, with the same unlimited semantics and
    /// a fallback to `hierarchical_memsw_limit`.
    pub fn memory_and_swap_limit_in_bytes(&self, host_mem_bound: u64) -> MetricResult {
        memory_limit_at(
            self.subsystem_path(),
            "memory.memsw.limit_in_bytes",
            "hierarchical_memsw_limit",
            host_mem_bound,
        )
    }

    pub fn memory_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_number(self.subsystem_path(), "memory.usage_in_bytes"))
    }

    pub fn memory_max_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_number(self.subsystem_path(), "memory.max_usage_in_bytes"))
    }

    pub fn memory_soft_limit_in_bytes(&self) -> MetricResult {
        number_or_max_metric(read_number_or_max(self.subsystem_path(), "memory.soft_limit_in_bytes"))
    }

    /// `memory.memsw.usage_in_bytes`.
    pub fn memory_and_swap_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_number(self.subsystem_path(), "memory.memsw.usage_in_bytes"))
    }

    /// Swappiness of zero forces the combined swap limit down to the plain
    /// memory limit (no swap permitted at all).
    pub fn swappiness_forbids_swap(&self) -> bool {
        read_number(self.subsystem_path(), "memory.swappiness") == Some(0)
    }

    pub fn rss_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_key_value(self.subsystem_path(), "memory.stat", "rss"))
    }

    pub fn cache_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_key_value(self.subsystem_path(), "memory.stat", "cache"))
    }

    pub fn cpu_quota(&self) -> MetricResult {
        match read_signed(self.subsystem_path(), "cpu.cfs_quota_us") {
            Some(-1) => MetricResult::Unlimited,
            Some(v) if v >= 0 => MetricResult::Count(v as u64),
            _ => MetricResult::Unavailable,
        }
    }

    pub fn cpu_period(&self) -> MetricResult {
        number_metric(read_number(self.subsystem_path(), "cpu.cfs_period_us"))
    }

    /// `cpu.shares`: the default value `1024` means "no share setup" and is
    /// reported as unlimited (the facade surfaces that as `-1`).
    pub fn cpu_shares(&self) -> MetricResult {
        match read_number(self.subsystem_path(), "cpu.shares") {
            Some(v) if v as i64 == DEFAULT_CPU_SHARES => MetricResult::Unlimited,
            Some(v) => MetricResult::Count(v),
            None => MetricResult::Unavailable,
        }
    }

    /// `cpuacct.usage`, nanoseconds converted to microseconds.
    pub fn cpu_usage_micros(&self) -> MetricResult {
        match read_number(self.subsystem_path(), "cpuacct.usage") {
            Some(ns) => MetricResult::Count(ns / 1000),
            None => MetricResult::Unavailable,
        }
    }

    pub fn cpuset_cpus(&self) -> Option<String> {
        read_string(self.subsystem_path(), "cpuset.cpus")
    }

    pub fn cpuset_mems(&self) -> Option<String> {
        read_string(self.subsystem_path(), "cpuset.mems")
    }

    pub fn pids_max(&self) -> MetricResult {
        number_or_max_metric(read_number_or_max(self.subsystem_path(), "pids.max"))
    }

    pub fn pids_current(&self) -> MetricResult {
        number_metric(read_number(self.subsystem_path(), "pids.current"))
    }

    /// Effective CPU count derived from this controller's quota/period, used
    /// only by the hierarchy adjuster to decide whether an ancestor cgroup
    /// imposes a concrete limit.
    pub fn effective_cpu_count(&self, host_cpus: u32) -> Option<f64> {
        effective_cpu_count_at(self.subsystem_path(), host_cpus)
    }
}

/// Free-standing form of [`V1Controller::memory_limit_in_bytes`] /
/// [`V1Controller::memory_and_swap_limit_in_bytes`] (selected by `file` /
/// `hierarchical_key`) that reads a given `subsystem_path` directly. Used by
/// the hierarchy adjuster, which probes candidate paths without holding a
/// live `V1Controller` borrow.
pub fn memory_limit_at(subsystem_path: &str, file: &str, hierarchical_key: &str, host_mem_bound: u64) -> MetricResult {
    let raw = match read_number(subsystem_path, file) {
        Some(v) => v,
        None => return MetricResult::Unavailable,
    };

    if raw < host_mem_bound {
        return MetricResult::Bytes(raw);
    }

    // At or above the host bound: this file alone says "unlimited", but
    // a hierarchical ancestor limit may still apply.
    let use_hierarchy = read_number(subsystem_path, "memory.use_hierarchy").unwrap_or(0) > 0;
    if use_hierarchy {
        if let Some(hier) = read_key_value(subsystem_path, "memory.stat", hierarchical_key) {
            if hier < host_mem_bound {
                return MetricResult::Bytes(hier);
            }
        }
    }
    trace!(file, raw, host_mem_bound, "v1 memory limit at/above host bound; reporting unlimited");
    MetricResult::Unlimited
}

/// Free-standing form of [`V1Controller::effective_cpu_count`]. See
/// [`memory_limit_at`] for why this is not a method.
pub fn effective_cpu_count_at(subsystem_path: &str, host_cpus: u32) -> Option<f64> {
    let quota = read_signed(subsystem_path, "cpu.cfs_quota_us")?;
    let period = read_number(subsystem_path, "cpu.cfs_period_us")?;
    if quota <= 0 || period == 0 {
        return None;
    }
    let cores = (quota as f64 / period as f64).ceil();
    Some(cores.min(host_cpus as f64))
}

fn number_metric(v: Option<u64>) -> MetricResult {
    match v {
        Some(v) => MetricResult::Bytes(v),
        None => MetricResult::Unavailable,
    }
}

fn number_or_max_metric(v: Option<NumberOrMax>) -> MetricResult {
    match v {
        Some(NumberOrMax::Value(v)) => MetricResult::Bytes(v),
        Some(NumberOrMax::Unlimited) => MetricResult::Unlimited,
        None => MetricResult::Unavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn subsystem_path_root_slash_with_root_cgroup() {
        assert_eq!(
            construct_subsystem_path("/", "/sys/fs/cgroup/memory", "/"),
            "/sys/fs/cgroup/memory"
        );
    }

    #[test]
    fn subsystem_path_root_slash_with_nested_cgroup() {
        assert_eq!(
            construct_subsystem_path("/", "/sys/fs/cgroup/memory", "/a/b"),
            "/sys/fs/cgroup/memory/a/b"
        );
    }

    #[test]
    fn subsystem_path_root_equals_cgroup_path() {
        assert_eq!(
            construct_subsystem_path("/docker/abc", "/sys/fs/cgroup/memory", "/docker/abc"),
            "/sys/fs/cgroup/memory"
        );
    }

    #[test]
    fn subsystem_path_suffix_search_falls_back_to_mount_point() {
        // No directory on disk matches any suffix, so this exhausts the
        // search and falls back to the mount point.
        assert_eq!(
            construct_subsystem_path("/docker/abc", "/sys/fs/cgroup/memory", "/docker/abc/x/y"),
            "/sys/fs/cgroup/memory"
        );
    }

    #[test]
    fn needs_hierarchy_adjustment_iff_root_differs_from_cgroup_path() {
        let c = V1Controller::new(
            V1Kind::Memory,
            "/docker/abc",
            "/sys/fs/cgroup/memory".into(),
            "/docker/abc".into(),
            false,
        );
        assert!(!c.needs_hierarchy_adjustment());

        let c2 = V1Controller::new(
            V1Kind::Memory,
            "/docker/abc",
            "/sys/fs/cgroup/memory".into(),
            "/docker/abc/sub".into(),
            false,
        );
        assert!(c2.needs_hierarchy_adjustment());
    }

    #[test]
    fn cpu_shares_default_is_unlimited() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.shares"), "1024\n").unwrap();
        let c = V1Controller::new(
            V1Kind::Cpu,
            "/",
            dir.path().to_str().unwrap().into(),
            "/".into(),
            false,
        );
        assert_eq!(c.cpu_shares(), MetricResult::Unlimited);
    }

    #[test]
    fn cpu_shares_nondefault_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.shares"), "512\n").unwrap();
        let c = V1Controller::new(
            V1Kind::Cpu,
            "/",
            dir.path().to_str().unwrap().into(),
            "/".into(),
            false,
        );
        assert_eq!(c.cpu_shares(), MetricResult::Count(512));
    }

    #[test]
    fn cpu_quota_unlimited_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.cfs_quota_us"), "-1\n").unwrap();
        let c = V1Controller::new(
            V1Kind::Cpu,
            "/",
            dir.path().to_str().unwrap().into(),
            "/".into(),
            false,
        );
        assert_eq!(c.cpu_quota(), MetricResult::Unlimited);
    }

    #[test]
    fn cpuacct_usage_converts_ns_to_micros() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpuacct.usage"), "5000000\n").unwrap();
        let c = V1Controller::new(
            V1Kind::Cpuacct,
            "/",
            dir.path().to_str().unwrap().into(),
            "/".into(),
            false,
        );
        assert_eq!(c.cpu_usage_micros(), MetricResult::Count(5000));
    }

    #[test]
    fn memory_limit_below_host_bound_is_reported_directly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.limit_in_bytes"), "1073741824\n").unwrap();
        let c = V1Controller::new(
            V1Kind::Memory,
            "/",
            dir.path().to_str().unwrap().into(),
            "/".into(),
            false,
        );
        assert_eq!(
            c.memory_limit_in_bytes(u64::MAX / 2),
            MetricResult::Bytes(1073741824)
        );
    }

    #[test]
    fn memory_limit_at_sentinel_is_unlimited() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.limit_in_bytes"), "9223372036854771712\n").unwrap();
        let c = V1Controller::new(
            V1Kind::Memory,
            "/",
            dir.path().to_str().unwrap().into(),
            "/".into(),
            false,
        );
        assert_eq!(c.memory_limit_in_bytes(17_179_869_184), MetricResult::Unlimited);
    }

    #[test]
    fn memory_limit_prefers_hierarchical_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.limit_in_bytes"), "9223372036854771712\n").unwrap();
        std::fs::write(dir.path().join("memory.use_hierarchy"), "1\n").unwrap();
        std::fs::write(
            dir.path().join("memory.stat"),
            "hierarchical_memory_limit 1073741824\n",
        )
        .unwrap();
        let c = V1Controller::new(
            V1Kind::Memory,
            "/",
            dir.path().to_str().unwrap().into(),
            "/".into(),
            false,
        );
        assert_eq!(
            c.memory_limit_in_bytes(17_179_869_184),
            MetricResult::Bytes(1073741824)
        );
    }

    proptest! {
        /// §8 invariant 5: with `root == "/"`, the subsystem path is the
        /// mount point alone when `cgroup_path == "/"`, and the mount point
        /// concatenated with `cgroup_path` otherwise.
        #[test]
        fn subsystem_path_root_slash_rule_holds_for_arbitrary_paths(
            mount_point in "/[a-z]{1,10}(/[a-z]{1,10}){0,3}",
            segment in "[a-z]{1,10}",
        ) {
            prop_assert_eq!(
                construct_subsystem_path("/", &mount_point, "/"),
                mount_point.clone()
            );
            let cgroup_path = format!("/{segment}");
            prop_assert_eq!(
                construct_subsystem_path("/", &mount_point, &cgroup_path),
                format!("{mount_point}{cgroup_path}")
            );
        }

        /// §8 invariant 10: `cpu_shares` reports `Unlimited` iff the raw
        /// `cpu.shares` file contains exactly `1024`.
        #[test]
        fn cpu_shares_is_unlimited_iff_raw_value_is_1024(raw in 0u64..1_000_000) {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("cpu.shares"), format!("{raw}\n")).unwrap();
            let c = V1Controller::new(
                V1Kind::Cpu,
                "/",
                dir.path().to_str().unwrap().into(),
                "/".into(),
                false,
            );
            if raw == 1024 {
                prop_assert_eq!(c.cpu_shares(), MetricResult::Unlimited);
            } else {
                prop_assert_eq!(c.cpu_shares(), MetricResult::Count(raw));
            }
        }
    }
}
