//! cgroup v2 unified controller (§4.D): every subsystem query routes
//! through the single `subsystem_path` this controller owns.

use super::controller::{concat_cgroup_path, Controller, ControllerState};
use super::model::{MetricResult, DEFAULT_CPU_WEIGHT, PER_CPU_SHARES};
use super::reader::{
    read_key_value, read_number, read_number_or_max, read_string, read_tuple, NumberOrMax, TupleField,
    TupleValue,
};

#[derive(Debug, Clone)]
pub struct V2Controller {
    pub state: ControllerState,
}

impl V2Controller {
    pub fn new(mount_point: String, cgroup_path: String, read_only: bool) -> Self {
        let subsystem_path = concat_cgroup_path(&mount_point, &cgroup_path);
        let mut state = ControllerState::new(mount_point, cgroup_path, read_only);
        state.subsystem_path = subsystem_path;
        V2Controller { state }
    }
}

impl Controller for V2Controller {
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
        self.state.cgroup_path != "/"
    }
    fn set_subsystem_path(&mut self, path: String) {
        self.state.subsystem_path = path;
    }
}

impl V2Controller {
    pub fn memory_limit_in_bytes(&self) -> MetricResult {
        memory_limit_at(self.subsystem_path())
    }

    pub fn memory_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_number(self.subsystem_path(), "memory.current"))
    }

    pub fn memory_max_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_number(self.subsystem_path(), "memory.peak"))
    }

    pub fn memory_soft_limit_in_bytes(&self) -> MetricResult {
        number_or_max_metric(read_number_or_max(self.subsystem_path(), "memory.low"))
    }

    pub fn memory_throttle_limit_in_bytes(&self) -> MetricResult {
        number_or_max_metric(read_number_or_max(self.subsystem_path(), "memory.high"))
    }

    /// `memory.swap.max` missing (kernel compiled without swap accounting)
    /// is "swap disabled": the combined limit then equals the plain memory
    /// limit rather than `Unavailable`.
    pub fn memory_and_swap_limit_in_bytes(&self) -> MetricResult {
        let mem = self.memory_limit_in_bytes();
        match read_number_or_max(self.subsystem_path(), "memory.swap.max") {
            None => mem,
            Some(NumberOrMax::Unlimited) => MetricResult::Unlimited,
            Some(NumberOrMax::Value(swap)) => match mem {
                MetricResult::Bytes(m) => MetricResult::Bytes(m.saturating_add(swap)),
                MetricResult::Unlimited => MetricResult::Unlimited,
                other => other,
            },
        }
    }

    pub fn memory_and_swap_usage_in_bytes(&self) -> MetricResult {
        let mem = self.memory_usage_in_bytes();
        match read_number(self.subsystem_path(), "memory.swap.current") {
            None => mem,
            Some(swap) => match mem {
                MetricResult::Bytes(m) => MetricResult::Bytes(m.saturating_add(swap)),
                other => other,
            },
        }
    }

    pub fn rss_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_key_value(self.subsystem_path(), "memory.stat", "anon"))
    }

    pub fn cache_usage_in_bytes(&self) -> MetricResult {
        number_metric(read_key_value(self.subsystem_path(), "memory.stat", "file"))
    }

    pub fn cpu_quota(&self) -> MetricResult {
        match read_tuple(self.subsystem_path(), "cpu.max", TupleField::First) {
            Some(TupleValue::Unlimited) => MetricResult::Unlimited,
            Some(TupleValue::Value(v)) if v >= 0 => MetricResult::Count(v as u64),
            _ => MetricResult::Unavailable,
        }
    }

    pub fn cpu_period(&self) -> MetricResult {
        match read_tuple(self.subsystem_path(), "cpu.max", TupleField::Second) {
            Some(TupleValue::Value(v)) if v >= 0 => MetricResult::Count(v as u64),
            _ => MetricResult::Unavailable,
        }
    }

    /// `cpu.weight` (1..10000, default 100) mapped to its v1-equivalent
    /// share count. See [`weight_to_shares`] for the rounding rule.
    pub fn cpu_shares(&self) -> MetricResult {
        match read_number(self.subsystem_path(), "cpu.weight") {
            Some(w) if w as i64 == DEFAULT_CPU_WEIGHT => MetricResult::Unlimited,
            Some(w) => MetricResult::Count(weight_to_shares(w as i64) as u64),
            None => MetricResult::Unavailable,
        }
    }

    /// `cpu.stat`'s `usage_usec`, already in microseconds.
    pub fn cpu_usage_micros(&self) -> MetricResult {
        number_metric(read_key_value(self.subsystem_path(), "cpu.stat", "usage_usec"))
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

    /// Effective CPU count derived from `cpu.max`, used only by the
    /// hierarchy adjuster.
    pub fn effective_cpu_count(&self, host_cpus: u32) -> Option<f64> {
        effective_cpu_count_at(self.subsystem_path(), host_cpus)
    }
}

/// Free-standing form of [`V2Controller::memory_limit_in_bytes`] that reads a
/// given `subsystem_path` directly. Used by the hierarchy adjuster, which
/// probes candidate paths without holding a live `V2Controller` borrow.
pub fn memory_limit_at(subsystem_path: &str) -> MetricResult {
    number_or_max_metric(read_number_or_max(subsystem_path, "memory.max"))
}

/// Free-standing form of [`V2Controller::effective_cpu_count`]. See
/// [`memory_limit_at`] for why this is not a method.
pub fn effective_cpu_count_at(subsystem_path: &str, host_cpus: u32) -> Option<f64> {
    let quota = match read_tuple(subsystem_path, "cpu.max", TupleField::First)? {
        TupleValue::Unlimited => return None,
        TupleValue::Value(v) => v,
    };
    let period = match read_tuple(subsystem_path, "cpu.max", TupleField::Second)? {
        TupleValue::Value(v) => v,
        TupleValue::Unlimited => return None,
    };
    if quota <= 0 || period <= 0 {
        return None;
    }
    let cores = (quota as f64 / period as f64).ceil();
    Some(cores.min(host_cpus as f64))
}

/// Inverse of the documented `weight = 1 + ((share - 2) * 9999 / 262142)`
/// mapping, rounded to the nearest multiple of [`PER_CPU_SHARES`] (1024).
/// The forward mapping is lossy, so an exact round-trip is not possible;
/// rounding to the nearest 1024 produces a conservative v1-equivalent share
/// count rather than a fractional one.
pub fn weight_to_shares(weight: i64) -> i64 {
    let share = 2 + ((weight - 1) * 262142) / 9999;
    let half_step = PER_CPU_SHARES / 2;
    ((share + half_step) / PER_CPU_SHARES) * PER_CPU_SHARES
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

    fn controller_at(dir: &std::path::Path) -> V2Controller {
        V2Controller::new(dir.to_str().unwrap().into(), "/".into(), false)
    }

    #[test]
    fn subsystem_path_root_cgroup() {
        let c = V2Controller::new("/sys/fs/cgroup".into(), "/".into(), false);
        assert_eq!(c.subsystem_path(), "/sys/fs/cgroup");
    }

    #[test]
    fn subsystem_path_nested_cgroup() {
        let c = V2Controller::new("/sys/fs/cgroup".into(), "/foobar".into(), false);
        assert_eq!(c.subsystem_path(), "/sys/fs/cgroup/foobar");
    }

    #[test]
    fn needs_hierarchy_adjustment_iff_not_root() {
        assert!(!V2Controller::new("/x".into(), "/".into(), false).needs_hierarchy_adjustment());
        assert!(V2Controller::new("/x".into(), "/app".into(), false).needs_hierarchy_adjustment());
    }

    #[test]
    fn memory_max_literal_is_unlimited() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.max"), "max\n").unwrap();
        let c = controller_at(dir.path());
        assert_eq!(c.memory_limit_in_bytes(), MetricResult::Unlimited);
    }

    #[test]
    fn swap_coalescing_sums_memory_and_swap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.max"), format!("{}\n", 100 * 1024 * 1024)).unwrap();
        std::fs::write(dir.path().join("memory.swap.max"), format!("{}\n", 50 * 1024 * 1024)).unwrap();
        let c = controller_at(dir.path());
        assert_eq!(
            c.memory_and_swap_limit_in_bytes(),
            MetricResult::Bytes(150 * 1024 * 1024)
        );
    }

    #[test]
    fn swap_coalescing_falls_back_when_swap_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memory.max"), format!("{}\n", 100 * 1024 * 1024)).unwrap();
        let c = controller_at(dir.path());
        assert_eq!(
            c.memory_and_swap_limit_in_bytes(),
            MetricResult::Bytes(100 * 1024 * 1024)
        );
    }

    #[test]
    fn cpu_max_unlimited_quota() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.max"), "max 100000\n").unwrap();
        let c = controller_at(dir.path());
        assert_eq!(c.cpu_quota(), MetricResult::Unlimited);
        assert_eq!(c.cpu_period(), MetricResult::Count(100000));
    }

    #[test]
    fn cpu_weight_default_is_unlimited() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.weight"), "100\n").unwrap();
        let c = controller_at(dir.path());
        assert_eq!(c.cpu_shares(), MetricResult::Unlimited);
    }

    #[test]
    fn cpu_weight_nondefault_maps_to_shares() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.weight"), "200\n").unwrap();
        let c = controller_at(dir.path());
        match c.cpu_shares() {
            MetricResult::Count(v) => assert_eq!(v % 1024, 0),
            other => panic!("expected Count, got {other:?}"),
        }
    }

    #[test]
    fn cpu_stat_usage_usec_not_divided() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.stat"), "usage_usec 12345\nuser_usec 100\n").unwrap();
        let c = controller_at(dir.path());
        assert_eq!(c.cpu_usage_micros(), MetricResult::Count(12345));
    }

    proptest! {
        /// §8 invariant 6 restated for the v2 constructor: `subsystem_path`
        /// always equals `concat_cgroup_path(mount_point, cgroup_path)`.
        #[test]
        fn new_subsystem_path_matches_concat_rule(
            mount_point in "/[a-z]{1,12}(/[a-z]{1,12}){0,3}",
            segment in "[a-z]{1,12}",
        ) {
            let root = V2Controller::new(mount_point.clone(), "/".into(), false);
            prop_assert_eq!(root.subsystem_path(), mount_point.as_str());

            let cgroup_path = format!("/{segment}");
            let nested = V2Controller::new(mount_point.clone(), cgroup_path.clone(), false);
            prop_assert_eq!(nested.subsystem_path(), format!("{mount_point}{cgroup_path}"));
        }

        /// §8 invariant 10: `cpu_shares` reports `Unlimited` iff the raw
        /// `cpu.weight` file contains exactly `100`, the v2 default.
        #[test]
        fn cpu_shares_is_unlimited_iff_raw_weight_is_100(raw in 1u64..10_000) {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("cpu.weight"), format!("{raw}\n")).unwrap();
            let c = controller_at(dir.path());
            if raw == 100 {
                prop_assert_eq!(c.cpu_shares(), MetricResult::Unlimited);
            } else {
                match c.cpu_shares() {
                    MetricResult::Count(_) => {}
                    other => prop_assert!(false, "expected Count, got {other:?}"),
                }
            }
        }
    }
}
