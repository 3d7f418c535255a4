//! The public facade (§4.G): a single `ResourceLimits` handle dispatching
//! every query to whichever controller family the factory detected, with
//! the hot-path metrics (memory limit, processor count) wrapped in a
//! [`MetricCache`].

use super::cache::{default_ttl, MetricCache};
use super::model::{CgroupVersion, MetricResult};
use super::v1::V1Controller;
use super::v2::V2Controller;

/// Which controller family backs a [`ResourceLimits`] instance.
pub enum Backing {
    V1 {
        memory: V1Controller,
        cpu: V1Controller,
        cpuacct: V1Controller,
        cpuset: V1Controller,
        pids: V1Controller,
    },
    V2 {
        /// Hierarchy-adjusted for memory-related reads.
        memory: V2Controller,
        /// Hierarchy-adjusted for CPU-related reads.
        cpu: V2Controller,
        /// Never hierarchy-adjusted; backs `cpuset.*` and `pids.*`.
        misc: V2Controller,
    },
}

/// The uniform view onto whatever cgroup regime (or lack of one) the host
/// provides. Constructed only by [`super::factory::detect`].
pub struct ResourceLimits {
    backing: Backing,
    version: CgroupVersion,
    is_containerized: bool,
    host_cpus: u32,
    host_mem_bound: u64,
    memory_limit_cache: MetricCache<MetricResult>,
    processor_count_cache: MetricCache<u32>,
}

impl ResourceLimits {
    pub(crate) fn new(
        backing: Backing,
        version: CgroupVersion,
        is_containerized: bool,
        host_cpus: u32,
        host_mem_bound: u64,
    ) -> Self {
        let ttl = default_ttl();
        ResourceLimits {
            backing,
            version,
            is_containerized,
            host_cpus,
            host_mem_bound,
            memory_limit_cache: MetricCache::new(ttl),
            processor_count_cache: MetricCache::new(ttl),
        }
    }

    /// `"cgroupv1"` or `"cgroupv2"`.
    pub fn container_type(&self) -> &'static str {
        self.version.container_type()
    }

    /// Whether the detected cgroup scope is narrower than the whole host
    /// (§4.F: at least one of memory/cpu/cpuset/pids has a non-root cgroup
    /// path, or, on v2, the single unified path is non-root).
    pub fn is_containerized(&self) -> bool {
        self.is_containerized
    }

    pub fn host_online_cpus(&self) -> u32 {
        self.host_cpus
    }

    pub fn memory_limit_in_bytes(&self) -> MetricResult {
        self.memory_limit_cache.get_or_compute(|| match &self.backing {
            Backing::V1 { memory, .. } => memory.memory_limit_in_bytes(self.host_mem_bound),
            Backing::V2 { memory, .. } => memory.memory_limit_in_bytes(),
        })
    }

    pub fn memory_usage_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { memory, .. } => memory.memory_usage_in_bytes(),
            Backing::V2 { memory, .. } => memory.memory_usage_in_bytes(),
        }
    }

    pub fn memory_max_usage_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { memory, .. } => memory.memory_max_usage_in_bytes(),
            Backing::V2 { memory, .. } => memory.memory_max_usage_in_bytes(),
        }
    }

    pub fn memory_soft_limit_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { memory, .. } => memory.memory_soft_limit_in_bytes(),
            Backing::V2 { memory, .. } => memory.memory_soft_limit_in_bytes(),
        }
    }

    /// Only meaningful on v2 (`memory.high`); v1 has no direct analogue.
    pub fn memory_throttle_limit_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { .. } => MetricResult::Unavailable,
            Backing::V2 { memory, .. } => memory.memory_throttle_limit_in_bytes(),
        }
    }

    pub fn memory_and_swap_limit_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { memory, .. } => {
                if memory.swappiness_forbids_swap() {
                    memory.memory_limit_in_bytes(self.host_mem_bound)
                } else {
                    memory.memory_and_swap_limit_in_bytes(self.host_mem_bound)
                }
            }
            Backing::V2 { memory, .. } => memory.memory_and_swap_limit_in_bytes(),
        }
    }

    pub fn memory_and_swap_usage_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { memory, .. } => memory.memory_and_swap_usage_in_bytes(),
            Backing::V2 { memory, .. } => memory.memory_and_swap_usage_in_bytes(),
        }
    }

    pub fn rss_usage_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { memory, .. } => memory.rss_usage_in_bytes(),
            Backing::V2 { memory, .. } => memory.rss_usage_in_bytes(),
        }
    }

    pub fn cache_usage_in_bytes(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { memory, .. } => memory.cache_usage_in_bytes(),
            Backing::V2 { memory, .. } => memory.cache_usage_in_bytes(),
        }
    }

    /// `memory_limit - memory_usage`, when both are known.
    pub fn available_memory_in_bytes(&self) -> MetricResult {
        match (self.memory_limit_in_bytes(), self.memory_usage_in_bytes()) {
            (MetricResult::Bytes(limit), MetricResult::Bytes(usage)) => MetricResult::Bytes(limit.saturating_sub(usage)),
            _ => MetricResult::Unavailable,
        }
    }

    /// `(memsw_limit - mem_limit) - (memsw_usage - mem_usage)`, each
    /// difference clamped at zero before subtracting, since headroom can
    /// never be negative.
    pub fn available_swap_in_bytes(&self) -> MetricResult {
        let (memsw_limit, mem_limit, memsw_usage, mem_usage) = (
            self.memory_and_swap_limit_in_bytes(),
            self.memory_limit_in_bytes(),
            self.memory_and_swap_usage_in_bytes(),
            self.memory_usage_in_bytes(),
        );
        match (memsw_limit, mem_limit, memsw_usage, mem_usage) {
            (MetricResult::Bytes(sl), MetricResult::Bytes(ml), MetricResult::Bytes(su), MetricResult::Bytes(mu)) => {
                let limit_headroom = sl.saturating_sub(ml);
                let usage_headroom = su.saturating_sub(mu);
                MetricResult::Bytes(limit_headroom.saturating_sub(usage_headroom))
            }
            _ => MetricResult::Unavailable,
        }
    }

    pub fn cpu_quota(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { cpu, .. } => cpu.cpu_quota(),
            Backing::V2 { cpu, .. } => cpu.cpu_quota(),
        }
    }

    pub fn cpu_period(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { cpu, .. } => cpu.cpu_period(),
            Backing::V2 { cpu, .. } => cpu.cpu_period(),
        }
    }

    pub fn cpu_shares(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { cpu, .. } => cpu.cpu_shares(),
            Backing::V2 { cpu, .. } => cpu.cpu_shares(),
        }
    }

    pub fn cpu_usage_micros(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { cpuacct, .. } => cpuacct.cpu_usage_micros(),
            Backing::V2 { cpu, .. } => cpu.cpu_usage_micros(),
        }
    }

    pub fn cpuset_cpus(&self) -> Option<String> {
        match &self.backing {
            Backing::V1 { cpuset, .. } => cpuset.cpuset_cpus(),
            Backing::V2 { misc, .. } => misc.cpuset_cpus(),
        }
    }

    pub fn cpuset_memory_nodes(&self) -> Option<String> {
        match &self.backing {
            Backing::V1 { cpuset, .. } => cpuset.cpuset_mems(),
            Backing::V2 { misc, .. } => misc.cpuset_mems(),
        }
    }

    pub fn pids_max(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { pids, .. } => pids.pids_max(),
            Backing::V2 { misc, .. } => misc.pids_max(),
        }
    }

    pub fn pids_current(&self) -> MetricResult {
        match &self.backing {
            Backing::V1 { pids, .. } => pids.pids_current(),
            Backing::V2 { misc, .. } => misc.pids_current(),
        }
    }

    /// `min(host_cpus, ceil(quota / period))` when a concrete quota/period
    /// pair is set, else `host_cpus`. Deliberately ignores CPU shares/weight,
    /// which express relative priority rather than a hard cap.
    pub fn active_processor_count(&self) -> u32 {
        self.processor_count_cache
            .get_or_compute(|| compute_active_processor_count(self.cpu_quota(), self.cpu_period(), self.host_cpus))
    }
}

/// Pure core of [`ResourceLimits::active_processor_count`], pulled out of the
/// cache closure so it can be exercised directly against arbitrary inputs.
fn compute_active_processor_count(quota: MetricResult, period: MetricResult, host_cpus: u32) -> u32 {
    match (quota, period) {
        (MetricResult::Count(q), MetricResult::Count(p)) if q > 0 && p > 0 => {
            let cores = (q as f64 / p as f64).ceil() as u32;
            cores.clamp(1, host_cpus)
        }
        _ => host_cpus,
    }
}
