//! Container-aware resource detection.
//!
//! Parses the host's cgroup v1/v2 interface files to answer the questions a
//! managed runtime needs before sizing its heap and thread pools: how much
//! memory and how many CPUs is this process actually confined to, which may
//! be far less than what the host itself reports.

mod cache;
mod controller;
mod facade;
mod factory;
mod hierarchy;
mod host;
mod model;
mod reader;
mod v1;
mod v2;

pub use facade::ResourceLimits;
pub use factory::detect;
pub use host::{host_online_cpus, host_physical_memory_bytes};
pub use model::{CgroupVersion, MetricResult, DEFAULT_CPU_SHARES, DEFAULT_CPU_WEIGHT, PER_CPU_SHARES};
