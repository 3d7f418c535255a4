//! Ambient environment-variable configuration (no file-based config: this
//! subsystem is too narrow to warrant one).

use std::time::Duration;

use serde::Serialize;

/// Snapshot of the environment variables the detection subsystem consults.
/// Constructed once at CLI startup purely for diagnostics (`cgres probe
/// --format json` includes it); the individual modules (`host`, `factory`,
/// `cache`) read these same variables directly rather than threading this
/// struct through, since each one only ever needs its own variable.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorConfig {
    /// Override for the `/proc`-like root the factory and host probe read
    /// from. Consumed by [`crate::collect::detect`] and the host probe.
    pub proc_root: Option<String>,
    /// Override for the default 20 ms `MetricCache` TTL. Consumed by the
    /// facade at construction.
    pub cache_ttl_ms: u64,
    /// Override for the assumed cgroup mount root. Present for symmetry with
    /// `CGRES_PROC_ROOT` and surfaced in diagnostics, but not consumed by
    /// detection: cgroup v1 exposes one mount per controller and the actual
    /// mount points are read from `/proc/self/mountinfo`, so a single root
    /// override cannot substitute for that without ambiguity. Fixture tests
    /// use `CGRES_PROC_ROOT` plus a synthetic `mountinfo` instead.
    pub cgroup_root: Option<String>,
}

impl DetectorConfig {
    pub fn from_env() -> Self {
        DetectorConfig {
            proc_root: std::env::var("CGRES_PROC_ROOT").ok(),
            cache_ttl_ms: std::env::var("CGRES_CACHE_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            cgroup_root: std::env::var("CGRES_CGROUP_ROOT").ok(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_ttl_is_twenty_millis() {
        std::env::remove_var("CGRES_CACHE_TTL_MS");
        assert_eq!(DetectorConfig::from_env().cache_ttl(), Duration::from_millis(20));
    }

    #[test]
    fn cache_ttl_override_is_read_back() {
        std::env::set_var("CGRES_CACHE_TTL_MS", "5");
        assert_eq!(DetectorConfig::from_env().cache_ttl(), Duration::from_millis(5));
        std::env::remove_var("CGRES_CACHE_TTL_MS");
    }
}
