//! Subsystem factory (§4.F): parses `/proc/cgroups`, `/proc/self/cgroup` and
//! `/proc/self/mountinfo`, classifies the host's cgroup regime, constructs
//! the matching controller family, runs the hierarchy adjuster, and hands
//! back a [`ResourceLimits`] facade.

use std::path::PathBuf;

use cgres_common::Error;
use tracing::{debug, trace};

use super::controller::{is_existing_directory, Controller};
use super::facade::{Backing, ResourceLimits};
use super::hierarchy;
use super::host::{host_online_cpus, host_physical_memory_bytes};
use super::model::{CgroupInfo, CgroupRegistryEntry, CgroupVersion, MetricResult, MountInfo};
use super::v1::{self, V1Controller, V1Kind};
use super::v2::{self, V2Controller};

/// Controllers that must be present and enabled in a v1 kernel for
/// detection to proceed. `pids` is read opportunistically (missing on
/// pre-4.3 kernels) and is not in this list.
const REQUIRED_V1_CONTROLLERS: [&str; 4] = ["memory", "cpu", "cpuacct", "cpuset"];

struct ProcPaths {
    cgroups: PathBuf,
    self_cgroup: PathBuf,
    self_mountinfo: PathBuf,
}

impl ProcPaths {
    fn discover() -> Self {
        let root = match std::env::var_os("CGRES_PROC_ROOT") {
            Some(root) => PathBuf::from(root),
            None => PathBuf::from("/proc"),
        };
        ProcPaths {
            cgroups: root.join("cgroups"),
            self_cgroup: root.join("self/cgroup"),
            self_mountinfo: root.join("self/mountinfo"),
        }
    }
}

/// Detect the host's cgroup regime and build a [`ResourceLimits`] facade, or
/// `None` if no usable cgroup support exists at all (no cgroup filesystem,
/// or a v1 kernel missing a required controller).
pub fn detect() -> Option<ResourceLimits> {
    let paths = ProcPaths::discover();
    detect_from(&paths)
}

fn detect_from(paths: &ProcPaths) -> Option<ResourceLimits> {
    let registry = parse_proc_cgroups(&std::fs::read_to_string(&paths.cgroups).ok()?);
    if registry.is_empty() {
        debug!("empty /proc/cgroups; no cgroup support");
        return None;
    }

    let is_v2_regime = registry.iter().all(|e| e.hierarchy_id == 0);

    if !is_v2_regime {
        for name in REQUIRED_V1_CONTROLLERS {
            match registry.iter().find(|e| e.name == name) {
                Some(e) if e.enabled => {}
                Some(_) | None => {
                    log_kernel_misconfigured(&Error::KernelMisconfigured(name.to_string()));
                    return None;
                }
            }
        }
    }

    let self_cgroup = parse_self_cgroup(&std::fs::read_to_string(&paths.self_cgroup).ok()?);
    let mounts = parse_mountinfo(&std::fs::read_to_string(&paths.self_mountinfo).ok()?);

    let host_cpus = host_online_cpus();
    let host_mem_bound = host_physical_memory_bytes().unwrap_or(u64::MAX);

    if is_v2_regime {
        detect_v2(&self_cgroup, &mounts, host_cpus, host_mem_bound)
    } else {
        detect_v1(&self_cgroup, &mounts, host_cpus, host_mem_bound)
    }
}

/// Log a factory-produced `KernelMisconfigured` error at `debug`, the level
/// §7 assigns it.
fn log_kernel_misconfigured(err: &Error) {
    debug!(code = err.code(), category = %err.category(), "{}: {err}", err.headline());
}

/// Log a factory-produced `MountNotFound` error at `trace`, the level §7
/// assigns it.
fn log_mount_not_found(err: &Error) {
    trace!(code = err.code(), category = %err.category(), "{}: {err}", err.headline());
}

fn detect_v2(self_cgroup: &[CgroupInfo], mounts: &[MountInfo], host_cpus: u32, host_mem_bound: u64) -> Option<ResourceLimits> {
    let mount = match mounts.iter().find(|m| m.fs_type == "cgroup2") {
        Some(m) => m,
        None => {
            log_mount_not_found(&Error::MountNotFound("cgroup2".to_string()));
            return None;
        }
    };
    let cgroup_path = self_cgroup
        .iter()
        .find(|e| e.hierarchy_id == 0)
        .map(|e| e.path.clone())
        .unwrap_or_else(|| "/".to_string());

    let new_ctrl = || {
        let mut c = V2Controller::new(mount.mount_point.clone(), cgroup_path.clone(), mount.read_only);
        default_to_mount_point_if_missing(&mut c, &mount.mount_point);
        c
    };
    let mut memory = new_ctrl();
    let mut cpu = new_ctrl();
    let misc = new_ctrl();

    hierarchy::adjust(&mut memory, |candidate| {
        matches!(v2::memory_limit_at(candidate), MetricResult::Bytes(b) if b < host_mem_bound)
    });
    hierarchy::adjust(&mut cpu, |candidate| v2::effective_cpu_count_at(candidate, host_cpus).is_some());

    let is_containerized =
        mount.read_only || limits_differ_from_host(memory.memory_limit_in_bytes(), cpu.cpu_quota());

    Some(ResourceLimits::new(
        Backing::V2 { memory, cpu, misc },
        CgroupVersion::V2,
        is_containerized,
        host_cpus,
        host_mem_bound,
    ))
}

fn detect_v1(self_cgroup: &[CgroupInfo], mounts: &[MountInfo], host_cpus: u32, host_mem_bound: u64) -> Option<ResourceLimits> {
    let memory_mount = require_v1_mount(mounts, "memory")?;
    let cpu_mount = require_v1_mount(mounts, "cpu")?;
    let cpuacct_mount = require_v1_mount(mounts, "cpuacct")?;
    let cpuset_mount = require_v1_mount(mounts, "cpuset")?;
    let pids_mount = find_v1_mount(mounts, "pids");

    let memory_path = cgroup_path_for(self_cgroup, "memory");
    let cpu_path = cgroup_path_for(self_cgroup, "cpu");
    let cpuacct_path = cgroup_path_for(self_cgroup, "cpuacct");
    let cpuset_path = cgroup_path_for(self_cgroup, "cpuset");
    let pids_path = cgroup_path_for(self_cgroup, "pids");

    let mut memory = new_v1(V1Kind::Memory, memory_mount, &memory_path);
    let mut cpu = new_v1(V1Kind::Cpu, cpu_mount, &cpu_path);
    let cpuacct = new_v1(V1Kind::Cpuacct, cpuacct_mount, &cpuacct_path);
    let cpuset = new_v1(V1Kind::Generic, cpuset_mount, &cpuset_path);
    let pids = match pids_mount {
        Some(m) => new_v1(V1Kind::Generic, m, &pids_path),
        None => new_v1(V1Kind::Generic, cpuset_mount, &cpuset_path),
    };

    hierarchy::adjust(&mut memory, |candidate| {
        matches!(
            v1::memory_limit_at(candidate, "memory.limit_in_bytes", "hierarchical_memory_limit", host_mem_bound),
            MetricResult::Bytes(b) if b < host_mem_bound
        )
    });
    hierarchy::adjust(&mut cpu, |candidate| v1::effective_cpu_count_at(candidate, host_cpus).is_some());

    let all_read_only = [memory_mount, cpu_mount, cpuacct_mount, cpuset_mount]
        .iter()
        .all(|m| m.read_only)
        && pids_mount.map(|m| m.read_only).unwrap_or(true);
    let is_containerized =
        all_read_only || limits_differ_from_host(memory.memory_limit_in_bytes(host_mem_bound), cpu.cpu_quota());

    Some(ResourceLimits::new(
        Backing::V1 {
            memory,
            cpu,
            cpuacct,
            cpuset,
            pids,
        },
        CgroupVersion::V1,
        is_containerized,
        host_cpus,
        host_mem_bound,
    ))
}

/// §4.F containerization rule (b): a memory or CPU limit differs from the
/// host value. `memory_limit_in_bytes` only ever reports `Bytes` when the
/// raw value is strictly below the host bound, so any `Bytes` result here is
/// already evidence of a real limit; `Unlimited`/`Unavailable` are not.
fn limits_differ_from_host(memory_limit: MetricResult, cpu_quota: MetricResult) -> bool {
    let memory_differs = matches!(memory_limit, MetricResult::Bytes(_));
    let cpu_differs = matches!(cpu_quota, MetricResult::Count(q) if q > 0);
    memory_differs || cpu_differs
}

fn new_v1(kind: V1Kind, mount: &MountInfo, cgroup_path: &str) -> V1Controller {
    let mut c = V1Controller::new(kind, &mount.root, mount.mount_point.clone(), cgroup_path.to_string(), mount.read_only);
    default_to_mount_point_if_missing(&mut c, &mount.mount_point);
    c
}

/// `subsystem_path` always names an existing directory at construction
/// time (§4.C/§4.D invariant); fall back to the bare mount point on the
/// rare host where the constructed path does not exist.
fn default_to_mount_point_if_missing<C: Controller>(ctrl: &mut C, mount_point: &str) {
    if !is_existing_directory(ctrl.subsystem_path()) {
        ctrl.set_subsystem_path(mount_point.to_string());
    }
}

fn find_v1_mount<'a>(mounts: &'a [MountInfo], controller: &str) -> Option<&'a MountInfo> {
    mounts
        .iter()
        .find(|m| m.fs_type == "cgroup" && m.super_options.iter().any(|o| o == controller))
}

/// Like [`find_v1_mount`], but for the controllers detection cannot proceed
/// without: constructs and logs a `MountNotFound` error (§7) when absent.
fn require_v1_mount<'a>(mounts: &'a [MountInfo], controller: &str) -> Option<&'a MountInfo> {
    match find_v1_mount(mounts, controller) {
        Some(m) => Some(m),
        None => {
            log_mount_not_found(&Error::MountNotFound(controller.to_string()));
            None
        }
    }
}

fn cgroup_path_for(entries: &[CgroupInfo], controller: &str) -> String {
    entries
        .iter()
        .find(|e| e.name == controller)
        .map(|e| e.path.clone())
        .unwrap_or_else(|| "/".to_string())
}

fn parse_proc_cgroups(contents: &str) -> Vec<CgroupRegistryEntry> {
    contents
        .lines()
        .filter(|l| !l.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?.to_string();
            let hierarchy_id: u32 = fields.next()?.parse().ok()?;
            let _num_cgroups = fields.next()?;
            let enabled_raw: u32 = fields.next()?.parse().ok()?;
            Some(CgroupRegistryEntry {
                name,
                hierarchy_id,
                enabled: enabled_raw != 0,
            })
        })
        .collect()
}

fn parse_self_cgroup(contents: &str) -> Vec<CgroupInfo> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let mut parts = line.splitn(3, ':');
        let Some(id_field) = parts.next() else { continue };
        let hierarchy_id: u32 = id_field.parse().unwrap_or(0);
        let Some(controllers) = parts.next() else { continue };
        let path = parts.next().unwrap_or("/").to_string();

        if controllers.is_empty() {
            out.push(CgroupInfo {
                name: String::new(),
                hierarchy_id,
                path,
            });
        } else {
            for name in controllers.split(',') {
                out.push(CgroupInfo {
                    name: name.to_string(),
                    hierarchy_id,
                    path: path.clone(),
                });
            }
        }
    }
    out
}

fn parse_mountinfo(contents: &str) -> Vec<MountInfo> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(sep_idx) = tokens.iter().position(|&t| t == "-") else { continue };
        if sep_idx < 5 || tokens.len() < sep_idx + 4 {
            continue;
        }

        let fs_type = tokens[sep_idx + 1];
        if fs_type != "cgroup" && fs_type != "cgroup2" {
            continue;
        }

        let root = tokens[3];
        let mount_point = tokens[4];
        let options = tokens[5];
        let super_options = tokens[sep_idx + 3];

        out.push(MountInfo {
            mount_id: tokens[0].parse().unwrap_or(0),
            fs_type: fs_type.to_string(),
            super_options: super_options.split(',').map(|s| s.to_string()).collect(),
            root: root.to_string(),
            mount_point: mount_point.to_string(),
            read_only: options.split(',').any(|o| o == "ro"),
        });
    }
    out
}
