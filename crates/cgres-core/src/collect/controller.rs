//! Controller abstraction (§4.B): the per-controller state and behavior
//! shared by both the v1 family and the v2 unified controller.

use std::path::Path;

/// Behavior every controller variant (`v1-memory`, `v1-cpu`, `v1-cpuacct`,
/// `v1-generic`, `v2-unified`) exposes uniformly to the hierarchy adjuster
/// and the facade.
pub trait Controller {
    /// The effective path to concatenate with interface-file names.
    fn subsystem_path(&self) -> &str;
    /// The path where the controller's files are mounted.
    fn mount_point(&self) -> &str;
    /// The process's cgroup path as reported by `/proc/self/cgroup`.
    fn cgroup_path(&self) -> &str;
    /// Whether the controller's mount is read-only.
    fn is_read_only(&self) -> bool;
    /// Whether the leaf cgroup path differs from the controller's root,
    /// meaning a limit at the leaf may need to be searched for upward.
    fn needs_hierarchy_adjustment(&self) -> bool;
    /// Replace `subsystem_path`. Only ever called by the hierarchy adjuster
    /// (§4.E), and only with a shorter prefix of the current path.
    fn set_subsystem_path(&mut self, path: String);
}

/// Shared state every controller variant embeds.
///
/// `root_path` is only meaningful for v1 controllers (the cgroup that was
/// the mount's root at mount time); v2 controllers leave it `None`.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub mount_point: String,
    pub cgroup_path: String,
    pub root_path: Option<String>,
    pub subsystem_path: String,
    pub read_only: bool,
}

impl ControllerState {
    pub fn new(mount_point: String, cgroup_path: String, read_only: bool) -> Self {
        ControllerState {
            subsystem_path: mount_point.clone(),
            mount_point,
            cgroup_path,
            root_path: None,
            read_only,
        }
    }
}

/// True iff `path` exists and is a directory. Used both by the v1
/// suffix-matching path search and by the factory's subsystem-path
/// construction invariant ("`subsystem_path` always exists as a directory at
/// the moment of construction").
pub fn is_existing_directory(path: &str) -> bool {
    Path::new(path).is_dir()
}

/// Concatenate a mount point with a cgroup path the way every subsystem-path
/// construction rule in this subsystem does: `"/"` contributes nothing.
pub fn concat_cgroup_path(mount_point: &str, cgroup_path: &str) -> String {
    if cgroup_path == "/" {
        mount_point.to_string()
    } else {
        format!("{mount_point}{cgroup_path}")
    }
}
