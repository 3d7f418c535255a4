//! Hierarchy adjuster (§4.E): when a controller's leaf cgroup shows no
//! limit, walk the path toward the root until an ancestor's limit is found.
//!
//! The walk never *narrows* what is being searched — it only broadens
//! upward, because a leaf cgroup may simply inherit a limit set higher up
//! without redeclaring it. If nothing is ever found, the controller's
//! original `subsystem_path` is restored so callers still read the correct
//! (if limitless) cgroup.

use super::controller::Controller;
use tracing::trace;

/// Walk `ctrl`'s cgroup path from the leaf toward the root, calling
/// `limit_found_at` with each candidate `subsystem_path` after setting it on
/// the controller. Stops as soon as `limit_found_at` returns `true`, or
/// after trying the mount point itself (`candidate == ""`). Restores the
/// controller's original `subsystem_path` if no candidate ever reported a
/// limit.
///
/// No-op if the controller does not need adjustment.
pub fn adjust<C: Controller>(ctrl: &mut C, mut limit_found_at: impl FnMut(&str) -> bool) {
    if !ctrl.needs_hierarchy_adjustment() {
        return;
    }

    let original_subsystem_path = ctrl.subsystem_path().to_string();
    let mount_point = ctrl.mount_point().to_string();
    let cgroup_path = ctrl.cgroup_path().to_string();

    let mut components: Vec<&str> = cgroup_path.split('/').filter(|c| !c.is_empty()).collect();

    loop {
        let candidate = if components.is_empty() {
            mount_point.clone()
        } else {
            format!("{mount_point}/{}", components.join("/"))
        };

        ctrl.set_subsystem_path(candidate.clone());
        if limit_found_at(&candidate) {
            trace!(candidate, "hierarchy adjustment found a limit");
            return;
        }

        if components.is_empty() {
            break;
        }
        components.pop();
    }

    trace!(
        original_subsystem_path,
        "hierarchy adjustment found no limit anywhere; restoring original path"
    );
    ctrl.set_subsystem_path(original_subsystem_path);
}
