//! Container-aware resource detection.
//!
//! Reads cgroup v1/v2 interface files so a managed runtime can size itself
//! to the memory and CPU limits actually imposed on this process, which may
//! be narrower than what the host reports. See [`collect::detect`] for the
//! entry point and [`collect::ResourceLimits`] for the facade it returns.

pub mod collect;
pub mod config;
pub mod list;
pub mod logging;

pub use collect::{detect, ResourceLimits};
pub use config::DetectorConfig;
