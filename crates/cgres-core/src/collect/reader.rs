//! File-reader utilities: safe, allocation-light parsing of the small text
//! pseudo-files a cgroup controller exposes.
//!
//! Every public reader here returns `None` on any failure — missing file,
//! empty file, malformed content, or a path that would overflow `PATH_MAX` —
//! and logs the failure at `trace`. None of them panic; a controller whose
//! files have vanished out from under it (cgroup deleted mid-read) is simply
//! reported as `Unavailable` by the facade.
//!
//! Internally each reader is backed by a `*_result` sibling returning
//! `Result<T, cgres_common::Error>` (§7: "produced by: any reader"); the
//! public function is the thin `Err` → `None` + log conversion the facade's
//! own `MetricResult` construction relies on.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

use cgres_common::Error;

/// A value that is either a concrete non-negative reading or the literal
/// `max` token, which conventionally means "no limit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberOrMax {
    Value(u64),
    Unlimited,
}

/// A value read from a two-token tuple file (`cpu.max`): either `max` or a
/// signed integer (v1's `cpu.cfs_quota_us` uses `-1` for unlimited in the
/// same textual position).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleValue {
    Value(i64),
    Unlimited,
}

/// Which element of a two-token tuple file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleField {
    First,
    Second,
}

/// Log a reader-produced error at `trace`, the level §7 assigns to
/// `PathTooLong`/`FileMissing`/`ParseError`.
fn log_reader_error(err: &Error) {
    trace!(code = err.code(), category = %err.category(), "{}: {err}", err.headline());
}

fn join_checked(subsystem_path: &str, rel_path: &str) -> Result<PathBuf, Error> {
    if subsystem_path.is_empty() {
        return Err(Error::FileMissing(rel_path.to_string()));
    }
    let combined_len = subsystem_path.len() + 1 + rel_path.len();
    if combined_len as u64 > libc_path_max() {
        return Err(Error::PathTooLong(format!("{subsystem_path}/{rel_path}")));
    }
    Ok(Path::new(subsystem_path).join(rel_path))
}

#[cfg(unix)]
fn libc_path_max() -> u64 {
    libc::PATH_MAX as u64
}

#[cfg(not(unix))]
fn libc_path_max() -> u64 {
    4096
}

/// Read the whole file as a string, bounded implicitly to the small size of
/// these single-line or short multi-line pseudo-files.
fn read_small_file(path: &Path) -> Result<String, Error> {
    let contents = fs::read_to_string(path)?;
    if contents.is_empty() {
        return Err(Error::FileMissing(path.display().to_string()));
    }
    Ok(contents)
}

fn read_number_or_max_result(subsystem_path: &str, rel_path: &str) -> Result<NumberOrMax, Error> {
    let path = join_checked(subsystem_path, rel_path)?;
    let contents = read_small_file(&path)?;
    let token = contents
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::ParseError { path: path.display().to_string(), reason: "file had no tokens".to_string() })?;
    if token == "max" {
        return Ok(NumberOrMax::Unlimited);
    }
    token.parse::<u64>().map(NumberOrMax::Value).map_err(|_| Error::ParseError {
        path: path.display().to_string(),
        reason: format!("'{token}' is not a non-negative integer"),
    })
}

/// Read a single non-negative integer from the first whitespace-delimited
/// token of `subsystem_path/rel_path`. Fails (returns `None`) if the token is
/// literally `max` — use [`read_number_or_max`] when `max` is a valid,
/// meaningful reading.
pub fn read_number(subsystem_path: &str, rel_path: &str) -> Option<u64> {
    match read_number_or_max_result(subsystem_path, rel_path) {
        Ok(NumberOrMax::Value(v)) => Some(v),
        Ok(NumberOrMax::Unlimited) => None,
        Err(err) => {
            log_reader_error(&err);
            None
        }
    }
}

/// As [`read_number`], but a literal `max` token succeeds as
/// `NumberOrMax::Unlimited` instead of failing.
pub fn read_number_or_max(subsystem_path: &str, rel_path: &str) -> Option<NumberOrMax> {
    match read_number_or_max_result(subsystem_path, rel_path) {
        Ok(v) => Some(v),
        Err(err) => {
            log_reader_error(&err);
            None
        }
    }
}

fn read_signed_result(subsystem_path: &str, rel_path: &str) -> Result<i64, Error> {
    let path = join_checked(subsystem_path, rel_path)?;
    let contents = read_small_file(&path)?;
    let token = contents
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::ParseError { path: path.display().to_string(), reason: "file had no tokens".to_string() })?;
    token.parse::<i64>().map_err(|_| Error::ParseError {
        path: path.display().to_string(),
        reason: format!("'{token}' is not a signed integer"),
    })
}

/// Read a signed integer (e.g. `cpu.cfs_quota_us`, which uses `-1` for
/// unlimited) from the first token of the file.
pub fn read_signed(subsystem_path: &str, rel_path: &str) -> Option<i64> {
    match read_signed_result(subsystem_path, rel_path) {
        Ok(v) => Some(v),
        Err(err) => {
            log_reader_error(&err);
            None
        }
    }
}

fn read_key_value_result(subsystem_path: &str, rel_path: &str, key: &str) -> Result<u64, Error> {
    let path = join_checked(subsystem_path, rel_path)?;
    let contents = read_small_file(&path)?;
    for line in contents.lines() {
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else { continue };
        if first != key {
            continue;
        }
        let value_token = tokens.next().ok_or_else(|| Error::ParseError {
            path: path.display().to_string(),
            reason: format!("key '{key}' had no value"),
        })?;
        return value_token.parse::<u64>().map_err(|_| Error::ParseError {
            path: path.display().to_string(),
            reason: format!("key '{key}' value '{value_token}' is not a non-negative integer"),
        });
    }
    Err(Error::ParseError { path: path.display().to_string(), reason: format!("key '{key}' not found") })
}

/// Read the integer value associated with `key` in a multi-line `key value`
/// file (e.g. `memory.stat`, `cpu.stat`). The match is exact at the start of
/// the line: `key` must be a whole whitespace-delimited token, not merely a
/// prefix of one (`foo` does not match a line starting `foof`).
pub fn read_key_value(subsystem_path: &str, rel_path: &str, key: &str) -> Option<u64> {
    match read_key_value_result(subsystem_path, rel_path, key) {
        Ok(v) => Some(v),
        Err(err) => {
            log_reader_error(&err);
            None
        }
    }
}

fn read_tuple_result(subsystem_path: &str, rel_path: &str, which: TupleField) -> Result<TupleValue, Error> {
    let path = join_checked(subsystem_path, rel_path)?;
    let contents = read_small_file(&path)?;
    let mut tokens = contents.split_whitespace();
    let token = match which {
        TupleField::First => tokens.next(),
        TupleField::Second => {
            tokens.next();
            tokens.next()
        }
    }
    .ok_or_else(|| Error::ParseError { path: path.display().to_string(), reason: "tuple file missing expected field".to_string() })?;
    if token == "max" {
        return Ok(TupleValue::Unlimited);
    }
    token.parse::<i64>().map(TupleValue::Value).map_err(|_| Error::ParseError {
        path: path.display().to_string(),
        reason: format!("'{token}' is not a valid tuple element"),
    })
}

/// Read one element of a two-token tuple file (`cpu.max`: quota then
/// period). Each element may independently be `max` or a signed integer.
pub fn read_tuple(subsystem_path: &str, rel_path: &str, which: TupleField) -> Option<TupleValue> {
    match read_tuple_result(subsystem_path, rel_path, which) {
        Ok(v) => Some(v),
        Err(err) => {
            log_reader_error(&err);
            None
        }
    }
}

fn read_string_result(subsystem_path: &str, rel_path: &str) -> Result<String, Error> {
    let path = join_checked(subsystem_path, rel_path)?;
    let contents = read_small_file(&path)?;
    contents
        .split_whitespace()
        .next()
        .map(str::to_owned)
        .ok_or_else(|| Error::ParseError { path: path.display().to_string(), reason: "file had no tokens".to_string() })
}

/// Read the first whitespace-delimited token as an owned string
/// (`cpuset.cpus`, `cpuset.mems`).
pub fn read_string(subsystem_path: &str, rel_path: &str) -> Option<String> {
    match read_string_result(subsystem_path, rel_path) {
        Ok(v) => Some(v),
        Err(err) => {
            log_reader_error(&err);
            None
        }
    }
}
