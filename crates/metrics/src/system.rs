// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System gauges: CPU, memory, disk and core-dump presence.
//!
//! Every sampler degrades to zero on failure. Observability must never take
//! a node down with it.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Gap between the two `/proc/stat` samples used for the CPU percentage.
const CPU_SAMPLE_GAP: Duration = Duration::from_millis(50);

/// One snapshot of the host gauges.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemStats {
    pub cpu_percent: u64,
    pub mem_used_bytes: u64,
    pub mem_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub disk_total_bytes: u64,
    pub core_dumped: bool,
}

/// Sample every gauge. Blocks for the CPU double-sample gap.
pub fn sample(state_path: &Path, dump_dir: Option<&Path>) -> SystemStats {
    let mut stats = SystemStats {
        cpu_percent: cpu_percent().unwrap_or(0),
        ..Default::default()
    };
    if let Some((used, total)) = memory_bytes() {
        stats.mem_used_bytes = used;
        stats.mem_total_bytes = total;
    }
    if let Some((used, total)) = disk_bytes(state_path) {
        stats.disk_used_bytes = used;
        stats.disk_total_bytes = total;
    }
    stats.core_dumped = dump_dir.map(has_core_dump).unwrap_or(false);
    stats
}

/// `(busy, total)` jiffies from the aggregate cpu line.
fn cpu_jiffies() -> Option<(u64, u64)> {
    let stat = fs::read_to_string("/proc/stat").ok()?;
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    let total: u64 = fields.iter().sum();
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some((total - idle, total))
}

fn cpu_percent() -> Option<u64> {
    let (busy1, total1) = cpu_jiffies()?;
    thread::sleep(CPU_SAMPLE_GAP);
    let (busy2, total2) = cpu_jiffies()?;
    let busy = busy2.saturating_sub(busy1);
    let total = total2.saturating_sub(total1);
    if total == 0 {
        return Some(0);
    }
    Some(busy * 100 / total)
}

fn meminfo_kb(contents: &str, key: &str) -> Option<u64> {
    contents
        .lines()
        .find(|l| l.starts_with(key))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

fn memory_bytes() -> Option<(u64, u64)> {
    let contents = fs::read_to_string("/proc/meminfo").ok()?;
    let total = meminfo_kb(&contents, "MemTotal:")? * 1024;
    let available = meminfo_kb(&contents, "MemAvailable:")? * 1024;
    Some((total.saturating_sub(available), total))
}

fn disk_bytes(path: &Path) -> Option<(u64, u64)> {
    let vfs = nix::sys::statvfs::statvfs(path).ok()?;
    let frsize = vfs.fragment_size() as u64;
    let total = vfs.blocks() as u64 * frsize;
    let free = vfs.blocks_free() as u64 * frsize;
    Some((total.saturating_sub(free), total))
}

/// A file named `core*` in the dump directory counts as a dump.
fn has_core_dump(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        debug!(dir = %dir.display(), "dump directory not readable");
        return false;
    };
    entries
        .flatten()
        .any(|e| e.file_name().to_string_lossy().starts_with("core"))
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod tests;
