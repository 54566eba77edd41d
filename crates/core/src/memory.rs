//! Host-memory discovery and the two derived memory pools (spec.md §4.6).
//!
//! Kept as a one-shot startup computation rather than something queried at
//! runtime, per spec.md §9 — the three derived numbers are captured once
//! and handed around as immutable configuration.

use crate::config::{Config, MemorySize};
use thiserror::Error;

const EIGHT_TIB: u64 = 8 * 1024 * 1024 * 1024 * 1024;
const OS_RESERVE_CAP: u64 = 512 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum MemoryProbeError {
  #[error("detected {0} bytes of available RAM, refusing to guess at >= 8 TiB")]
  ImplausibleAvailableRam(u64),
}

/// The three numbers spec.md §4.6 says to derive once at startup.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudget {
  pub available_ram: u64,
  pub max_memory_consumption: u64,
  pub index_building_max_memory_consumption: u64,
  pub disk_cache_memory_consumption: u64,
}

impl MemoryBudget {
  /// Run the host probe and fold in configuration overrides.
  pub fn discover(config: &Config) -> Result<Self, MemoryProbeError> {
    let available_ram = available_ram();
    if available_ram >= EIGHT_TIB {
      return Err(MemoryProbeError::ImplausibleAvailableRam(available_ram));
    }

    // "subtract the in-process heap maximum" - for a Rust binary (no
    // managed-heap ceiling the way a JVM has one) this is the available RAM
    // itself; there is no separate heap-max distinct from the OS-visible
    // limit already computed above.
    let available_direct = available_ram;
    let os_reserve = OS_RESERVE_CAP.min(available_direct / 100);
    let max_memory_consumption = available_direct.saturating_sub(os_reserve);

    let index_building_max_memory_consumption = config
      .index
      .building_max_memory_consumption
      .map(MemorySize::bytes)
      .unwrap_or(max_memory_consumption / 2);

    let disk_cache_memory_consumption = config
      .index
      .search_disk_cache_memory_consumption
      .map(MemorySize::bytes)
      .unwrap_or(max_memory_consumption * 4 / 5);

    Ok(Self {
      available_ram,
      max_memory_consumption,
      index_building_max_memory_consumption,
      disk_cache_memory_consumption,
    })
  }
}

#[cfg(target_os = "linux")]
fn available_ram() -> u64 {
  let phys = linux_meminfo_total_kb()
    .map(|kb| kb.saturating_mul(1024))
    .unwrap_or(u64::MAX);
  let cgroup_v1 = linux_cgroup_v1_limit().unwrap_or(u64::MAX);
  let cgroup_v2 = linux_cgroup_v2_limit().unwrap_or(u64::MAX);
  phys.min(cgroup_v1).min(cgroup_v2)
}

#[cfg(target_os = "linux")]
fn linux_meminfo_total_kb() -> Option<u64> {
  let content = std::fs::read_to_string("/proc/meminfo").ok()?;
  let first_line = content.lines().next()?;
  // "MemTotal:       16336452 kB"
  let digits: String = first_line.chars().filter(|c| c.is_ascii_digit()).collect();
  digits.parse().ok()
}

#[cfg(target_os = "linux")]
fn linux_cgroup_v1_limit() -> Option<u64> {
  read_cgroup_file("/sys/fs/cgroup/memory/memory.limit_in_bytes")
}

#[cfg(target_os = "linux")]
fn linux_cgroup_v2_limit() -> Option<u64> {
  read_cgroup_file("/sys/fs/cgroup/memory.max")
}

#[cfg(target_os = "linux")]
fn read_cgroup_file(path: &str) -> Option<u64> {
  let content = std::fs::read_to_string(path).ok()?;
  let trimmed = content.trim();
  if trimmed.is_empty() {
    return None;
  }
  if trimmed.eq_ignore_ascii_case("max") {
    return Some(u64::MAX);
  }
  trimmed.parse().ok()
}

#[cfg(target_os = "windows")]
fn available_ram() -> u64 {
  // Bridges to `GlobalMemoryStatusEx`'s `ullTotalPhys` field.
  windows_memory_status().map(|s| s.total_phys).unwrap_or(u64::MAX)
}

#[cfg(target_os = "windows")]
struct WindowsMemoryStatus {
  total_phys: u64,
}

#[cfg(target_os = "windows")]
fn windows_memory_status() -> Option<WindowsMemoryStatus> {
  // A real bridge would call `GlobalMemoryStatusEx` via `windows-sys`; left
  // as a narrow, documented native call site rather than implemented here
  // since this workspace targets Linux deployment.
  None
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
fn available_ram() -> u64 {
  u64::MAX
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{Config, IndexConfig, ServerConfig};

  fn config_with(dimensions: usize) -> Config {
    Config {
      index: IndexConfig {
        dimensions,
        max_connections_per_vertex: 32,
        max_candidates_returned: 128,
        compression_ratio: 32,
        distance_multiplier: 1.0,
        building_max_memory_consumption: None,
        search_disk_cache_memory_consumption: None,
      },
      server: ServerConfig::default(),
    }
  }

  #[test]
  fn derives_halves_and_four_fifths_by_default() {
    let config = config_with(4);
    let budget = MemoryBudget::discover(&config).unwrap();
    assert_eq!(
      budget.index_building_max_memory_consumption,
      budget.max_memory_consumption / 2
    );
    assert_eq!(
      budget.disk_cache_memory_consumption,
      budget.max_memory_consumption * 4 / 5
    );
  }

  #[test]
  fn config_overrides_win_over_defaults() {
    let mut config = config_with(4);
    config.index.building_max_memory_consumption = Some(MemorySize(123));
    config.index.search_disk_cache_memory_consumption = Some(MemorySize(456));
    let budget = MemoryBudget::discover(&config).unwrap();
    assert_eq!(budget.index_building_max_memory_consumption, 123);
    assert_eq!(budget.disk_cache_memory_consumption, 456);
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn reads_real_meminfo() {
    assert!(linux_meminfo_total_kb().unwrap() > 0);
  }
}
