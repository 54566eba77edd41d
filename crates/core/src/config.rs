//! Layered configuration (spec.md §4.8, §6 "Configuration keys").
//!
//! Load order: built-in defaults, then `config/vectoriadb.yml` under the
//! base path if present, then environment variables of the form
//! `VECTORIADB__INDEX__DIMENSIONS` (double underscore standing in for the
//! dotted `vectoriadb.index.dimensions` key). Mirrors the layered
//! project-then-user load the teacher's config used, generalized from two
//! fixed locations to file-then-env.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("IO error reading {path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
  #[error("invalid YAML in {path}: {source}")]
  Yaml { path: PathBuf, source: serde_yaml::Error },
  #[error("invalid memory size {0:?}")]
  InvalidMemorySize(String),
  #[error("`vectoriadb.index.dimensions` is required and was not set")]
  MissingDimensions,
}

/// A byte count parsed from the suffixed notation in spec.md §4.6
/// (`b`, `k`/`kb`, `m`/`mb`, `g`/`gb`, case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemorySize(pub u64);

impl MemorySize {
  pub fn bytes(self) -> u64 {
    self.0
  }
}

impl FromStr for MemorySize {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let (digits, multiplier) = if let Some(d) = lower.strip_suffix("kb") {
      (d, 1024u64)
    } else if let Some(d) = lower.strip_suffix("mb") {
      (d, 1024 * 1024)
    } else if let Some(d) = lower.strip_suffix("gb") {
      (d, 1024 * 1024 * 1024)
    } else if let Some(d) = lower.strip_suffix('k') {
      (d, 1024)
    } else if let Some(d) = lower.strip_suffix('m') {
      (d, 1024 * 1024)
    } else if let Some(d) = lower.strip_suffix('g') {
      (d, 1024 * 1024 * 1024)
    } else if let Some(d) = lower.strip_suffix('b') {
      (d, 1)
    } else {
      (lower.as_str(), 1)
    };

    let value: u64 = digits
      .trim()
      .parse()
      .map_err(|_| ConfigError::InvalidMemorySize(s.to_string()))?;

    Ok(MemorySize(value * multiplier))
  }
}

impl<'de> Deserialize<'de> for MemorySize {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
      Int(u64),
      Str(String),
    }

    match Repr::deserialize(deserializer)? {
      Repr::Int(n) => Ok(MemorySize(n)),
      Repr::Str(s) => MemorySize::from_str(&s).map_err(serde::de::Error::custom),
    }
  }
}

impl Serialize for MemorySize {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_u64(self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultMode {
  Build,
  Search,
}

impl Default for DefaultMode {
  fn default() -> Self {
    DefaultMode::Build
  }
}

/// Everything under `vectoriadb.index.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
  pub dimensions: usize,
  #[serde(default = "default_max_connections_per_vertex")]
  pub max_connections_per_vertex: u32,
  #[serde(default = "default_max_candidates_returned")]
  pub max_candidates_returned: u32,
  #[serde(default = "default_compression_ratio")]
  pub compression_ratio: u32,
  #[serde(default = "default_distance_multiplier")]
  pub distance_multiplier: f32,
  /// `vectoriadb.index.building.max-memory-consumption`; `None` defers to
  /// `MemoryBudget::index_building_max_memory_consumption`.
  #[serde(default)]
  pub building_max_memory_consumption: Option<MemorySize>,
  /// `vectoriadb.index.search.disk-cache-memory-consumption`; `None` defers
  /// to `MemoryBudget::disk_cache_memory_consumption`.
  #[serde(default)]
  pub search_disk_cache_memory_consumption: Option<MemorySize>,
}

fn default_max_connections_per_vertex() -> u32 {
  32
}
fn default_max_candidates_returned() -> u32 {
  128
}
fn default_compression_ratio() -> u32 {
  32
}
fn default_distance_multiplier() -> f32 {
  1.0
}

/// Everything under `vectoriadb.server.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_base_path")]
  pub base_path: PathBuf,
  #[serde(default)]
  pub default_mode: DefaultMode,
  /// TCP address the RPC listener binds (spec.md §6 treats the transport
  /// as external; we still need somewhere to bind it).
  #[serde(default = "default_listen_addr")]
  pub listen_addr: String,
}

fn default_base_path() -> PathBuf {
  PathBuf::from(".")
}

fn default_listen_addr() -> String {
  "127.0.0.1:7667".to_string()
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      base_path: default_base_path(),
      default_mode: DefaultMode::default(),
      listen_addr: default_listen_addr(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  pub index: IndexConfig,
  #[serde(default)]
  pub server: ServerConfig,
}

/// Mirrors `Config` but with every field optional, used while layering
/// defaults -> file -> env before a final required-field check.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
  #[serde(default)]
  index: RawIndexConfig,
  #[serde(default)]
  server: RawServerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawIndexConfig {
  dimensions: Option<usize>,
  max_connections_per_vertex: Option<u32>,
  max_candidates_returned: Option<u32>,
  compression_ratio: Option<u32>,
  distance_multiplier: Option<f32>,
  building_max_memory_consumption: Option<MemorySize>,
  search_disk_cache_memory_consumption: Option<MemorySize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawServerConfig {
  base_path: Option<PathBuf>,
  default_mode: Option<DefaultMode>,
  listen_addr: Option<String>,
}

impl RawConfig {
  fn merge_env(&mut self) {
    if let Ok(v) = std::env::var("VECTORIADB__INDEX__DIMENSIONS")
      && let Ok(v) = v.parse()
    {
      self.index.dimensions = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__INDEX__MAX_CONNECTIONS_PER_VERTEX")
      && let Ok(v) = v.parse()
    {
      self.index.max_connections_per_vertex = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__INDEX__MAX_CANDIDATES_RETURNED")
      && let Ok(v) = v.parse()
    {
      self.index.max_candidates_returned = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__INDEX__COMPRESSION_RATIO")
      && let Ok(v) = v.parse()
    {
      self.index.compression_ratio = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__INDEX__DISTANCE_MULTIPLIER")
      && let Ok(v) = v.parse()
    {
      self.index.distance_multiplier = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__INDEX__BUILDING__MAX_MEMORY_CONSUMPTION")
      && let Ok(v) = MemorySize::from_str(&v)
    {
      self.index.building_max_memory_consumption = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__INDEX__SEARCH__DISK_CACHE_MEMORY_CONSUMPTION")
      && let Ok(v) = MemorySize::from_str(&v)
    {
      self.index.search_disk_cache_memory_consumption = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__SERVER__BASE_PATH") {
      self.server.base_path = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("VECTORIADB__SERVER__DEFAULT_MODE")
      && let Ok(v) = serde_plain_default_mode(&v)
    {
      self.server.default_mode = Some(v);
    }
    if let Ok(v) = std::env::var("VECTORIADB__SERVER__LISTEN_ADDR") {
      self.server.listen_addr = Some(v);
    }
  }

  fn finalize(self) -> Result<Config, ConfigError> {
    let dimensions = self.index.dimensions.ok_or(ConfigError::MissingDimensions)?;
    Ok(Config {
      index: IndexConfig {
        dimensions,
        max_connections_per_vertex: self
          .index
          .max_connections_per_vertex
          .unwrap_or_else(default_max_connections_per_vertex),
        max_candidates_returned: self
          .index
          .max_candidates_returned
          .unwrap_or_else(default_max_candidates_returned),
        compression_ratio: self.index.compression_ratio.unwrap_or_else(default_compression_ratio),
        distance_multiplier: self
          .index
          .distance_multiplier
          .unwrap_or_else(default_distance_multiplier),
        building_max_memory_consumption: self.index.building_max_memory_consumption,
        search_disk_cache_memory_consumption: self.index.search_disk_cache_memory_consumption,
      },
      server: ServerConfig {
        base_path: self.server.base_path.unwrap_or_else(default_base_path),
        default_mode: self.server.default_mode.unwrap_or_default(),
        listen_addr: self.server.listen_addr.unwrap_or_else(default_listen_addr),
      },
    })
  }
}

fn serde_plain_default_mode(s: &str) -> Result<DefaultMode, ()> {
  match s.to_ascii_lowercase().as_str() {
    "build" => Ok(DefaultMode::Build),
    "search" => Ok(DefaultMode::Search),
    _ => Err(()),
  }
}

impl Config {
  /// `config/vectoriadb.yml` relative to a base path (spec.md §6 layout).
  pub fn config_path(base_path: &Path) -> PathBuf {
    base_path.join("config").join("vectoriadb.yml")
  }

  /// Load config for a base path: defaults, then the YAML file if present,
  /// then environment overrides.
  pub fn load(base_path: &Path) -> Result<Self, ConfigError> {
    let mut raw = RawConfig::default();

    let config_path = Self::config_path(base_path);
    if config_path.exists() {
      let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
        path: config_path.clone(),
        source,
      })?;
      raw = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: config_path.clone(),
        source,
      })?;
    }

    raw.merge_env();
    raw.finalize()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn parses_memory_size_suffixes() {
    assert_eq!(MemorySize::from_str("512").unwrap().bytes(), 512);
    assert_eq!(MemorySize::from_str("512b").unwrap().bytes(), 512);
    assert_eq!(MemorySize::from_str("4k").unwrap().bytes(), 4096);
    assert_eq!(MemorySize::from_str("4KB").unwrap().bytes(), 4096);
    assert_eq!(MemorySize::from_str("2m").unwrap().bytes(), 2 * 1024 * 1024);
    assert_eq!(MemorySize::from_str("1g").unwrap().bytes(), 1024 * 1024 * 1024);
    assert_eq!(MemorySize::from_str("1GB").unwrap().bytes(), 1024 * 1024 * 1024);
  }

  #[test]
  fn missing_dimensions_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingDimensions));
  }

  #[test]
  fn loads_yaml_file_and_applies_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(Config::config_path(dir.path()), "index:\n  dimensions: 768\n").unwrap();

    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.index.dimensions, 768);
    assert_eq!(config.index.max_connections_per_vertex, 32);
    assert_eq!(config.server.base_path, PathBuf::from("."));
    assert_eq!(config.server.listen_addr, "127.0.0.1:7667");
  }

  #[test]
  fn env_override_wins_over_file() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(Config::config_path(dir.path()), "index:\n  dimensions: 768\n").unwrap();

    // SAFETY: test-only, single-threaded within this test function's env mutation.
    unsafe {
      std::env::set_var("VECTORIADB__INDEX__DIMENSIONS", "42");
    }
    let config = Config::load(dir.path()).unwrap();
    unsafe {
      std::env::remove_var("VECTORIADB__INDEX__DIMENSIONS");
    }
    assert_eq!(config.index.dimensions, 42);
  }
}
