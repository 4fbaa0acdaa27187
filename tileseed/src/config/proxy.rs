//! The base (proxy) configuration document with seeding defaults.
//!
//! ## YAML shape
//!
//! ```yaml
//! seeding:
//!   meta_size: [4, 4]
//!   workers: 2        # 0 = one per CPU
//!   queue_size: 16
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProxyConf {
	#[serde(default)]
	pub seeding: SeedingDefaults,
}

impl ProxyConf {
	pub fn from_string(text: &str) -> Result<ProxyConf> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<ProxyConf> {
		let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
		ProxyConf::from_string(&text).with_context(|| format!("malformed proxy configuration {}", path.display()))
	}
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SeedingDefaults {
	#[serde(default = "default_meta_size")]
	pub meta_size: [u32; 2],
	#[serde(default = "default_workers")]
	pub workers: usize,
	#[serde(default = "default_queue_size")]
	pub queue_size: usize,
}

impl SeedingDefaults {
	/// The configured worker count, with `0` meaning one worker per CPU.
	pub fn worker_count(&self) -> usize {
		if self.workers == 0 { num_cpus::get() } else { self.workers }
	}
}

impl Default for SeedingDefaults {
	fn default() -> Self {
		SeedingDefaults {
			meta_size: default_meta_size(),
			workers: default_workers(),
			queue_size: default_queue_size(),
		}
	}
}

fn default_meta_size() -> [u32; 2] {
	[4, 4]
}

fn default_workers() -> usize {
	2
}

fn default_queue_size() -> usize {
	16
}
