//! The seed configuration document: which layers to seed over which views,
//! and which cleanup tasks to run afterwards.
//!
//! ## YAML shape
//!
//! ```yaml
//! seeds:
//!   osm:
//!     remove_before: { days: 14 }
//!     views: [world, germany]
//! views:
//!   world:
//!     bbox: [-180, -90, 180, 90]
//!     level: [0, 4]
//!   germany:
//!     bbox: [5.4, 46.9, 15.3, 55.1]
//!     bbox_srs: "EPSG:4326"
//!     srs: ["EPSG:3857"]
//!     level: [5, 12]
//! cleanups:
//!   drop-old-overviews:
//!     layers: [osm]
//!     remove_before: { days: 90 }
//!     keep_levels: [0, 1, 2, 3, 4, 5, 6, 7, 8]
//! ```

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tileseed_core::{Bounds, Srs};

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SeedConf {
	#[serde(default)]
	pub seeds: BTreeMap<String, SeedEntry>,
	#[serde(default)]
	pub views: BTreeMap<String, ViewConf>,
	#[serde(default)]
	pub cleanups: BTreeMap<String, CleanupConf>,
}

impl SeedConf {
	pub fn from_string(text: &str) -> Result<SeedConf> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<SeedConf> {
		let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
		SeedConf::from_string(&text).with_context(|| format!("malformed seed configuration {}", path.display()))
	}

	pub fn view(&self, name: &str) -> Result<&ViewConf> {
		self.views.get(name).with_context(|| format!("unknown view {name:?}"))
	}
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SeedEntry {
	#[serde(default)]
	pub remove_before: Option<RemoveBefore>,
	pub views: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ViewConf {
	pub bbox: Vec<f64>,
	#[serde(default)]
	pub bbox_srs: Option<String>,
	#[serde(default)]
	pub srs: Option<Vec<String>>,
	pub level: [u8; 2],
}

impl ViewConf {
	pub fn bounds(&self) -> Result<Bounds> {
		Bounds::try_from(self.bbox.clone())
	}

	pub fn bbox_srs(&self) -> Result<Option<Srs>> {
		self.bbox_srs.as_deref().map(str::parse).transpose()
	}

	pub fn srs_filter(&self) -> Result<Vec<Srs>> {
		self
			.srs
			.as_deref()
			.unwrap_or_default()
			.iter()
			.map(|s| s.parse())
			.collect()
	}

	pub fn levels(&self) -> Result<(u8, u8)> {
		let [lo, hi] = self.level;
		ensure!(lo <= hi, "level range [{lo}, {hi}] is inverted");
		Ok((lo, hi))
	}
}

/// The age cutoff of a seed or cleanup task: either an absolute RFC 3339
/// point in time or a duration before the start of the run; any subset of
/// the duration fields may be given.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RemoveBefore {
	#[serde(default)]
	pub days: u64,
	#[serde(default)]
	pub hours: u64,
	#[serde(default)]
	pub minutes: u64,
	#[serde(default)]
	pub time: Option<String>,
}

impl RemoveBefore {
	pub fn cutoff(&self, now: SystemTime) -> Result<SystemTime> {
		if let Some(time) = &self.time {
			let parsed = time::OffsetDateTime::parse(time, &time::format_description::well_known::Rfc3339)
				.with_context(|| format!("invalid remove_before time {time:?}"))?;
			return Ok(parsed.into());
		}
		let seconds = (self.days * 24 + self.hours) * 3600 + self.minutes * 60;
		Ok(now - Duration::from_secs(seconds))
	}
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CleanupConf {
	pub layers: Vec<String>,
	#[serde(default)]
	pub remove_before: Option<RemoveBefore>,
	#[serde(default)]
	pub keep_levels: Option<Vec<u8>>,
	#[serde(default)]
	pub keep_coverage: Option<CoverageConf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CoverageConf {
	pub bbox: Vec<f64>,
	#[serde(default)]
	pub bbox_srs: Option<String>,
}

impl CoverageConf {
	/// The coverage rectangle in the CRS of the given grid.
	pub fn bounds_in(&self, grid_srs: Srs) -> Result<Bounds> {
		let bounds = Bounds::try_from(self.bbox.clone())?;
		match self.bbox_srs.as_deref() {
			None => Ok(bounds),
			Some(srs) => srs.parse::<Srs>()?.transform_bbox_to(grid_srs, &bounds),
		}
	}
}
