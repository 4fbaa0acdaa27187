//! The services configuration document: the caches that can be seeded and
//! the layers pointing at them.
//!
//! ## YAML shape
//!
//! ```yaml
//! caches:
//!   osm_geodetic:
//!     grid: geodetic
//!     levels: 16
//!     directory: ./cache/osm_geodetic
//!     format: png
//!     source:
//!       url: "http://localhost:8080/service?request=GetMap&bbox={bbox}&width={width}&height={height}&srs={srs}"
//! layers:
//!   osm:
//!     caches: [osm_geodetic]
//!   everything:
//!     layers: [osm]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tileseed_core::TileGrid;

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServicesConf {
	#[serde(default)]
	pub caches: BTreeMap<String, CacheConf>,
	#[serde(default)]
	pub layers: BTreeMap<String, LayerConf>,
}

impl ServicesConf {
	pub fn from_string(text: &str) -> Result<ServicesConf> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<ServicesConf> {
		let text = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
		ServicesConf::from_string(&text).with_context(|| format!("malformed services configuration {}", path.display()))
	}

	pub fn layer(&self, name: &str) -> Result<&LayerConf> {
		self.layers.get(name).with_context(|| format!("unknown layer {name:?}"))
	}
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConf {
	pub grid: GridName,
	#[serde(default = "default_levels")]
	pub levels: u8,
	pub directory: PathBuf,
	#[serde(default = "default_format")]
	pub format: String,
	pub source: SourceConf,
	/// Tiles per meta tile; defaults to the seeding defaults.
	#[serde(default)]
	pub meta_size: Option<[u32; 2]>,
}

impl CacheConf {
	pub fn tile_grid(&self) -> TileGrid {
		match self.grid {
			GridName::Geodetic => TileGrid::geodetic(self.levels),
			GridName::WebMercator => TileGrid::web_mercator(self.levels),
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GridName {
	Geodetic,
	WebMercator,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceConf {
	pub url: String,
}

/// A layer either groups other layers or draws from a list of caches.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LayerConf {
	Group {
		layers: Vec<String>,
	},
	Caches {
		caches: Vec<String>,
	},
}

fn default_levels() -> u8 {
	20
}

fn default_format() -> String {
	"png".to_string()
}
