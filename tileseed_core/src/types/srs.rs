//! Spatial reference systems, identified by their EPSG code.
//!
//! The seeder only ever reprojects axis-aligned bounding boxes, and only
//! between the two systems every deployed grid uses: geographic WGS84
//! (`EPSG:4326`) and spherical Web Mercator (`EPSG:3857`). Both axes transform
//! independently and monotonically between the two, so transforming the four
//! corner values yields a box that covers the full projected image.

use crate::Bounds;
use anyhow::{Context, Result, bail, ensure};
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

static MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;
static MAX_MERCATOR_LNG: f64 = 180.0;
static RADIUS: f64 = 6_378_137.0; // meters

/// An EPSG code, e.g. `Srs(4326)` for WGS84.
///
/// # Examples
///
/// ```
/// use tileseed_core::Srs;
///
/// let srs: Srs = "EPSG:3857".parse().unwrap();
/// assert_eq!(srs, Srs::WEB_MERCATOR);
/// assert_eq!(srs.to_string(), "EPSG:3857");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Srs(pub u32);

impl Srs {
	pub const WGS84: Srs = Srs(4326);
	pub const WEB_MERCATOR: Srs = Srs(3857);

	/// Reprojects `bounds` from `self` into `target`.
	///
	/// The result is an axis-aligned box that fully contains the projected
	/// image of the input. Coordinates outside the valid domain of the target
	/// projection are clamped to its edge (the Mercator pole cut at
	/// ±85.05113° latitude).
	pub fn transform_bbox_to(&self, target: Srs, bounds: &Bounds) -> Result<Bounds> {
		if *self == target {
			return Ok(*bounds);
		}
		match (*self, target) {
			(Srs::WGS84, Srs::WEB_MERCATOR) => Bounds::new(
				x_from_lon(bounds.x_min),
				y_from_lat(bounds.y_min),
				x_from_lon(bounds.x_max),
				y_from_lat(bounds.y_max),
			),
			(Srs::WEB_MERCATOR, Srs::WGS84) => Bounds::new(
				lon_from_x(bounds.x_min),
				lat_from_y(bounds.y_min),
				lon_from_x(bounds.x_max),
				lat_from_y(bounds.y_max),
			),
			(from, to) => bail!("no transformation from {from} to {to}"),
		}
	}
}

fn x_from_lon(lon_deg: f64) -> f64 {
	let lon = lon_deg.clamp(-MAX_MERCATOR_LNG, MAX_MERCATOR_LNG);
	RADIUS * lon.to_radians()
}

fn y_from_lat(lat_deg: f64) -> f64 {
	let lat = lat_deg.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
	let phi = lat.to_radians();
	RADIUS * ((std::f64::consts::FRAC_PI_4 + phi / 2.0).tan()).ln()
}

fn lon_from_x(x: f64) -> f64 {
	((x / RADIUS).to_degrees()).clamp(-MAX_MERCATOR_LNG, MAX_MERCATOR_LNG)
}

fn lat_from_y(y: f64) -> f64 {
	let phi = 2.0 * (y / RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2;
	phi.to_degrees().clamp(-90.0, 90.0)
}

impl Display for Srs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "EPSG:{}", self.0)
	}
}

impl Debug for Srs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		Display::fmt(self, f)
	}
}

impl FromStr for Srs {
	type Err = anyhow::Error;

	/// Parses `"EPSG:4326"` or a bare code like `"4326"`.
	fn from_str(input: &str) -> Result<Self> {
		let code = input.trim();
		let code = code.strip_prefix("EPSG:").or_else(|| code.strip_prefix("epsg:")).unwrap_or(code);
		ensure!(!code.is_empty(), "empty SRS code");
		let code = code.parse::<u32>().with_context(|| format!("invalid SRS {input:?}"))?;
		Ok(Srs(code))
	}
}
