//! An axis-aligned rectangle in the units of some coordinate reference system.
//!
//! A `Bounds` carries no CRS itself; callers track the CRS next to it (see
//! [`crate::Srs`]). Unlike a geographic bbox it is not limited to the
//! longitude/latitude value range, so it can hold projected coordinates such
//! as Web Mercator meters.
//!
//! # Examples
//!
//! ```
//! use tileseed_core::Bounds;
//!
//! let mut bounds = Bounds::new(-10.0, -5.0, 10.0, 5.0).unwrap();
//! let other = Bounds::new(-12.0, -3.0, 8.0, 6.0).unwrap();
//! bounds.extend(&other);
//! assert_eq!(bounds.as_tuple(), (-12.0, -5.0, 10.0, 6.0));
//! ```

use anyhow::{Result, ensure};
use std::fmt::Debug;

#[derive(Clone, Copy, PartialEq)]
pub struct Bounds {
	pub x_min: f64,
	pub y_min: f64,
	pub x_max: f64,
	pub y_max: f64,
}

impl Bounds {
	/// Creates a new `Bounds` from `x_min, y_min, x_max, y_max`.
	///
	/// # Examples
	/// ```
	/// use tileseed_core::Bounds;
	///
	/// let bounds = Bounds::new(-10.0, -5.0, 10.0, 5.0).unwrap();
	/// assert_eq!(bounds.width(), 20.0);
	/// assert_eq!(bounds.height(), 10.0);
	/// ```
	pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Bounds> {
		ensure!(x_min.is_finite() && y_min.is_finite() && x_max.is_finite() && y_max.is_finite(), "bounds must be finite");
		ensure!(x_min <= x_max, "x_min ({x_min}) must be <= x_max ({x_max})");
		ensure!(y_min <= y_max, "y_min ({y_min}) must be <= y_max ({y_max})");
		Ok(Bounds { x_min, y_min, x_max, y_max })
	}

	pub fn width(&self) -> f64 {
		self.x_max - self.x_min
	}

	pub fn height(&self) -> f64 {
		self.y_max - self.y_min
	}

	pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
		(self.x_min, self.y_min, self.x_max, self.y_max)
	}

	pub fn as_array(&self) -> [f64; 4] {
		[self.x_min, self.y_min, self.x_max, self.y_max]
	}

	/// Expands the rectangle in place so that it also covers `other`.
	pub fn extend(&mut self, other: &Bounds) {
		self.x_min = self.x_min.min(other.x_min);
		self.y_min = self.y_min.min(other.y_min);
		self.x_max = self.x_max.max(other.x_max);
		self.y_max = self.y_max.max(other.y_max);
	}

	/// Non-mutating version of [`extend`](Self::extend).
	pub fn extended(mut self, other: &Bounds) -> Bounds {
		self.extend(other);
		self
	}

	/// Shrinks the rectangle in place to the overlap with `other`.
	///
	/// Fails when the rectangles do not overlap at all.
	pub fn intersect(&mut self, other: &Bounds) -> Result<()> {
		let intersected = Bounds::new(
			self.x_min.max(other.x_min),
			self.y_min.max(other.y_min),
			self.x_max.min(other.x_max),
			self.y_max.min(other.y_max),
		)?;
		*self = intersected;
		Ok(())
	}

	/// Non-mutating version of [`intersect`](Self::intersect).
	pub fn intersected(mut self, other: &Bounds) -> Result<Bounds> {
		self.intersect(other)?;
		Ok(self)
	}

	/// True when every point of `other` lies inside `self`, boundary included.
	pub fn contains(&self, other: &Bounds) -> bool {
		self.x_min <= other.x_min && self.y_min <= other.y_min && self.x_max >= other.x_max && self.y_max >= other.y_max
	}

	/// True when the interiors of `self` and `other` overlap. Rectangles that
	/// only share an edge or a corner do not overlap.
	pub fn overlaps(&self, other: &Bounds) -> bool {
		self.x_min < other.x_max && self.x_max > other.x_min && self.y_min < other.y_max && self.y_max > other.y_min
	}
}

impl Debug for Bounds {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Bounds({}, {}, {}, {})", self.x_min, self.y_min, self.x_max, self.y_max)
	}
}

impl TryFrom<Vec<f64>> for Bounds {
	type Error = anyhow::Error;

	/// Builds a `Bounds` from a `Vec<f64>` with exactly four elements.
	///
	/// # Examples
	/// ```
	/// use tileseed_core::Bounds;
	///
	/// let bounds = Bounds::try_from(vec![-10.0, -5.0, 10.0, 5.0]).unwrap();
	/// assert_eq!(bounds.as_tuple(), (-10.0, -5.0, 10.0, 5.0));
	/// ```
	fn try_from(input: Vec<f64>) -> Result<Self> {
		ensure!(input.len() == 4, "bounds must have 4 elements (x_min, y_min, x_max, y_max)");
		Bounds::new(input[0], input[1], input[2], input[3])
	}
}

impl TryFrom<[f64; 4]> for Bounds {
	type Error = anyhow::Error;

	fn try_from(input: [f64; 4]) -> Result<Self> {
		Bounds::new(input[0], input[1], input[2], input[3])
	}
}
