//! Coordinate and polyline types tagged with their coordinate space
//!
//! Geodetic and planar values share one representation but never mix: every
//! coordinate carries a zero-sized [`Space`] marker, and the only way across is a
//! [`crate::PlanarReprojector`].

use crate::{Result, SplitError};
use geo::{Coord, Distance, Euclidean, Length, LineString, Point};
use std::fmt;
use std::marker::PhantomData;

/// Marker trait for the coordinate spaces a [`Coordinate`] can live in
pub trait Space: Copy + fmt::Debug + Send + Sync + 'static {
    /// Human readable name used in diagnostics
    const NAME: &'static str;
}

/// Longitude/latitude in degrees
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geodetic;

/// Projected x/y in a linear unit (meters for every supported CRS)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Planar;

impl Space for Geodetic {
    const NAME: &'static str = "geodetic";
}

impl Space for Planar {
    const NAME: &'static str = "planar";
}

/// A 2D position with an optional elevation, tagged with its space
///
/// Elevation is carried through every operation untouched and never enters a
/// distance computation.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct Coordinate<S: Space> {
    xy: Coord<f64>,
    elevation: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip))]
    space: PhantomData<S>,
}

/// A marker near the reference line, always given in geodetic space
pub type Marker = Coordinate<Geodetic>;

impl<S: Space> Coordinate<S> {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self::from_coord(Coord { x, y }, None)
    }

    #[inline]
    pub fn with_elevation(x: f64, y: f64, elevation: f64) -> Self {
        Self::from_coord(Coord { x, y }, Some(elevation))
    }

    #[inline]
    pub(crate) fn from_coord(xy: Coord<f64>, elevation: Option<f64>) -> Self {
        Self {
            xy,
            elevation,
            space: PhantomData,
        }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.xy.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.xy.y
    }

    #[inline]
    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    /// The horizontal part as a `geo` coordinate
    #[inline]
    pub fn coord(&self) -> Coord<f64> {
        self.xy
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.xy.x.is_finite() && self.xy.y.is_finite()
    }
}

impl Coordinate<Geodetic> {
    #[inline]
    pub fn longitude(&self) -> f64 {
        self.xy.x
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.xy.y
    }
}

impl Coordinate<Planar> {
    /// Euclidean distance in planar units
    #[inline]
    pub fn distance(&self, other: &Self) -> f64 {
        Euclidean.distance(Point::from(self.xy), Point::from(other.xy))
    }

    /// Point at parameter `t` in `[0, 1]` on the straight segment `self -> other`
    ///
    /// Elevation is interpolated only when both ends carry one.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let xy = Coord {
            x: self.xy.x + (other.xy.x - self.xy.x) * t,
            y: self.xy.y + (other.xy.y - self.xy.y) * t,
        };
        let elevation = match (self.elevation, other.elevation) {
            (Some(a), Some(b)) => Some(a + (b - a) * t),
            _ => None,
        };
        Self::from_coord(xy, elevation)
    }
}

impl<S: Space> fmt::Debug for Coordinate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.elevation {
            Some(z) => write!(f, "{}({}, {}, {})", S::NAME, self.xy.x, self.xy.y, z),
            None => write!(f, "{}({}, {})", S::NAME, self.xy.x, self.xy.y),
        }
    }
}

/// An ordered, non-empty sequence of coordinates in one space
///
/// Consecutive duplicates are allowed and behave as zero-length pieces.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct Polyline<S: Space> {
    coords: Vec<Coordinate<S>>,
}

impl<S: Space> Polyline<S> {
    /// Create a polyline, rejecting an empty coordinate list
    pub fn new(coords: Vec<Coordinate<S>>) -> Result<Self> {
        if coords.is_empty() {
            return Err(SplitError::InvalidGeometry(
                "a polyline needs at least one coordinate".to_string(),
            ));
        }
        Ok(Self { coords })
    }

    /// Create a polyline from `(x, y)` pairs
    pub fn from_xy(points: &[(f64, f64)]) -> Result<Self> {
        Self::new(points.iter().map(|&(x, y)| Coordinate::new(x, y)).collect())
    }

    #[inline]
    pub fn coords(&self) -> &[Coordinate<S>] {
        &self.coords
    }

    #[inline]
    pub fn into_coords(self) -> Vec<Coordinate<S>> {
        self.coords
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether there are no coordinates; `new` never builds such a polyline
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    #[inline]
    pub fn first(&self) -> &Coordinate<S> {
        &self.coords[0]
    }

    #[inline]
    pub fn last(&self) -> &Coordinate<S> {
        &self.coords[self.coords.len() - 1]
    }

    /// Fail with `InvalidGeometry` unless there are at least two coordinates
    pub fn ensure_splittable(&self) -> Result<()> {
        if self.coords.len() < 2 {
            return Err(SplitError::InvalidGeometry(format!(
                "{} line has {} coordinate(s), at least 2 are required",
                S::NAME,
                self.coords.len()
            )));
        }
        Ok(())
    }

    /// Fail with `InvalidGeometry` if any coordinate is NaN or infinite
    pub fn ensure_finite(&self) -> Result<()> {
        match self.coords.iter().position(|c| !c.is_finite()) {
            Some(index) => Err(SplitError::InvalidGeometry(format!(
                "{} line coordinate {index} is not finite: {:?}",
                S::NAME,
                self.coords[index]
            ))),
            None => Ok(()),
        }
    }

    /// Horizontal geometry as a `geo::LineString` (elevation dropped)
    pub fn to_line_string(&self) -> LineString<f64> {
        self.coords.iter().map(Coordinate::coord).collect()
    }
}

impl Polyline<Planar> {
    /// Total arc length in planar units
    pub fn length(&self) -> f64 {
        Euclidean.length(&self.to_line_string())
    }

    /// Arc length at every vertex, starting with 0
    pub fn cumulative_lengths(&self) -> Vec<f64> {
        let mut acc = 0.0;
        let mut out = Vec::with_capacity(self.coords.len());
        out.push(0.0);
        for pair in self.coords.windows(2) {
            acc += pair[0].distance(&pair[1]);
            out.push(acc);
        }
        out
    }
}
