//! RouteSplitter - the geodetic-in, geodetic-out segmentation pipeline
//!
//! Reprojects the route and markers to a planar frame, projects the markers onto
//! the route, orders them, cuts the route, and reprojects the segments back.

use crate::coords::{Coordinate, Geodetic, Marker, Planar, Polyline};
use crate::crs::{CrsTransform, PlanarReprojector};
use crate::segmenter::{self, Segment};
use crate::{Result, ordering, projector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default template for segment names; `{i}` is the 1-based segment number
pub const DEFAULT_NAME_TEMPLATE: &str = "Segment {i}";

/// Configuration for a segmentation run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplitConfig {
    /// Tolerance as a fraction of the route's planar length (default 1e-6).
    /// Cuts closer than this to each other, to a vertex, or to an end of the
    /// remaining line are treated as coincident.
    pub relative_tolerance: f64,
    /// Lower bound for the tolerance in planar units (default 1e-6, a micrometer
    /// for the supported projected systems)
    pub absolute_tolerance: f64,
    /// Template for segment names (default "Segment {i}")
    pub name_template: String,
    /// Project markers on the rayon thread pool (default true)
    pub parallel_projection: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: 1e-6,
            absolute_tolerance: 1e-6,
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
            parallel_projection: true,
        }
    }
}

impl SplitConfig {
    /// Effective tolerance for a line of the given planar length
    #[inline]
    pub fn tolerance_for(&self, length: f64) -> f64 {
        self.absolute_tolerance.max(self.relative_tolerance * length)
    }
}

/// Runs segmentation with a fixed configuration
#[derive(Debug, Clone, Default)]
pub struct RouteSplitter {
    config: SplitConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RouteSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Split a geodetic route, reprojecting through `source_crs` -> `planar_crs`
    pub fn split(
        &self,
        line: &Polyline<Geodetic>,
        markers: &[Marker],
        source_crs: &str,
        planar_crs: &str,
    ) -> Result<Vec<Segment<Geodetic>>> {
        let transform = CrsTransform::from_identifiers(source_crs, planar_crs)?;
        self.split_with(&transform, line, markers)
    }

    /// Split a geodetic route using any reprojector
    pub fn split_with<R: PlanarReprojector>(
        &self,
        reprojector: &R,
        line: &Polyline<Geodetic>,
        markers: &[Marker],
    ) -> Result<Vec<Segment<Geodetic>>> {
        line.ensure_splittable()?;

        let planar_line = reprojector.polyline_to_planar(line)?;
        let planar_markers = markers
            .iter()
            .map(|m| reprojector.to_planar(m))
            .collect::<Result<Vec<_>>>()?;

        let segments = self.split_planar(&planar_line, &planar_markers)?;

        segments
            .iter()
            .map(|s| s.map_line(|l| reprojector.polyline_to_geodetic(l)))
            .collect()
    }

    /// Split a route that is already in planar coordinates
    pub fn split_planar(
        &self,
        line: &Polyline<Planar>,
        markers: &[Coordinate<Planar>],
    ) -> Result<Vec<Segment<Planar>>> {
        line.ensure_splittable()?;
        line.ensure_finite()?;
        let length = line.length();
        let tolerance = self.config.tolerance_for(length);

        let projected =
            projector::project_all(line, markers, self.config.parallel_projection)?;
        let farthest = projected
            .iter()
            .max_by(|a, b| a.offset.total_cmp(&b.offset))
            .filter(|p| p.offset > length);
        if let Some(farthest) = farthest {
            tracing::warn!(
                "Marker {} is {:.1} units from the route, farther than the route is long",
                farthest.source_marker_index,
                farthest.offset
            );
        }

        let ordered = ordering::order(projected);
        segmenter::segment(line, &ordered, tolerance)
    }
}

/// Split `line` at the projections of `markers` with the default configuration
///
/// Fails with `InvalidGeometry` when the line has fewer than two coordinates and
/// with `Projection` when a CRS identifier or coordinate cannot be reprojected.
pub fn segment_route(
    line: &Polyline<Geodetic>,
    markers: &[Marker],
    source_crs: &str,
    planar_crs: &str,
) -> Result<Vec<Segment<Geodetic>>> {
    RouteSplitter::default().split(line, markers, source_crs, planar_crs)
}
