//! Route Splitter Library - Cutting a route into segments at nearby markers
//!
//! Given one reference polyline and a set of marker points near it, this library
//! produces an ordered list of contiguous sub-polylines whose concatenation is the
//! original route, with every marker's projection on a segment boundary.
//!
//! # Architecture
//!
//! - **[`Coordinate`] / [`Polyline`]**: values tagged with their [`Geodetic`] or [`Planar`] space
//! - **[`CrsTransform`]**: [`PlanarReprojector`] between WGS84 and Web Mercator / UTM
//! - **[`projector`]**: nearest-point projection of each marker, with arc length
//! - **[`ordering`]**: deterministic arc-length order with index tie-breaking
//! - **[`segmenter`]**: fold over ordered points that emits [`Segment`]s
//! - **[`RouteSplitter`]**: the whole pipeline, geodetic in and geodetic out
//! - **[`document`]**: KML, KMZ and GPX reading and writing around the core
//!
//! # Performance Characteristics
//!
//! - **Projection**: O(V×M) for V vertices and M markers, parallel over markers
//! - **Segmentation**: O(V×M) in the worst case

mod coords;
mod crs;
pub mod document;
pub mod ordering;
pub mod projector;
pub mod segmenter;
mod splitter;

// Public API exports
pub use coords::{Coordinate, Geodetic, Marker, Planar, Polyline, Space};
pub use crs::{Crs, CrsTransform, PlanarReprojector};
pub use document::{Feature, Geometry, GeometryKind};
pub use projector::ProjectedPoint;
pub use segmenter::Segment;
pub use splitter::{DEFAULT_NAME_TEMPLATE, RouteSplitter, SplitConfig, segment_route};

/// Error types for route splitting and its document collaborators
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No {0} geometry found in document")]
    NoGeometryFound(GeometryKind),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Malformed document: {0}")]
    Parse(String),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("GPX parse error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SplitError>;
