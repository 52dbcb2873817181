//! Reading routes and markers from documents, and writing segments back
//!
//! Every supported format is reduced to the same flat list of [`Feature`]s, in
//! document order. The segmentation core only ever sees the typed geometry.

mod gpx_file;
pub mod kml;
pub mod kmz;

use crate::coords::{Coordinate, Geodetic, Marker, Polyline};
use crate::segmenter::Segment;
use crate::{Result, SplitError};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::Path;

pub use gpx_file::{read_gpx, write_gpx};

/// Geometry categories a caller can ask a document for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeometryKind {
    Line,
    Point,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryKind::Line => write!(f, "line"),
            GeometryKind::Point => write!(f, "point"),
        }
    }
}

/// Geometry of one document feature
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Line(Polyline<Geodetic>),
    Point(Coordinate<Geodetic>),
    /// Polygons, multi-geometries, tracks and anything else not used here
    Other,
}

/// A named geometry read from or written to a document
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub name: Option<String>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn new(name: Option<String>, geometry: Geometry) -> Self {
        Self { name, geometry }
    }
}

/// The first line among `features`
pub fn first_line(features: &[Feature]) -> Result<&Polyline<Geodetic>> {
    features
        .iter()
        .find_map(|f| match &f.geometry {
            Geometry::Line(line) => Some(line),
            _ => None,
        })
        .ok_or(SplitError::NoGeometryFound(GeometryKind::Line))
}

/// All points among `features`, in document order
pub fn points(features: &[Feature]) -> Result<Vec<Marker>> {
    let markers: Vec<Marker> = features
        .iter()
        .filter_map(|f| match f.geometry {
            Geometry::Point(point) => Some(point),
            _ => None,
        })
        .collect();
    if markers.is_empty() {
        return Err(SplitError::NoGeometryFound(GeometryKind::Point));
    }
    Ok(markers)
}

/// Turn segments into named line features
pub fn segments_to_features(segments: &[Segment<Geodetic>], name_template: &str) -> Vec<Feature> {
    segments
        .iter()
        .map(|s| Feature::new(Some(s.name(name_template)), Geometry::Line(s.line().clone())))
        .collect()
}

/// Document formats, chosen by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Kml,
    Kmz,
    Gpx,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("kml") => Ok(Format::Kml),
            Some("kmz") => Ok(Format::Kmz),
            Some("gpx") => Ok(Format::Gpx),
            _ => Err(SplitError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Read all features from a KML, KMZ or GPX file
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("document::read_features");

    let features = match Format::from_path(path)? {
        Format::Kml => kml::parse_kml(&std::fs::read_to_string(path)?)?,
        Format::Kmz => kml::parse_kml(&kmz::extract_kml_from_path(path)?)?,
        Format::Gpx => read_gpx(BufReader::new(File::open(path)?))?,
    };
    tracing::debug!("Read {} feature(s) from {}", features.len(), path.display());
    Ok(features)
}

/// Serialize features in the given format
///
/// Fails with `InvalidGeometry` when a feature has a non-finite coordinate.
pub fn render_features(
    format: Format,
    features: &[Feature],
    document_name: &str,
) -> Result<Vec<u8>> {
    ensure_finite(features)?;
    match format {
        Format::Kml => Ok(kml::write_kml(features, document_name)?.into_bytes()),
        Format::Kmz => {
            let text = kml::write_kml(features, document_name)?;
            Ok(kmz::package_kml(Cursor::new(Vec::new()), &text)?.into_inner())
        }
        Format::Gpx => {
            let mut buffer = Vec::new();
            write_gpx(&mut buffer, features, document_name)?;
            Ok(buffer)
        }
    }
}

/// Write features to a KML, KMZ or GPX file, replacing it if present
///
/// The document is fully rendered before the file is touched, so a failure
/// leaves any existing file as it was.
pub fn write_features(path: &Path, features: &[Feature], document_name: &str) -> Result<()> {
    let bytes = render_features(Format::from_path(path)?, features, document_name)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    tracing::debug!("Wrote {} feature(s) to {}", features.len(), path.display());
    Ok(())
}

fn ensure_finite(features: &[Feature]) -> Result<()> {
    for (index, feature) in features.iter().enumerate() {
        let finite = match &feature.geometry {
            Geometry::Line(line) => line.coords().iter().all(Coordinate::is_finite),
            Geometry::Point(point) => point.is_finite(),
            Geometry::Other => true,
        };
        if !finite {
            return Err(SplitError::InvalidGeometry(format!(
                "feature {index} ({}) has a non-finite coordinate",
                feature.name.as_deref().unwrap_or("unnamed")
            )));
        }
    }
    Ok(())
}
