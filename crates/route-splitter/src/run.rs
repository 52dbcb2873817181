use crate::CliError;
use crate::settings::Settings;
use route_splitter_lib::document::{self, Feature};
use route_splitter_lib::{
    Crs, CrsTransform, GeometryKind, Marker, PlanarReprojector, RouteSplitter, SplitError,
};
use std::path::Path;

/// Read the inputs, split the route and write the segments
pub fn run(settings: &Settings) -> Result<(), CliError> {
    profiling::scope!("run");

    let config = settings.split_config()?;
    let line_features = read(&settings.line)?;
    let line = document::first_line(&line_features).map_err(CliError::split(format!(
        "Reading route from {}",
        settings.line.display()
    )))?;

    let markers_path = settings.markers_path();
    let markers = if markers_path == &settings.line {
        markers_from(&line_features, markers_path)?
    } else {
        markers_from(&read(markers_path)?, markers_path)?
    };

    let source = Crs::parse(&settings.source_crs).map_err(CliError::split("Source CRS"))?;
    let planar = match &settings.planar_crs {
        Some(identifier) => Crs::parse(identifier).map_err(CliError::split("Planar CRS"))?,
        None => {
            let start = line.first();
            let crs = Crs::utm_zone_for(start.longitude(), start.latitude())
                .map_err(CliError::split("Choosing a UTM zone"))?;
            tracing::info!("Using {crs} as the planar CRS");
            crs
        }
    };
    let transform = CrsTransform::new(source, planar).map_err(CliError::split("CRS pair"))?;

    tracing::info!(
        "Splitting a route of {} vertices at {} marker(s)",
        line.len(),
        markers.len()
    );
    let splitter = RouteSplitter::new(config);
    let segments = splitter
        .split_with(&transform, line, &markers)
        .map_err(CliError::split("Splitting route"))?;

    let template = &splitter.config().name_template;
    let mut total = 0.0;
    for segment in &segments {
        let length = transform
            .polyline_to_planar(segment.line())
            .map_err(CliError::split("Measuring segment"))?
            .length();
        total += length;
        tracing::info!(
            "{}: {} vertices, {:.1} m",
            segment.name(template),
            segment.line().len(),
            length
        );
    }
    tracing::info!("{} segment(s), {:.1} m in total", segments.len(), total);

    let document_name = settings
        .output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("segments");
    let features = document::segments_to_features(&segments, template);
    document::write_features(&settings.output, &features, document_name).map_err(
        CliError::split(format!("Writing {}", settings.output.display())),
    )?;
    tracing::info!("Wrote {}", settings.output.display());
    Ok(())
}

fn read(path: &Path) -> Result<Vec<Feature>, CliError> {
    document::read_features(path).map_err(CliError::split(format!("Reading {}", path.display())))
}

/// All points of a document; a document without points yields no markers
fn markers_from(features: &[Feature], path: &Path) -> Result<Vec<Marker>, CliError> {
    match document::points(features) {
        Ok(markers) => Ok(markers),
        Err(SplitError::NoGeometryFound(GeometryKind::Point)) => {
            tracing::warn!("No markers in {}, the route is kept whole", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(CliError::split(format!("Reading markers from {}", path.display()))(e)),
    }
}
