use crate::CliError;
use clap::Parser;
use route_splitter_lib::{DEFAULT_NAME_TEMPLATE, SplitConfig};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Route Splitter - Cut a route into named segments at the waypoints along it
pub struct Settings {
    /// KMZ, KML or GPX file holding the route (its first line is used)
    #[clap(short, long, value_name = "FILE")]
    pub line: PathBuf,

    /// KMZ, KML or GPX file holding the markers (defaults to the route file)
    #[clap(short, long, value_name = "FILE")]
    pub markers: Option<PathBuf>,

    /// Output file; the extension picks KMZ, KML or GPX
    #[clap(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Geodetic CRS of the input coordinates
    #[clap(long, default_value = "EPSG:4326")]
    pub source_crs: String,

    /// Projected CRS used for distances (default: UTM zone of the route start)
    #[clap(long)]
    pub planar_crs: Option<String>,

    /// Name of each output segment, `{i}` is replaced by the segment number
    #[clap(short, long, default_value = DEFAULT_NAME_TEMPLATE)]
    pub name_template: String,

    /// Cut tolerance as a fraction of the route length
    #[clap(long, default_value = "1e-6")]
    pub relative_tolerance: f64,

    /// Minimum cut tolerance in planar units (meters for UTM)
    #[clap(long, default_value = "1e-6")]
    pub absolute_tolerance: f64,
}

impl Settings {
    /// Library configuration for these settings
    pub fn split_config(&self) -> Result<SplitConfig, CliError> {
        for (flag, value) in [
            ("--relative-tolerance", self.relative_tolerance),
            ("--absolute-tolerance", self.absolute_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CliError::InvalidSetting(format!(
                    "{flag} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(SplitConfig {
            relative_tolerance: self.relative_tolerance,
            absolute_tolerance: self.absolute_tolerance,
            name_template: self.name_template.clone(),
            ..SplitConfig::default()
        })
    }

    /// The file markers are read from
    pub fn markers_path(&self) -> &PathBuf {
        self.markers.as_ref().unwrap_or(&self.line)
    }
}
