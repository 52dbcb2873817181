//! Coordinate reference systems and planar reprojection
//!
//! Only the handful of systems a hand-digitized route needs are supported: WGS84
//! as the geodetic source, and Web Mercator or WGS84 UTM as the planar frame.

use crate::coords::{Coordinate, Geodetic, Planar, Polyline};
use crate::{Result, SplitError};
use geo::Coord;
use std::fmt;
use std::str::FromStr;

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Precomputed constant: EARTH_MERCATOR_MAX / 180.0
const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / PI
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;

/// Precomputed constant: 180.0 / EARTH_MERCATOR_MAX
const X_TO_LON_FACTOR: f64 = 180.0 / EARTH_MERCATOR_MAX;

/// Precomputed constant: PI / EARTH_MERCATOR_MAX
const Y_TO_LAT_FACTOR: f64 = std::f64::consts::PI / EARTH_MERCATOR_MAX;

/// WGS84 semi-major axis in meters
const WGS84_A: f64 = 6378137.0;

/// WGS84 flattening
const WGS84_F: f64 = 1.0 / 298.257223563;

const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Largest longitude offset from a zone's central meridian accepted by UTM
pub const UTM_MAX_MERIDIAN_OFFSET: f64 = 60.0;

/// A supported coordinate reference system
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Crs {
    /// EPSG:4326 / OGC:CRS84, longitude-latitude in degrees
    Wgs84,
    /// EPSG:3857
    WebMercator,
    /// EPSG:326zz (north) and EPSG:327zz (south)
    Utm { zone: u8, south: bool },
}

impl Crs {
    /// Parse an identifier such as `EPSG:4326` or `epsg:32719`
    pub fn parse(identifier: &str) -> Result<Self> {
        let trimmed = identifier.trim();
        let upper = trimmed.to_ascii_uppercase();
        if upper == "OGC:CRS84" || upper == "CRS84" {
            return Ok(Crs::Wgs84);
        }
        let code = upper
            .strip_prefix("EPSG:")
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| {
                SplitError::Projection(format!("unrecognised CRS identifier '{trimmed}'"))
            })?;
        match code {
            4326 => Ok(Crs::Wgs84),
            3857 => Ok(Crs::WebMercator),
            32601..=32660 => Ok(Crs::Utm {
                zone: (code - 32600) as u8,
                south: false,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: (code - 32700) as u8,
                south: true,
            }),
            _ => Err(SplitError::Projection(format!(
                "unsupported CRS EPSG:{code}"
            ))),
        }
    }

    /// The UTM zone that contains a geodetic position
    pub fn utm_zone_for(longitude: f64, latitude: f64) -> Result<Self> {
        if !longitude.is_finite() || !latitude.is_finite() || latitude.abs() > 90.0 {
            return Err(SplitError::Projection(format!(
                "cannot pick a UTM zone for ({longitude}, {latitude})"
            )));
        }
        let normalized = (longitude + 180.0).rem_euclid(360.0);
        let zone = ((normalized / 6.0).floor() as u8 % 60) + 1;
        Ok(Crs::Utm {
            zone,
            south: latitude < 0.0,
        })
    }

    /// EPSG code of this system
    pub fn epsg(&self) -> u32 {
        match *self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
            Crs::Utm { zone, south: false } => 32600 + zone as u32,
            Crs::Utm { zone, south: true } => 32700 + zone as u32,
        }
    }

    #[inline]
    pub fn is_geodetic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }
}

impl FromStr for Crs {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self> {
        Crs::parse(s)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Converts between the geodetic input space and a planar working space
///
/// Implementations must be pure and round-trip stable: `to_geodetic(to_planar(c))`
/// gives back `c` to well below the segmentation tolerance.
pub trait PlanarReprojector: Sync {
    fn to_planar(&self, coordinate: &Coordinate<Geodetic>) -> Result<Coordinate<Planar>>;

    fn to_geodetic(&self, coordinate: &Coordinate<Planar>) -> Result<Coordinate<Geodetic>>;

    fn polyline_to_planar(&self, line: &Polyline<Geodetic>) -> Result<Polyline<Planar>> {
        let coords = line
            .coords()
            .iter()
            .map(|c| self.to_planar(c))
            .collect::<Result<Vec<_>>>()?;
        Polyline::new(coords)
    }

    fn polyline_to_geodetic(&self, line: &Polyline<Planar>) -> Result<Polyline<Geodetic>> {
        let coords = line
            .coords()
            .iter()
            .map(|c| self.to_geodetic(c))
            .collect::<Result<Vec<_>>>()?;
        Polyline::new(coords)
    }
}

/// Reprojection between a geodetic CRS and a projected CRS
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrsTransform {
    source: Crs,
    planar: Crs,
}

impl CrsTransform {
    /// Build a transform, checking that `source` is geodetic and `planar` is not
    pub fn new(source: Crs, planar: Crs) -> Result<Self> {
        if !source.is_geodetic() {
            return Err(SplitError::Projection(format!(
                "source CRS {source} is not geodetic"
            )));
        }
        let transform = Self { source, planar };
        if planar.is_geodetic() {
            return Err(transform.not_projected());
        }
        Ok(transform)
    }

    /// Build a transform from two identifiers
    pub fn from_identifiers(source: &str, planar: &str) -> Result<Self> {
        Self::new(Crs::parse(source)?, Crs::parse(planar)?)
    }

    #[inline]
    pub fn source(&self) -> Crs {
        self.source
    }

    #[inline]
    pub fn planar(&self) -> Crs {
        self.planar
    }

    fn not_projected(&self) -> SplitError {
        SplitError::Projection(format!(
            "planar CRS {} is not a projected system",
            self.planar
        ))
    }
}

impl PlanarReprojector for CrsTransform {
    fn to_planar(&self, coordinate: &Coordinate<Geodetic>) -> Result<Coordinate<Planar>> {
        let (lon, lat) = (coordinate.longitude(), coordinate.latitude());
        if !coordinate.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(SplitError::Projection(format!(
                "geodetic coordinate ({lon}, {lat}) is out of range"
            )));
        }
        let xy = match self.planar {
            Crs::WebMercator => wgs84_to_mercator(lat, lon)?,
            Crs::Utm { zone, south } => wgs84_to_utm(lat, lon, zone, south)?,
            Crs::Wgs84 => return Err(self.not_projected()),
        };
        Ok(Coordinate::from_coord(xy, coordinate.elevation()))
    }

    fn to_geodetic(&self, coordinate: &Coordinate<Planar>) -> Result<Coordinate<Geodetic>> {
        if !coordinate.is_finite() {
            return Err(SplitError::Projection(format!(
                "planar coordinate {coordinate:?} is not finite"
            )));
        }
        let (lat, lon) = match self.planar {
            Crs::WebMercator => mercator_to_wgs84(coordinate.x(), coordinate.y()),
            Crs::Utm { zone, south } => utm_to_wgs84(coordinate.x(), coordinate.y(), zone, south),
            Crs::Wgs84 => return Err(self.not_projected()),
        };
        if !lat.is_finite() || !lon.is_finite() {
            return Err(SplitError::Projection(format!(
                "planar coordinate {coordinate:?} has no geodetic equivalent"
            )));
        }
        Ok(Coordinate::from_coord(
            Coord { x: lon, y: lat },
            coordinate.elevation(),
        ))
    }
}

/// Convert WGS84 (lat, lon) to Web Mercator (x, y) in meters
///
/// Latitudes outside the Web Mercator range are an error rather than clamped,
/// since clamping would silently move route vertices.
#[inline]
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> Result<Coord<f64>> {
    if lat.abs() > MAX_LATITUDE {
        return Err(SplitError::Projection(format!(
            "latitude {lat} is outside the Web Mercator range"
        )));
    }
    let x = lon * LON_TO_X_FACTOR;
    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;
    Ok(Coord { x, y })
}

/// Convert Web Mercator (x, y) in meters to WGS84 (lat, lon)
#[inline]
pub fn mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = x * X_TO_LON_FACTOR;
    let lat =
        (std::f64::consts::PI / 2.0 - 2.0 * ((-y * Y_TO_LAT_FACTOR).exp()).atan()).to_degrees();
    (lat, lon)
}

/// Series coefficients of the Krüger transverse Mercator expansion, third order in n
struct KrugerSeries {
    /// Rectifying radius times the UTM scale factor
    k0_a: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
    /// 2√n / (1 + n), used for the conformal latitude
    conformal: f64,
}

impl KrugerSeries {
    fn wgs84() -> Self {
        let n = WGS84_F / (2.0 - WGS84_F);
        let n2 = n * n;
        let n3 = n2 * n;
        let rectifying = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
        Self {
            k0_a: UTM_SCALE * rectifying,
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
            conformal: 2.0 * n.sqrt() / (1.0 + n),
        }
    }
}

#[inline]
fn utm_central_meridian(zone: u8) -> f64 {
    zone as f64 * 6.0 - 183.0
}

#[inline]
fn utm_false_northing(south: bool) -> f64 {
    if south { UTM_FALSE_NORTHING_SOUTH } else { 0.0 }
}

/// Convert WGS84 (lat, lon) to UTM easting/northing in meters for a given zone
pub fn wgs84_to_utm(lat: f64, lon: f64, zone: u8, south: bool) -> Result<Coord<f64>> {
    let mut d_lon = lon - utm_central_meridian(zone);
    // Wrap across the antimeridian so zone 1 and zone 60 neighbours stay close
    if d_lon > 180.0 {
        d_lon -= 360.0;
    } else if d_lon < -180.0 {
        d_lon += 360.0;
    }
    if d_lon.abs() > UTM_MAX_MERIDIAN_OFFSET {
        return Err(SplitError::Projection(format!(
            "longitude {lon} is too far from UTM zone {zone}"
        )));
    }

    let series = KrugerSeries::wgs84();
    let phi = lat.to_radians();
    let lambda = d_lon.to_radians();

    let sin_phi = phi.sin();
    let t = (sin_phi.atanh() - series.conformal * (series.conformal * sin_phi).atanh()).sinh();
    let xi_p = t.atan2(lambda.cos());
    let eta_p = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

    let mut xi = xi_p;
    let mut eta = eta_p;
    for (j, alpha) in series.alpha.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
        eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
    }

    let easting = UTM_FALSE_EASTING + series.k0_a * eta;
    let northing = utm_false_northing(south) + series.k0_a * xi;
    if !easting.is_finite() || !northing.is_finite() {
        return Err(SplitError::Projection(format!(
            "({lon}, {lat}) cannot be expressed in UTM zone {zone}"
        )));
    }
    Ok(Coord {
        x: easting,
        y: northing,
    })
}

/// Convert UTM easting/northing in meters to WGS84 (lat, lon)
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u8, south: bool) -> (f64, f64) {
    let series = KrugerSeries::wgs84();
    let xi = (northing - utm_false_northing(south)) / series.k0_a;
    let eta = (easting - UTM_FALSE_EASTING) / series.k0_a;

    let mut xi_p = xi;
    let mut eta_p = eta;
    for (j, beta) in series.beta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
        eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
    }

    let chi = (xi_p.sin() / eta_p.cosh()).asin();
    let mut phi = chi;
    for (j, delta) in series.delta.iter().enumerate() {
        let k = 2.0 * (j + 1) as f64;
        phi += delta * (k * chi).sin();
    }
    let lambda = eta_p.sinh().atan2(xi_p.cos());

    let mut lon = utm_central_meridian(zone) + lambda.to_degrees();
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    (phi.to_degrees(), lon)
}
