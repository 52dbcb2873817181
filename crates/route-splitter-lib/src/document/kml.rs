//! KML reading and writing
//!
//! The reader is a streaming pass over the document that keeps only what the
//! splitter needs: each `Placemark`'s name and its top-level geometry. Namespace
//! prefixes are ignored, so `kml:Placemark` and `Placemark` read the same.

use crate::coords::{Coordinate, Geodetic, Polyline};
use crate::document::{Feature, Geometry};
use crate::{Result, SplitError};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Geometry elements that are recognised but not used
const OTHER_GEOMETRIES: &[&str] = &[
    "Polygon",
    "MultiGeometry",
    "LinearRing",
    "Model",
    "Track",
    "MultiTrack",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Line,
    Point,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Capture {
    Name,
    Coordinates,
}

/// Placemark under construction
#[derive(Default)]
struct PlacemarkState {
    /// Element depth of the `Placemark` start tag
    depth: usize,
    name: Option<String>,
    geometry: Option<Pending>,
    coordinates: Option<String>,
}

/// Parse every placemark in a KML document, in document order
pub fn parse_kml(text: &str) -> Result<Vec<Feature>> {
    // Text is not trimmed by the reader: entity references split text events, and
    // trimming each piece would eat the spaces around them
    let mut reader = Reader::from_str(text);

    let mut features = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut placemark: Option<PlacemarkState> = None;
    let mut capture: Option<Capture> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let tag = local_name(e)?;
                if let Some(state) = placemark.as_mut() {
                    let relative = stack.len() - state.depth;
                    match (relative, tag.as_str()) {
                        // Direct children of the Placemark
                        (1, "name") => start_capture(&mut capture, &mut buffer, Capture::Name),
                        (1, "LineString") if state.geometry.is_none() => {
                            state.geometry = Some(Pending::Line)
                        }
                        (1, "Point") if state.geometry.is_none() => {
                            state.geometry = Some(Pending::Point)
                        }
                        (1, other)
                            if state.geometry.is_none() && OTHER_GEOMETRIES.contains(&other) =>
                        {
                            state.geometry = Some(Pending::Other)
                        }
                        // Coordinates of the LineString/Point chosen above
                        (2, "coordinates")
                            if state.coordinates.is_none()
                                && matches!(
                                    stack.last().map(String::as_str),
                                    Some("LineString") | Some("Point")
                                )
                                && matches!(
                                    state.geometry,
                                    Some(Pending::Line) | Some(Pending::Point)
                                ) =>
                        {
                            start_capture(&mut capture, &mut buffer, Capture::Coordinates)
                        }
                        _ => {}
                    }
                } else if tag == "Placemark" {
                    placemark = Some(PlacemarkState {
                        depth: stack.len(),
                        ..Default::default()
                    });
                }
                stack.push(tag);
            }
            Event::End(ref e) => {
                let name = e.local_name();
                let tag = std::str::from_utf8(name.as_ref())
                    .map_err(|err| SplitError::Parse(err.to_string()))?;
                stack.pop();

                match (capture, tag) {
                    (Some(Capture::Name), "name") => {
                        if let Some(state) = placemark.as_mut() {
                            state.name = Some(buffer.trim().to_string());
                        }
                        capture = None;
                    }
                    (Some(Capture::Coordinates), "coordinates") => {
                        if let Some(state) = placemark.as_mut() {
                            state.coordinates = Some(std::mem::take(&mut buffer));
                        }
                        capture = None;
                    }
                    _ => {}
                }

                let closes_placemark = placemark
                    .as_ref()
                    .is_some_and(|state| tag == "Placemark" && stack.len() == state.depth);
                if closes_placemark {
                    if let Some(state) = placemark.take() {
                        features.push(finish_placemark(state)?);
                    }
                }
            }
            Event::Text(e) => {
                if capture.is_some() {
                    buffer.push_str(
                        std::str::from_utf8(&e).map_err(|err| SplitError::Parse(err.to_string()))?,
                    );
                }
            }
            Event::CData(e) => {
                if capture.is_some() {
                    buffer.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                if capture.is_some() {
                    let entity = std::str::from_utf8(&e)
                        .map_err(|err| SplitError::Parse(err.to_string()))?;
                    buffer.push_str(&resolve_entity(entity)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    tracing::debug!("Parsed {} placemark(s) from KML", features.len());
    Ok(features)
}

fn local_name(e: &BytesStart<'_>) -> Result<String> {
    let name = e.local_name();
    std::str::from_utf8(name.as_ref())
        .map(str::to_string)
        .map_err(|err| SplitError::Parse(err.to_string()))
}

fn start_capture(capture: &mut Option<Capture>, buffer: &mut String, what: Capture) {
    *capture = Some(what);
    buffer.clear();
}

fn resolve_entity(entity: &str) -> Result<String> {
    if let Some(code) = entity.strip_prefix('#') {
        let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        return value
            .and_then(char::from_u32)
            .map(String::from)
            .ok_or_else(|| SplitError::Parse(format!("invalid character reference &{entity};")));
    }
    quick_xml::escape::resolve_predefined_entity(entity)
        .map(str::to_string)
        .ok_or_else(|| SplitError::Parse(format!("unknown entity &{entity};")))
}

fn finish_placemark(state: PlacemarkState) -> Result<Feature> {
    let label = state.name.as_deref().unwrap_or("<unnamed>").to_string();
    let geometry = match (state.geometry, state.coordinates) {
        (Some(Pending::Line), Some(text)) => {
            let coords = parse_coordinates(&text)?;
            if coords.is_empty() {
                return Err(SplitError::Parse(format!(
                    "LineString in placemark '{label}' has no coordinates"
                )));
            }
            Geometry::Line(Polyline::new(coords)?)
        }
        (Some(Pending::Point), Some(text)) => {
            let coords = parse_coordinates(&text)?;
            match coords.first() {
                Some(point) => Geometry::Point(*point),
                None => {
                    return Err(SplitError::Parse(format!(
                        "Point in placemark '{label}' has no coordinates"
                    )));
                }
            }
        }
        (Some(Pending::Line | Pending::Point), None) => {
            return Err(SplitError::Parse(format!(
                "geometry in placemark '{label}' has no coordinates element"
            )));
        }
        _ => Geometry::Other,
    };
    Ok(Feature::new(state.name, geometry))
}

/// Parse a KML `coordinates` body: whitespace separated `lon,lat[,alt]` tuples
pub fn parse_coordinates(text: &str) -> Result<Vec<Coordinate<Geodetic>>> {
    text.split_whitespace()
        .map(|tuple| {
            let values = tuple
                .split(',')
                .map(|v| {
                    v.parse::<f64>().map_err(|_| {
                        SplitError::Parse(format!("invalid number '{v}' in coordinates '{tuple}'"))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            match values.as_slice() {
                [lon, lat] => Ok(Coordinate::new(*lon, *lat)),
                [lon, lat, alt] => Ok(Coordinate::with_elevation(*lon, *lat, *alt)),
                _ => Err(SplitError::Parse(format!(
                    "coordinate tuple '{tuple}' must have 2 or 3 values"
                ))),
            }
        })
        .collect()
}

fn format_coordinates(line: &Polyline<Geodetic>) -> String {
    line.coords()
        .iter()
        .map(format_coordinate)
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_coordinate(c: &Coordinate<Geodetic>) -> String {
    match c.elevation() {
        Some(alt) => format!("{},{},{}", c.longitude(), c.latitude(), alt),
        None => format!("{},{}", c.longitude(), c.latitude()),
    }
}

/// Render features as a KML document with one placemark each
///
/// `Geometry::Other` features are skipped.
pub fn write_kml(features: &[Feature], document_name: &str) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("Document")))?;
    write_text_element(&mut writer, "name", document_name)?;

    for feature in features {
        let (tag, coordinates) = match &feature.geometry {
            Geometry::Line(line) => ("LineString", format_coordinates(line)),
            Geometry::Point(point) => ("Point", format_coordinate(point)),
            Geometry::Other => continue,
        };
        writer.write_event(Event::Start(BytesStart::new("Placemark")))?;
        if let Some(name) = &feature.name {
            write_text_element(&mut writer, "name", name)?;
        }
        writer.write_event(Event::Start(BytesStart::new(tag)))?;
        if tag == "LineString" {
            write_text_element(&mut writer, "tessellate", "1")?;
        }
        write_text_element(&mut writer, "coordinates", &coordinates)?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
        writer.write_event(Event::End(BytesEnd::new("Placemark")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Document")))?;
    writer.write_event(Event::End(BytesEnd::new("kml")))?;

    String::from_utf8(writer.into_inner()).map_err(|err| SplitError::Parse(err.to_string()))
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>camino</name>
    <Folder>
      <name>Capa sin título</name>
      <Placemark>
        <name>Área &amp; acceso</name>
        <Polygon><outerBoundaryIs><LinearRing>
          <coordinates>0,0 1,0 1,1 0,0</coordinates>
        </LinearRing></outerBoundaryIs></Polygon>
      </Placemark>
      <Placemark>
        <name>Camino principal</name>
        <ExtendedData><Data name="coordinates"><value>x</value></Data></ExtendedData>
        <LineString>
          <tessellate>1</tessellate>
          <coordinates>
            -70.70,-33.45,0 -70.68,-33.45,0
            -70.66,-33.46,0
          </coordinates>
        </LineString>
      </Placemark>
      <Placemark>
        <name><![CDATA[Portón norte]]></name>
        <Point><coordinates>-70.69,-33.449</coordinates></Point>
      </Placemark>
      <Placemark>
        <Point><coordinates>-70.67,-33.455,12.5</coordinates></Point>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

    #[test]
    fn test_parse_placemarks_in_order() {
        let features = parse_kml(ROUTE_KML).unwrap();
        assert_eq!(features.len(), 4);

        assert_eq!(features[0].name.as_deref(), Some("Área & acceso"));
        assert_eq!(features[0].geometry, Geometry::Other);

        assert_eq!(features[1].name.as_deref(), Some("Camino principal"));
        match &features[1].geometry {
            Geometry::Line(line) => {
                assert_eq!(line.len(), 3);
                assert_eq!(line.first().longitude(), -70.70);
                assert_eq!(line.first().elevation(), Some(0.0));
                assert_eq!(line.last().latitude(), -33.46);
            }
            other => panic!("expected a line, got {other:?}"),
        }

        assert_eq!(features[2].name.as_deref(), Some("Portón norte"));
        assert_eq!(
            features[2].geometry,
            Geometry::Point(Coordinate::new(-70.69, -33.449))
        );

        assert_eq!(features[3].name, None);
        assert_eq!(
            features[3].geometry,
            Geometry::Point(Coordinate::with_elevation(-70.67, -33.455, 12.5))
        );
    }

    #[test]
    fn test_namespace_prefixes_are_ignored() {
        let text = r#"<kml:kml xmlns:kml="http://www.opengis.net/kml/2.2"><kml:Document>
            <kml:Placemark><kml:name>p</kml:name>
              <kml:Point><kml:coordinates>1,2</kml:coordinates></kml:Point>
            </kml:Placemark></kml:Document></kml:kml>"#;
        let features = parse_kml(text).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].geometry, Geometry::Point(Coordinate::new(1.0, 2.0)));
    }

    #[test]
    fn test_multigeometry_is_other() {
        let text = r#"<kml><Placemark><MultiGeometry>
            <LineString><coordinates>0,0 1,1</coordinates></LineString>
            </MultiGeometry></Placemark></kml>"#;
        let features = parse_kml(text).unwrap();
        assert_eq!(features[0].geometry, Geometry::Other);
    }

    #[test]
    fn test_bad_coordinates_are_errors() {
        assert!(matches!(
            parse_coordinates("1,2 3"),
            Err(SplitError::Parse(_))
        ));
        assert!(matches!(
            parse_coordinates("1,abc"),
            Err(SplitError::Parse(_))
        ));
        let text = "<kml><Placemark><LineString><coordinates> </coordinates></LineString></Placemark></kml>";
        assert!(matches!(parse_kml(text), Err(SplitError::Parse(_))));
    }

    #[test]
    fn test_entities() {
        assert_eq!(resolve_entity("amp").unwrap(), "&");
        assert_eq!(resolve_entity("#233").unwrap(), "é");
        assert_eq!(resolve_entity("#xE9").unwrap(), "é");
        assert!(resolve_entity("nbsp").is_err());
    }

    #[test]
    fn test_write_then_parse() {
        let features = vec![
            Feature::new(
                Some("Tramo 1 <norte>".to_string()),
                Geometry::Line(
                    Polyline::new(vec![
                        Coordinate::with_elevation(-70.7, -33.45, 510.25),
                        Coordinate::with_elevation(-70.69, -33.45, 512.0),
                    ])
                    .unwrap(),
                ),
            ),
            Feature::new(None, Geometry::Other),
            Feature::new(
                Some("Tramo 2".to_string()),
                Geometry::Line(Polyline::from_xy(&[(-70.69, -33.45), (-70.68, -33.45)]).unwrap()),
            ),
        ];
        let text = write_kml(&features, "tramos").unwrap();
        assert!(text.contains(KML_NAMESPACE));
        assert!(text.contains("&lt;norte&gt;"));

        let parsed = parse_kml(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], features[0]);
        assert_eq!(parsed[1], features[2]);
    }
}
