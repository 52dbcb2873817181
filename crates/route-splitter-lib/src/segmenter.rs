//! Cutting the reference line at ordered projected points
//!
//! The line is consumed by a fold over the ordered points: each step either cuts
//! the remaining line in two, emitting the front part as a finished segment, or
//! leaves it untouched when the cut would be degenerate (at the very start or end
//! of what remains). Whatever is left after the last point becomes the final
//! segment.

use crate::coords::{Coordinate, Planar, Polyline, Space};
use crate::projector::ProjectedPoint;
use crate::{Result, SplitError};

/// Placeholder replaced by the 1-based segment number in name templates
pub const NUMBER_PLACEHOLDER: &str = "{i}";

/// One contiguous piece of the reference line
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(bound = ""))]
pub struct Segment<S: Space> {
    /// Position in traversal order, starting at 1
    number: usize,
    line: Polyline<S>,
}

impl<S: Space> Segment<S> {
    /// Create a segment, which must have at least two coordinates
    pub fn new(number: usize, line: Polyline<S>) -> Result<Self> {
        if line.len() < 2 {
            return Err(SplitError::InvalidGeometry(format!(
                "segment {number} would have {} coordinate(s)",
                line.len()
            )));
        }
        Ok(Self { number, line })
    }

    #[inline]
    pub fn number(&self) -> usize {
        self.number
    }

    #[inline]
    pub fn line(&self) -> &Polyline<S> {
        &self.line
    }

    #[inline]
    pub fn into_line(self) -> Polyline<S> {
        self.line
    }

    /// Render the output name, e.g. `"Segment {i}"` becomes `"Segment 3"`
    pub fn name(&self, template: &str) -> String {
        template.replace(NUMBER_PLACEHOLDER, &self.number.to_string())
    }

    /// Same segment in another space, keeping its number
    pub fn map_line<T: Space>(
        &self,
        convert: impl FnOnce(&Polyline<S>) -> Result<Polyline<T>>,
    ) -> Result<Segment<T>> {
        Segment::new(self.number, convert(&self.line)?)
    }
}

/// Concatenate segment coordinates, counting shared boundary coordinates once
pub fn concatenate<S: Space>(segments: &[Segment<S>]) -> Vec<Coordinate<S>> {
    let mut coords = Vec::new();
    for segment in segments {
        let skip = usize::from(!coords.is_empty());
        coords.extend(segment.line().coords().iter().skip(skip).copied());
    }
    coords
}

/// Split `line` at each of `ordered_points` (ascending arc length)
///
/// `tolerance` is the planar distance under which a cut counts as touching the
/// start or end of the remaining line, or an existing vertex. Returns at most
/// `ordered_points.len() + 1` segments, numbered from 1, each with at least two
/// coordinates.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn segment(
    line: &Polyline<Planar>,
    ordered_points: &[ProjectedPoint],
    tolerance: f64,
) -> Result<Vec<Segment<Planar>>> {
    line.ensure_splittable()?;
    line.ensure_finite()?;
    let total = line.length();
    if total <= tolerance {
        return Err(SplitError::InvalidGeometry(format!(
            "line length {total} is within tolerance {tolerance} of zero"
        )));
    }

    let start = Cursor {
        finished: Vec::with_capacity(ordered_points.len() + 1),
        remaining: line.clone(),
        remaining_start: 0.0,
    };
    let cursor = ordered_points
        .iter()
        .try_fold(start, |cursor, point| cursor.advance(point, tolerance))?;
    let pieces = cursor.finish(tolerance);

    tracing::debug!(
        "Cut line of length {:.3} into {} segment(s) from {} point(s)",
        total,
        pieces.len(),
        ordered_points.len()
    );

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| Segment::new(i + 1, piece))
        .collect()
}

/// Fold state: finished pieces plus the part of the line not yet cut
struct Cursor {
    finished: Vec<Polyline<Planar>>,
    remaining: Polyline<Planar>,
    /// Arc length of `remaining`'s first coordinate on the full line
    remaining_start: f64,
}

impl Cursor {
    fn advance(self, point: &ProjectedPoint, tolerance: f64) -> Result<Self> {
        let local = point.arc_length - self.remaining_start;
        match split_at(&self.remaining, local, &point.position, tolerance)? {
            Cut::Degenerate => {
                tracing::trace!(
                    "Skipping cut for marker {} at arc length {:.6}: touches an end of the remaining line",
                    point.source_marker_index,
                    point.arc_length
                );
                Ok(self)
            }
            Cut::Split { before, after } => {
                // Measured from the emitted piece so a vertex snap does not drift
                let remaining_start = self.remaining_start + before.length();
                let mut finished = self.finished;
                finished.push(before);
                Ok(Self {
                    finished,
                    remaining: after,
                    remaining_start,
                })
            }
        }
    }

    fn finish(self, tolerance: f64) -> Vec<Polyline<Planar>> {
        let mut finished = self.finished;
        if self.remaining.length() > tolerance || finished.is_empty() {
            finished.push(self.remaining);
        } else {
            tracing::trace!("Dropping zero-length tail after last cut");
        }
        finished
    }
}

/// Outcome of cutting a line at one position
#[derive(Debug, PartialEq)]
pub enum Cut {
    /// The position touches the line's start or end; nothing to cut
    Degenerate,
    Split {
        before: Polyline<Planar>,
        after: Polyline<Planar>,
    },
}

/// Cut `line` at arc length `at`, placing `position` at the seam
///
/// When `at` lies within `tolerance` of an interior vertex the cut happens exactly
/// at that vertex, so no near-duplicate coordinate is introduced. Within
/// `tolerance` of either end the cut is [`Cut::Degenerate`].
pub fn split_at(
    line: &Polyline<Planar>,
    at: f64,
    position: &Coordinate<Planar>,
    tolerance: f64,
) -> Result<Cut> {
    line.ensure_splittable()?;
    line.ensure_finite()?;
    if !at.is_finite() || !position.is_finite() {
        return Err(SplitError::InvalidGeometry(format!(
            "cannot cut at non-finite position {position:?} (arc length {at})"
        )));
    }
    let coords = line.coords();
    let cumulative = line.cumulative_lengths();
    let length = cumulative[cumulative.len() - 1];

    if at <= tolerance || at >= length - tolerance {
        return Ok(Cut::Degenerate);
    }

    let last = coords.len() - 1;
    let (before, after) =
        match (1..last).find(|&k| (cumulative[k] - at).abs() <= tolerance) {
            Some(vertex) => (coords[..=vertex].to_vec(), coords[vertex..].to_vec()),
            None => {
                // First piece whose far end lies beyond the cut
                let piece = (0..last)
                    .find(|&i| cumulative[i + 1] > at)
                    .unwrap_or(last - 1);
                let mut before = coords[..=piece].to_vec();
                before.push(*position);
                let mut after = Vec::with_capacity(coords.len() - piece);
                after.push(*position);
                after.extend_from_slice(&coords[piece + 1..]);
                (before, after)
            }
        };

    let before = Polyline::new(before)?;
    let after = Polyline::new(after)?;
    if before.len() < 2
        || after.len() < 2
        || before.length() <= tolerance
        || after.length() <= tolerance
    {
        return Ok(Cut::Degenerate);
    }
    Ok(Cut::Split { before, after })
}
