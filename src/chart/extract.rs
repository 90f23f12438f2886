use kurbo::Point;

use super::document::PathGeometry;
use super::segment::ChartRecord;
use crate::error::DigitizeError;

/// Pixel-space plotting area of one chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Derive the plotting area from the gridlines.
///
/// Horizontal extent comes from gridline 0; the vertical span runs from
/// gridline 4 (smallest `y`) down to gridline 0. Gridline `y` values must
/// strictly decrease from 0 to 4.
pub fn chart_bounds<P: PathGeometry>(chart: &ChartRecord<'_, P>) -> Result<ChartBounds, DigitizeError> {
    let boxes = chart.gridlines.map(|g| g.bounding_box());
    if boxes.windows(2).any(|w| w[0].y0 <= w[1].y0) {
        return Err(DigitizeError::GridlineOrder { chart: chart.index });
    }

    let first = boxes[0];
    let last = boxes[boxes.len() - 1];
    Ok(ChartBounds {
        x: first.x0,
        y: last.y0,
        width: first.width(),
        height: first.y0 - last.y0,
    })
}

/// Sample `resolution + 1` points at uniform arc-length steps from 0 to the
/// full length, then the terminal point once more.
pub fn sample_path<P: PathGeometry>(path: &P, resolution: usize) -> Vec<Point> {
    let length = path.length();
    let mut points: Vec<Point> = (0..=resolution)
        .map(|i| path.point_at_length(length * i as f64 / resolution as f64))
        .collect();
    points.push(path.point_at_length(length));
    points
}
