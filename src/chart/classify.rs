use super::color::Rgb;
use super::document::PathGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Series,
    Gridline,
    Discard,
}

/// Stroke colours and thresholds that tell chart paths apart.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub series_stroke: Rgb,
    pub gridline_stroke: Rgb,
    /// Gridline-coloured paths this short are axis ticks, not gridlines.
    pub min_gridline_length: f64,
}

/// Paths of one page split into disjoint sets, each in encounter order.
#[derive(Debug)]
pub struct Classified<'a, P> {
    pub series: Vec<&'a P>,
    pub gridlines: Vec<&'a P>,
    pub discarded: Vec<&'a P>,
}

pub fn classify_path<P: PathGeometry>(path: &P, palette: &Palette) -> PathClass {
    match path.stroke() {
        Some(stroke) if stroke == palette.series_stroke => PathClass::Series,
        Some(stroke)
            if stroke == palette.gridline_stroke && path.length() > palette.min_gridline_length =>
        {
            PathClass::Gridline
        }
        _ => PathClass::Discard,
    }
}

pub fn classify_paths<'a, P: PathGeometry>(paths: &'a [P], palette: &Palette) -> Classified<'a, P> {
    let mut out = Classified {
        series: Vec::new(),
        gridlines: Vec::new(),
        discarded: Vec::new(),
    };
    for path in paths {
        match classify_path(path, palette) {
            PathClass::Series => out.series.push(path),
            PathClass::Gridline => out.gridlines.push(path),
            PathClass::Discard => out.discarded.push(path),
        }
    }
    out
}
