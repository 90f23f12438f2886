use std::sync::LazyLock;

use kurbo::{Affine, BezPath, ParamCurve, ParamCurveArclen, PathEl, PathSeg, Point, Rect, Shape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, warn};

use super::color::Rgb;
use crate::error::DigitizeError;

static TRANSFORM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)\s*\(([^)]*)\)").unwrap());
static NUMBER_SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,]+").unwrap());

const ARCLEN_ACCURACY: f64 = 1e-6;

/// Subtrees that are never painted directly.
const HIDDEN_CONTAINERS: &[&[u8]] = &[
    b"defs",
    b"symbol",
    b"mask",
    b"clipPath",
    b"pattern",
    b"marker",
    b"filter",
    b"metadata",
];

/// Geometry queries the digitizer needs from a rendered path.
///
/// All coordinates are in page space, after every ancestor transform.
pub trait PathGeometry {
    fn stroke(&self) -> Option<Rgb>;
    fn length(&self) -> f64;
    fn point_at_length(&self, length: f64) -> Point;
    fn bounding_box(&self) -> Rect;
}

/// One painted `<path>` of a vectorised page, flattened into page space.
#[derive(Debug, Clone)]
pub struct VectorPath {
    pub id: Option<String>,
    stroke: Option<Rgb>,
    path: BezPath,
    segments: Vec<PathSeg>,
    /// Arc length at the end of each segment.
    cumulative: Vec<f64>,
}

impl VectorPath {
    pub fn new(id: Option<String>, stroke: Option<Rgb>, path: BezPath) -> Self {
        let segments: Vec<PathSeg> = path.segments().collect();
        let mut total = 0.0;
        let cumulative = segments
            .iter()
            .map(|seg| {
                total += seg.arclen(ARCLEN_ACCURACY);
                total
            })
            .collect();
        VectorPath {
            id,
            stroke,
            path,
            segments,
            cumulative,
        }
    }

    pub fn path(&self) -> &BezPath {
        &self.path
    }

    fn origin(&self) -> Point {
        match self.path.elements().first() {
            Some(PathEl::MoveTo(p)) => *p,
            _ => Point::ZERO,
        }
    }
}

impl PathGeometry for VectorPath {
    fn stroke(&self) -> Option<Rgb> {
        self.stroke
    }

    fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    fn point_at_length(&self, length: f64) -> Point {
        let Some(last) = self.segments.last() else {
            return self.origin();
        };
        let s = length.clamp(0.0, self.length());
        let idx = self.cumulative.partition_point(|&end| end < s);
        if idx >= self.segments.len() {
            return last.eval(1.0);
        }
        let start = if idx == 0 { 0.0 } else { self.cumulative[idx - 1] };
        let seg = self.segments[idx];
        seg.eval(seg.inv_arclen(s - start, ARCLEN_ACCURACY))
    }

    fn bounding_box(&self) -> Rect {
        self.path.bounding_box()
    }
}

/// A vectorised page reduced to its painted paths.
#[derive(Debug, Clone, Default)]
pub struct VectorDocument {
    /// Attributes of the outermost `<svg>` element, in document order.
    pub root_attributes: Vec<(String, String)>,
    pub paths: Vec<VectorPath>,
}

#[derive(Debug, Clone)]
struct Frame {
    transform: Affine,
    stroke: Option<Rgb>,
    hidden: bool,
}

impl VectorDocument {
    /// Parse an SVG page, resolving inherited strokes and baking transforms into path data.
    pub fn parse(svg: &str) -> Result<VectorDocument, DigitizeError> {
        let mut reader = Reader::from_str(svg);
        let mut doc = VectorDocument::default();
        let mut stack = vec![Frame {
            transform: Affine::IDENTITY,
            stroke: None,
            hidden: false,
        }];
        let mut seen_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let frame = doc.visit(&e, &stack, &mut seen_root)?;
                    stack.push(frame);
                }
                Event::Empty(e) => {
                    doc.visit(&e, &stack, &mut seen_root)?;
                }
                Event::End(_) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        debug!("Parsed {} painted paths", doc.paths.len());
        Ok(doc)
    }

    /// Handle one element and return the frame its children inherit.
    fn visit(
        &mut self,
        e: &BytesStart<'_>,
        stack: &[Frame],
        seen_root: &mut bool,
    ) -> Result<Frame, DigitizeError> {
        let parent = stack.last().cloned().unwrap_or(Frame {
            transform: Affine::IDENTITY,
            stroke: None,
            hidden: false,
        });
        let local = e.local_name();
        let name = local.as_ref();
        let attrs = read_attributes(e)?;

        if name == b"svg" && !*seen_root {
            *seen_root = true;
            self.root_attributes = attrs.clone();
        }

        let lookup = |key: &str| attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        let transform = match lookup("transform") {
            Some(t) => parent.transform * parse_transform(t),
            None => parent.transform,
        };
        let stroke = declared_stroke(lookup("style"), lookup("stroke")).unwrap_or(parent.stroke);
        let hidden = parent.hidden || HIDDEN_CONTAINERS.contains(&name);

        if name == b"path" && !hidden {
            if let Some(d) = lookup("d") {
                match BezPath::from_svg(d) {
                    Ok(mut path) => {
                        path.apply_affine(transform);
                        let id = lookup("id").map(str::to_string);
                        self.paths.push(VectorPath::new(id, stroke, path));
                    }
                    Err(err) => warn!("Skipping path with unreadable data: {}", err),
                }
            }
        }

        Ok(Frame {
            transform,
            stroke,
            hidden,
        })
    }
}

fn read_attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, DigitizeError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// The stroke an element declares itself: `Some(None)` for an explicit
/// non-colour paint, `None` when it inherits. Inline style beats the attribute.
fn declared_stroke(style: Option<&str>, attribute: Option<&str>) -> Option<Option<Rgb>> {
    let from_style = style.and_then(|s| {
        s.split(';').find_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            (key.trim() == "stroke").then(|| value.trim())
        })
    });

    match from_style.or(attribute).map(str::trim) {
        None | Some("inherit") | Some("currentColor") => None,
        Some(value) => Some(value.parse::<Rgb>().ok()),
    }
}

/// Parse an SVG transform list. Unknown or malformed functions are skipped.
pub fn parse_transform(list: &str) -> Affine {
    let mut acc = Affine::IDENTITY;
    for caps in TRANSFORM_RE.captures_iter(list) {
        let args: Vec<f64> = NUMBER_SEP_RE
            .split(caps[2].trim())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        let step = match (&caps[1], args.as_slice()) {
            ("matrix", [a, b, c, d, e, f]) => Affine::new([*a, *b, *c, *d, *e, *f]),
            ("translate", [x]) => Affine::translate((*x, 0.0)),
            ("translate", [x, y]) => Affine::translate((*x, *y)),
            ("scale", [s]) => Affine::scale(*s),
            ("scale", [sx, sy]) => Affine::scale_non_uniform(*sx, *sy),
            ("rotate", [a]) => Affine::rotate(a.to_radians()),
            ("rotate", [a, cx, cy]) => {
                Affine::translate((*cx, *cy))
                    * Affine::rotate(a.to_radians())
                    * Affine::translate((-cx, -cy))
            }
            ("skewX", [a]) => Affine::new([1.0, 0.0, a.to_radians().tan(), 1.0, 0.0, 0.0]),
            ("skewY", [a]) => Affine::new([1.0, a.to_radians().tan(), 0.0, 1.0, 0.0, 0.0]),
            (other, _) => {
                warn!("Ignoring transform {}({})", other, &caps[2]);
                continue;
            }
        };
        acc = acc * step;
    }
    acc
}
