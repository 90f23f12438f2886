//! Writes the reduced page kept next to each record.
//!
//! Only classified chart paths survive. The output is smaller than the
//! vectoriser's page while keeping geometry reproducible:
//! - groups are collapsed and transforms are baked into path data
//! - path coordinates are written at full precision
//! - `id` attributes are kept as-is, never renamed
//! - paint is reduced to `fill:none` plus the resolved stroke colour
//! - attributes are sorted, elements are pretty-printed
//! - text, images, styles, scripts and metadata are dropped

use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::document::{PathGeometry, VectorPath};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

pub fn write_stripped(root_attributes: &[(String, String)], kept: &[&VectorPath]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root_attrs: Vec<(&str, &str)> = root_attributes
        .iter()
        .filter(|(k, _)| !k.contains(':'))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if !root_attrs.iter().any(|(k, _)| *k == "xmlns") {
        root_attrs.push(("xmlns", SVG_NS));
    }
    root_attrs.sort_by(|a, b| a.0.cmp(b.0));

    let mut root = BytesStart::new("svg");
    for attr in &root_attrs {
        root.push_attribute(*attr);
    }
    writer.write_event(Event::Start(root))?;

    for path in kept {
        let d = path.path().to_svg();
        let style = match path.stroke() {
            Some(stroke) => format!("fill:none;stroke:{stroke}"),
            None => "fill:none".to_string(),
        };
        let mut el = BytesStart::new("path");
        el.push_attribute(("d", d.as_str()));
        if let Some(id) = &path.id {
            el.push_attribute(("id", id.as_str()));
        }
        el.push_attribute(("style", style.as_str()));
        writer.write_event(Event::Empty(el))?;
    }

    writer.write_event(Event::End(BytesEnd::new("svg")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}
