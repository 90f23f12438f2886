pub mod classify;
pub mod color;
pub mod document;
pub mod extract;
pub mod mapping;
pub mod segment;
pub mod strip;

use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

use crate::config::ChartLayout;
use crate::error::DigitizeError;
use crate::series::{downsample_daily, ChartSeries, DomainPoint};
use classify::{classify_paths, Palette};
use document::{PathGeometry, VectorDocument, VectorPath};
use extract::{chart_bounds, sample_path};
use mapping::AxisMapper;
use segment::{segment_charts, ChartRecord};

/// Daily series of every chart on one page, plus the reduced page.
#[derive(Debug)]
pub struct DigitizedPage {
    pub charts: Vec<ChartSeries>,
    pub stripped_svg: String,
}

impl From<&ChartLayout> for Palette {
    fn from(layout: &ChartLayout) -> Self {
        Palette {
            series_stroke: layout.series_stroke,
            gridline_stroke: layout.gridline_stroke,
            min_gridline_length: layout.min_gridline_length,
        }
    }
}

/// Page pipeline: svg → classified paths → chart records → daily series.
pub fn digitize_page(svg: &str, layout: &ChartLayout) -> Result<DigitizedPage> {
    let doc = VectorDocument::parse(svg)?;
    let classified = classify_paths(&doc.paths, &Palette::from(layout));
    debug!(
        "Classified {} paths: {} series, {} gridlines, {} discarded",
        doc.paths.len(),
        classified.series.len(),
        classified.gridlines.len(),
        classified.discarded.len()
    );

    let records = segment_charts(&classified)?;
    let charts = records
        .par_iter()
        .map(|record| digitize_chart(record, layout))
        .collect::<Result<Vec<_>, DigitizeError>>()?;

    let kept: Vec<&VectorPath> = classified
        .series
        .iter()
        .chain(&classified.gridlines)
        .copied()
        .collect();
    let stripped_svg = strip::write_stripped(&doc.root_attributes, &kept)?;

    Ok(DigitizedPage {
        charts,
        stripped_svg,
    })
}

/// Bounds, sampling, mapping and daily downsampling for one chart.
pub fn digitize_chart<P: PathGeometry>(
    record: &ChartRecord<'_, P>,
    layout: &ChartLayout,
) -> Result<ChartSeries, DigitizeError> {
    let bounds = chart_bounds(record)?;
    let mapper = AxisMapper::new(bounds, layout);
    let points = sample_path(record.series, layout.resolution)
        .into_iter()
        .map(|p| mapper.map_point(p))
        .collect::<Result<Vec<DomainPoint>, _>>()?;
    Ok(downsample_daily(&points))
}
