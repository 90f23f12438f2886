use super::classify::Classified;
use crate::error::DigitizeError;

pub const GRIDLINES_PER_CHART: usize = 5;

/// One chart on a page: its series curve and its five horizontal gridlines.
#[derive(Debug)]
pub struct ChartRecord<'a, P> {
    /// Position on the page, in encounter order.
    pub index: usize,
    pub series: &'a P,
    /// Stacked so that gridline 0 has the largest `y` and gridline 4 the smallest.
    pub gridlines: [&'a P; GRIDLINES_PER_CHART],
}

/// Pair series paths with consecutive groups of five gridlines.
///
/// The renderer emits both kinds in the same chart order, so the n-th series
/// path owns gridlines `5n..5n+5`.
pub fn segment_charts<'a, P>(
    classified: &Classified<'a, P>,
) -> Result<Vec<ChartRecord<'a, P>>, DigitizeError> {
    let series = classified.series.len();
    let gridlines = classified.gridlines.len();
    if gridlines != GRIDLINES_PER_CHART * series {
        return Err(DigitizeError::StructuralMismatch { gridlines, series });
    }

    Ok(classified
        .series
        .iter()
        .zip(classified.gridlines.chunks_exact(GRIDLINES_PER_CHART))
        .enumerate()
        .map(|(index, (&series, group))| ChartRecord {
            index,
            series,
            gridlines: [group[0], group[1], group[2], group[3], group[4]],
        })
        .collect())
}
