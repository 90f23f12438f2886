use std::fmt;

use thiserror::Error;

/// Which chart axis a mapping was asked to scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Time,
    Value,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Time => f.write_str("time"),
            Axis::Value => f.write_str("value"),
        }
    }
}

/// Failures while turning one vectorised page into daily series.
///
/// Every variant aborts the geography that produced it; the batch keeps going.
#[derive(Debug, Error)]
pub enum DigitizeError {
    #[error(
        "each series path must have 5 gridlines, found {gridlines} gridlines and {series} series paths"
    )]
    StructuralMismatch { gridlines: usize, series: usize },

    #[error("chart {chart}: gridlines are not stacked with decreasing y")]
    GridlineOrder { chart: usize },

    #[error("degenerate chart: zero-extent {axis} axis")]
    DegenerateChart { axis: Axis },

    #[error("expected {expected} charts across both pages, got {found}")]
    ChartCount { expected: usize, found: usize },

    #[error("malformed svg document: {0}")]
    Svg(#[from] quick_xml::Error),
}

/// Failures while downloading one geography's report.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {code} failed: {source}")]
    Request {
        code: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{code}: server answered {status}")]
    Status {
        code: String,
        status: reqwest::StatusCode,
    },

    #[error("{code}: could not write document: {source}")]
    Io {
        code: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn code(&self) -> &str {
        match self {
            FetchError::Request { code, .. }
            | FetchError::Status { code, .. }
            | FetchError::Io { code, .. } => code,
        }
    }
}
