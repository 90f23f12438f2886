use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::chart::color::Rgb;
use crate::series::MergePolicy;

const DEFAULT_CONFIG_FILE: &str = "mobility";
const ENV_PREFIX: &str = "MOBILITY";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Dataset vintage; part of every fetch locator and of the download directory.
    pub vintage: NaiveDate,
    pub base_url: String,
    pub pdf_dir: PathBuf,
    pub output_dir: PathBuf,
    pub download_concurrency: usize,
    pub process_concurrency: usize,
    pub merge_policy: MergePolicy,
    pub renderer: RendererSettings,
    pub chart: ChartLayout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RendererSettings {
    pub program: String,
}

/// Known layout of one report vintage. None of this is discoverable from the page.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartLayout {
    pub x_date_min: NaiveDate,
    pub x_date_max: NaiveDate,
    pub y_max: i64,
    pub resolution: usize,
    pub min_gridline_length: f64,
    pub series_stroke: Rgb,
    pub gridline_stroke: Rgb,
}

impl Default for ChartLayout {
    fn default() -> Self {
        ChartLayout {
            x_date_min: NaiveDate::from_ymd_opt(2020, 2, 16).unwrap_or_default(),
            x_date_max: NaiveDate::from_ymd_opt(2020, 3, 29).unwrap_or_default(),
            y_max: 80,
            resolution: 1000,
            min_gridline_length: 6.0,
            series_stroke: Rgb::new(66, 133, 244),
            gridline_stroke: Rgb::new(218, 220, 224),
        }
    }
}

impl Settings {
    /// Defaults, then `mobility.toml` (or `path`), then `MOBILITY_*` env vars.
    ///
    /// Nested keys use a double underscore: `MOBILITY_CHART__RESOLUTION=2000`.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let builder = Config::builder()
            .set_default("vintage", "2020-04-11")?
            .set_default("base_url", "https://www.gstatic.com/covid19/mobility")?
            .set_default("pdf_dir", "pdfs")?
            .set_default("output_dir", "output")?
            .set_default("download_concurrency", 20_i64)?
            .set_default("process_concurrency", 30_i64)?
            .set_default("merge_policy", "base")?
            .set_default("renderer.program", "inkscape")?
            .set_default("chart.x_date_min", "2020-02-16")?
            .set_default("chart.x_date_max", "2020-03-29")?
            .set_default("chart.y_max", 80_i64)?
            .set_default("chart.resolution", 1000_i64)?
            .set_default("chart.min_gridline_length", 6.0)?
            .set_default("chart.series_stroke", "rgb(66, 133, 244)")?
            .set_default("chart.gridline_stroke", "rgb(218, 220, 224)")?;

        let builder = match path {
            Some(p) => builder.add_source(File::from(p).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to assemble configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.download_concurrency > 0, "download_concurrency must be at least 1");
        anyhow::ensure!(self.process_concurrency > 0, "process_concurrency must be at least 1");
        anyhow::ensure!(self.chart.resolution > 0, "chart.resolution must be at least 1");
        anyhow::ensure!(
            self.chart.x_date_min < self.chart.x_date_max,
            "chart.x_date_min ({}) must precede chart.x_date_max ({})",
            self.chart.x_date_min,
            self.chart.x_date_max
        );
        Ok(())
    }

    /// Directory holding this vintage's downloaded reports.
    pub fn vintage_dir(&self) -> PathBuf {
        self.pdf_dir.join(self.vintage.format("%Y-%m-%d").to_string())
    }
}

#[cfg(test)]
impl Settings {
    /// Reference settings with every directory under `root`.
    pub fn for_tests(root: &Path) -> Settings {
        Settings {
            vintage: NaiveDate::from_ymd_opt(2020, 4, 11).unwrap(),
            base_url: "https://www.gstatic.com/covid19/mobility".to_string(),
            pdf_dir: root.join("pdfs"),
            output_dir: root.join("output"),
            download_concurrency: 20,
            process_concurrency: 30,
            merge_policy: MergePolicy::Base,
            renderer: RendererSettings {
                program: "inkscape".to_string(),
            },
            chart: ChartLayout::default(),
        }
    }
}
