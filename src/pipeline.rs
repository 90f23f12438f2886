//! Batch orchestration: acquisition, then digitization of every geography
//! that acquired successfully.
//!
//! Each stage is a bounded task set with one drain point. A geography that
//! fails (error or panic) is counted and logged; the others carry on.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::chart::digitize_page;
use crate::config::Settings;
use crate::fetch;
use crate::geography::Geography;
use crate::render::{Inkscape, PageRenderer};
use crate::series::GeographyResult;
use crate::store::Store;

/// Pages carrying charts, in the order their charts are numbered.
const CHART_PAGES: [u32; 2] = [1, 2];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStats {
    pub stage: &'static str,
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

impl StageStats {
    pub fn new(stage: &'static str, total: usize) -> Self {
        StageStats {
            stage,
            total,
            ok: 0,
            errors: 0,
        }
    }
}

impl fmt::Display for StageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<9} {} attempted, {} succeeded, {} failed",
            self.stage, self.total, self.ok, self.errors
        )
    }
}

pub struct Pipeline {
    settings: Arc<Settings>,
    renderer: Arc<dyn PageRenderer>,
    store: Store,
}

impl Pipeline {
    pub fn new(settings: Settings, renderer: Arc<dyn PageRenderer>) -> Self {
        let store = Store::new(&settings.output_dir);
        Pipeline {
            settings: Arc::new(settings),
            renderer,
            store,
        }
    }

    /// Pipeline rendering pages with the configured Inkscape binary.
    pub fn with_inkscape(settings: Settings) -> Self {
        let renderer = Arc::new(Inkscape::new(&settings.renderer.program));
        Pipeline::new(settings, renderer)
    }

    /// Download every geography, then process the ones that downloaded.
    pub async fn run(&self, geographies: Vec<Geography>) -> Result<Vec<StageStats>> {
        let (downloaded, download) = fetch::download_all(&self.settings, dedup(geographies)).await?;
        let process = self.process_all(downloaded).await?;
        Ok(vec![download, process])
    }

    /// Digitize and merge every geography with at most `process_concurrency`
    /// workers. Never schedules the same geography twice.
    pub async fn process_all(&self, geographies: Vec<Geography>) -> Result<StageStats> {
        let geographies = dedup(geographies);
        let semaphore = Arc::new(Semaphore::new(self.settings.process_concurrency));
        let mut stats = StageStats::new("process", geographies.len());

        let pb = ProgressBar::new(stats.total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} geographies ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let mut tasks = JoinSet::new();
        for geo in geographies {
            let permit = Arc::clone(&semaphore).acquire_owned().await?;
            let settings = Arc::clone(&self.settings);
            let renderer = Arc::clone(&self.renderer);
            let store = self.store.clone();
            let code = geo.code.clone();

            tasks.spawn(async move {
                let _permit = permit;
                // Rendering and parsing block; keep them off the runtime threads.
                let outcome = tokio::task::spawn_blocking(move || {
                    process_geography(&settings, renderer.as_ref(), &store, &geo)
                })
                .await;
                (code, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Ok(_)))) => stats.ok += 1,
                Ok((code, Ok(Err(e)))) => {
                    warn!("Failed to process {}: {:#}", code, e);
                    stats.errors += 1;
                }
                Ok((code, Err(e))) => {
                    warn!("Worker for {} did not finish: {}", code, e);
                    stats.errors += 1;
                }
                Err(e) => {
                    warn!("Processing task aborted: {}", e);
                    stats.errors += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            "Processed {} geographies ({} ok, {} errors)",
            stats.total, stats.ok, stats.errors
        );
        Ok(stats)
    }
}

fn dedup(mut geographies: Vec<Geography>) -> Vec<Geography> {
    let before = geographies.len();
    geographies.sort();
    geographies.dedup();
    if geographies.len() < before {
        debug!("Dropped {} duplicate geographies", before - geographies.len());
    }
    geographies
}

/// Render both pages, digitize them, merge with the stored record and persist.
pub fn process_geography(
    settings: &Settings,
    renderer: &dyn PageRenderer,
    store: &Store,
    geo: &Geography,
) -> Result<GeographyResult> {
    let document = geo.document_path(&settings.vintage_dir());
    let mut charts = Vec::with_capacity(6);

    for page in CHART_PAGES {
        let original = store.page_path(geo, "original", page);
        let svg = renderer
            .render_page(&document, page, &original)
            .with_context(|| format!("Failed to render page {} of {}", page, geo))?;
        let digitized = digitize_page(&svg, &settings.chart)
            .with_context(|| format!("Failed to digitize page {} of {}", page, geo))?;
        debug!("{} page {}: {} charts", geo, page, digitized.charts.len());
        store.write_page_svg(geo, "processed", page, &digitized.stripped_svg)?;
        charts.extend(digitized.charts);
    }

    let fresh = GeographyResult::from_charts(geo.category, charts)
        .with_context(|| format!("Unexpected chart layout for {}", geo))?;

    let prior = match store.load(geo)? {
        Some(prior) => {
            info!("Merging {} with its stored record", geo);
            prior
        }
        None => GeographyResult::empty(geo.category),
    };
    let merged = prior.merge(&fresh, settings.merge_policy);

    let path = store.save(geo, &merged)?;
    store.export_csv(geo, &merged)?;
    info!("Wrote {}", path.display());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use anyhow::bail;
    use chrono::NaiveDate;

    use super::*;
    use crate::series::{ChartType, DailyPoint};

    /// Serves the fixture page for every report; some geographies misbehave.
    struct FixtureRenderer {
        svg: String,
    }

    impl FixtureRenderer {
        fn new() -> Self {
            FixtureRenderer {
                svg: std::fs::read_to_string("tests/fixtures/mobility_page.svg").unwrap(),
            }
        }
    }

    impl PageRenderer for FixtureRenderer {
        fn render_page(&self, document: &Path, _page: u32, out: &Path) -> Result<String> {
            let code = document
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match code.as_str() {
                "DE" => bail!("renderer exited with 1"),
                "IT" => panic!("renderer crashed"),
                "ES" => Ok("<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_string()),
                _ => {
                    std::fs::create_dir_all(out.parent().unwrap())?;
                    std::fs::write(out, &self.svg)?;
                    Ok(self.svg.clone())
                }
            }
        }
    }

    fn pipeline(name: &str) -> (PathBuf, Pipeline) {
        let root = std::env::temp_dir().join(format!("mobility-pipeline-{}-{}", name, std::process::id()));
        std::fs::remove_dir_all(&root).ok();
        let mut settings = Settings::for_tests(&root);
        settings.process_concurrency = 2;
        (root, Pipeline::new(settings, Arc::new(FixtureRenderer::new())))
    }

    #[tokio::test]
    async fn processes_both_pages_into_six_series() {
        let (root, pipeline) = pipeline("six");
        let fr = Geography::country("FR");
        let stats = pipeline.process_all(vec![fr.clone()]).await.unwrap();
        assert_eq!((stats.total, stats.ok, stats.errors), (1, 1, 0));

        let record = pipeline.store.load(&fr).unwrap().unwrap();
        assert_eq!(record.series.len(), 6);
        for chart_type in ChartType::ALL {
            assert_eq!(record.chart(chart_type).unwrap().points.len(), 43);
        }
        // Page 2 repeats page 1, so transit mirrors retail.
        assert_eq!(
            record.chart(ChartType::TransitStations).unwrap().points[0],
            DailyPoint {
                date: NaiveDate::from_ymd_opt(2020, 3, 29).unwrap(),
                value: 80
            }
        );

        let dir = root.join("output").join("FR");
        for file in ["original-1.svg", "processed-2.svg", "mobility.json", "mobility-residential.csv"] {
            assert!(dir.join(file).is_file(), "missing {file}");
        }
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let (root, pipeline) = pipeline("twice");
        let ny = Geography::resolve("US-NY").unwrap();
        pipeline.process_all(vec![ny.clone()]).await.unwrap();
        let first = std::fs::read_to_string(pipeline.store.record_path(&ny)).unwrap();
        pipeline.process_all(vec![ny.clone()]).await.unwrap();
        let second = std::fs::read_to_string(pipeline.store.record_path(&ny)).unwrap();
        assert_eq!(first, second);
        assert!(second.contains("\"state\""));
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn failures_stay_with_their_geography() {
        let (root, pipeline) = pipeline("isolate");
        let geos = vec![
            Geography::country("FR"),
            Geography::country("DE"),
            Geography::country("IT"),
            Geography::country("ES"),
            Geography::country("FR"),
        ];
        let stats = pipeline.process_all(geos).await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.ok, 1);
        assert_eq!(stats.errors, 3);

        assert!(pipeline.store.load(&Geography::country("FR")).unwrap().is_some());
        assert!(pipeline.store.load(&Geography::country("ES")).unwrap().is_none());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn stats_summary_line() {
        let stats = StageStats {
            stage: "download",
            total: 3,
            ok: 2,
            errors: 1,
        };
        assert_eq!(stats.to_string(), "download  3 attempted, 2 succeeded, 1 failed");
    }
}
