mod chart;
mod config;
mod error;
mod fetch;
mod geography;
mod pipeline;
mod render;
mod series;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::geography::Geography;
use crate::pipeline::{Pipeline, StageStats};
use crate::series::{Category, ChartType};
use crate::store::Store;

#[derive(Parser)]
#[command(name = "mobility", about = "Digitize community mobility report charts into daily series")]
struct Cli {
    /// Settings file (default: ./mobility.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Dataset vintage, e.g. 2020-04-11
    #[arg(long, global = true)]
    vintage: Option<NaiveDate>,
    #[arg(long, global = true)]
    download_concurrency: Option<usize>,
    #[arg(long, global = true)]
    process_concurrency: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Only these geographies (FR, US-NY, US_New_York); repeatable
    #[arg(short, long = "geography")]
    geographies: Vec<String>,
    /// Skip US states
    #[arg(long, conflicts_with = "states_only")]
    countries_only: bool,
    /// Skip countries
    #[arg(long)]
    states_only: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every report, then digitize and merge them
    Run {
        #[command(flatten)]
        selection: Selection,
    },
    /// Download reports only
    Download {
        #[command(flatten)]
        selection: Selection,
        /// Empty the vintage download directory first
        #[arg(long)]
        clean: bool,
    },
    /// Digitize reports already on disk and merge them into stored records
    Process {
        #[command(flatten)]
        selection: Selection,
    },
    /// Digitize one vectorised page and print its daily series
    Digitize {
        #[arg(long)]
        svg: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Stored records overview table
    Overview {
        /// country or state
        #[arg(short, long, value_parser = parse_category)]
        category: Option<Category>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let result = match cli.command {
        Commands::Run { selection } => {
            let geographies = selection.resolve()?;
            println!(
                "Pipeline: {} geographies, vintage {}",
                geographies.len(),
                settings.vintage
            );
            let pipeline = Pipeline::with_inkscape(settings);
            let stats = pipeline.run(geographies).await?;
            print_summary(&stats);
            Ok(())
        }
        Commands::Download { selection, clean } => {
            if clean {
                fetch::clean(&settings)?;
            }
            let geographies = selection.resolve()?;
            println!("Downloading {} reports...", geographies.len());
            let (_, stats) = fetch::download_all(&settings, geographies).await?;
            print_summary(&[stats]);
            Ok(())
        }
        Commands::Process { selection } => {
            let (present, missing) = fetch::partition_downloaded(&settings, selection.resolve()?);
            for geo in &missing {
                tracing::warn!("No downloaded report for {}", geo);
            }
            let acquired = StageStats {
                stage: "download",
                total: present.len() + missing.len(),
                ok: present.len(),
                errors: missing.len(),
            };
            if present.is_empty() {
                println!("No downloaded reports. Run 'download' first.");
                print_summary(&[acquired]);
                return Ok(());
            }
            println!("Processing {} reports...", present.len());
            let pipeline = Pipeline::with_inkscape(settings);
            let processed = pipeline.process_all(present).await?;
            print_summary(&[acquired, processed]);
            Ok(())
        }
        Commands::Digitize { svg, json } => {
            let text = std::fs::read_to_string(&svg)?;
            let page = chart::digitize_page(&text, &settings.chart)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page.charts)?);
                return Ok(());
            }
            for (i, series) in page.charts.iter().enumerate() {
                println!("--- Chart {} ({} days) ---", i + 1, series.points.len());
                for p in &series.points {
                    println!("  {}  {:>4}", p.date, p.value);
                }
            }
            Ok(())
        }
        Commands::Overview { category, limit } => {
            let store = Store::new(&settings.output_dir);
            let records = store.list_records(category)?;
            if records.is_empty() {
                println!("No stored records in {}.", settings.output_dir.display());
                return Ok(());
            }

            print!("{:>3} | {:<6} | {:<7} | {:>4} | {:<10}", "#", "Geo", "Type", "Days", "Latest");
            for ct in ChartType::ALL {
                print!(" | {:>7}", short_name(ct));
            }
            println!();
            println!("{}", "-".repeat(44 + 10 * ChartType::ALL.len()));

            for (i, r) in records.iter().take(limit).enumerate() {
                let days = r.record.series.values().map(|s| s.points.len()).max().unwrap_or(0);
                let latest = r
                    .record
                    .series
                    .values()
                    .filter_map(|s| s.latest())
                    .map(|p| p.date)
                    .max()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into());
                print!(
                    "{:>3} | {:<6} | {:<7} | {:>4} | {:<10}",
                    i + 1,
                    r.key,
                    r.record.category.as_str(),
                    days,
                    latest
                );
                for ct in ChartType::ALL {
                    let value = r
                        .record
                        .chart(ct)
                        .and_then(|s| s.latest())
                        .map(|p| format!("{:+}%", p.value))
                        .unwrap_or_else(|| "-".into());
                    print!(" | {:>7}", value);
                }
                println!();
            }

            println!(
                "\n{} of {} records | {}/<geo>/mobility.json",
                records.len().min(limit),
                records.len(),
                settings.output_dir.display()
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Settings file and environment, then explicit flags on top.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(vintage) = cli.vintage {
        settings.vintage = vintage;
    }
    if let Some(n) = cli.download_concurrency {
        anyhow::ensure!(n > 0, "--download-concurrency must be at least 1");
        settings.download_concurrency = n;
    }
    if let Some(n) = cli.process_concurrency {
        anyhow::ensure!(n > 0, "--process-concurrency must be at least 1");
        settings.process_concurrency = n;
    }
    Ok(settings)
}

impl Selection {
    fn resolve(&self) -> Result<Vec<Geography>> {
        if !self.geographies.is_empty() {
            return self
                .geographies
                .iter()
                .map(|code| {
                    Geography::resolve(code).ok_or_else(|| anyhow!("Unknown geography '{}'", code))
                })
                .collect();
        }

        let mut geographies = Vec::new();
        if !self.states_only {
            geographies.extend(geography::countries());
        }
        if !self.countries_only {
            geographies.extend(geography::us_states());
        }
        Ok(geographies)
    }
}

fn parse_category(s: &str) -> Result<Category, String> {
    match s.to_ascii_lowercase().as_str() {
        "country" | "countries" => Ok(Category::Country),
        "state" | "states" => Ok(Category::State),
        other => Err(format!("expected 'country' or 'state', got '{other}'")),
    }
}

fn short_name(chart_type: ChartType) -> &'static str {
    match chart_type {
        ChartType::RetailAndRecreation => "Retail",
        ChartType::GroceryAndPharmacy => "Grocery",
        ChartType::Parks => "Parks",
        ChartType::TransitStations => "Transit",
        ChartType::Workplaces => "Work",
        ChartType::Residential => "Home",
    }
}

fn print_summary(stats: &[StageStats]) {
    println!();
    for s in stats {
        println!("{}", s);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
