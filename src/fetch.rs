use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::FetchError;
use crate::geography::Geography;
use crate::pipeline::StageStats;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Download every geography's report with at most `download_concurrency` in flight.
///
/// A failed download is logged and leaves that geography out of the returned
/// list; it never stops the others.
pub async fn download_all(
    settings: &Settings,
    geographies: Vec<Geography>,
) -> Result<(Vec<Geography>, StageStats)> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let client = Arc::new(client);
    let semaphore = Arc::new(Semaphore::new(settings.download_concurrency));
    let vintage_dir = settings.vintage_dir();
    let total = geographies.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} downloads ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut tasks = JoinSet::new();
    for geo in geographies {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let client = Arc::clone(&client);
        let url = geo.fetch_url(&settings.base_url, settings.vintage);
        let dest = geo.document_path(&vintage_dir);

        tasks.spawn(async move {
            let _permit = permit;
            let outcome = download_one(&client, &geo.code, &url, &dest).await;
            (geo, outcome)
        });
    }

    let mut succeeded = Vec::with_capacity(total);
    let mut stats = StageStats::new("download", total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((geo, Ok(bytes))) => {
                debug!("Downloaded {} ({} bytes)", geo, bytes);
                stats.ok += 1;
                succeeded.push(geo);
            }
            Ok((_, Err(e))) => {
                warn!("Failed to download {}: {}", e.code(), e);
                stats.errors += 1;
            }
            Err(e) => {
                warn!("Download task aborted: {}", e);
                stats.errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Downloaded {} reports ({} ok, {} errors)",
        stats.total, stats.ok, stats.errors
    );
    succeeded.sort();
    Ok((succeeded, stats))
}

async fn download_one(
    client: &reqwest::Client,
    code: &str,
    url: &str,
    dest: &Path,
) -> Result<u64, FetchError> {
    debug!("Downloading {}", url);
    let request_err = |source: reqwest::Error| FetchError::Request {
        code: code.to_string(),
        source,
    };
    let io_err = |source: std::io::Error| FetchError::Io {
        code: code.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(request_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            code: code.to_string(),
            status,
        });
    }
    let body = response.bytes().await.map_err(request_err)?;

    if let Some(dir) = dest.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }
    // Write beside the target first so an interrupted run never leaves a truncated report.
    let partial = dest.with_extension("pdf.part");
    tokio::fs::write(&partial, &body).await.map_err(io_err)?;
    tokio::fs::rename(&partial, dest).await.map_err(io_err)?;
    Ok(body.len() as u64)
}

/// Split geographies by whether their report is already on disk.
pub fn partition_downloaded(
    settings: &Settings,
    geographies: Vec<Geography>,
) -> (Vec<Geography>, Vec<Geography>) {
    let vintage_dir = settings.vintage_dir();
    geographies
        .into_iter()
        .partition(|geo| geo.document_path(&vintage_dir).is_file())
}

/// Remove every downloaded report of the configured vintage.
pub fn clean(settings: &Settings) -> Result<()> {
    let dir = settings.vintage_dir();
    if dir.exists() {
        info!("Clearing folder {}", dir.display());
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to clear {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_fails_each_geography_without_aborting() {
        let root = std::env::temp_dir().join(format!("mobility-fetch-{}", std::process::id()));
        let mut settings = Settings::for_tests(&root);
        settings.base_url = "http://127.0.0.1:9".to_string();
        settings.download_concurrency = 2;

        let geos = vec![
            Geography::country("FR"),
            Geography::country("DE"),
            Geography::resolve("US-NY").unwrap(),
        ];
        let (ok, stats) = download_all(&settings, geos).await.unwrap();
        assert!(ok.is_empty());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.errors, 3);
        assert_eq!(stats.ok, 0);
        std::fs::remove_dir_all(&root).ok();
    }

    /// Serves a report for France and 404 for everything else.
    async fn serve_reports() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&request);
                    let response = if head.contains("_FR_Mobility_Report_en.pdf") {
                        "HTTP/1.1 200 OK\r\nContent-Length: 8\r\nConnection: close\r\n\r\n%PDF-1.4"
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    };
                    socket.write_all(response.as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn only_successful_downloads_are_passed_on() {
        let root = std::env::temp_dir().join(format!("mobility-fetch-mixed-{}", std::process::id()));
        std::fs::remove_dir_all(&root).ok();
        let mut settings = Settings::for_tests(&root);
        settings.base_url = serve_reports().await;

        let fr = Geography::country("FR");
        let de = Geography::country("DE");
        let (ok, stats) = download_all(&settings, vec![de.clone(), fr.clone()])
            .await
            .unwrap();
        assert_eq!(ok, vec![fr.clone()]);
        assert_eq!((stats.total, stats.ok, stats.errors), (2, 1, 1));

        let path = fr.document_path(&settings.vintage_dir());
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        assert!(!path.with_extension("pdf.part").exists());
        assert!(!de.document_path(&settings.vintage_dir()).exists());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn not_found_is_a_status_error() {
        let base = serve_reports().await;
        let client = reqwest::Client::new();
        let dest = std::env::temp_dir()
            .join(format!("mobility-fetch-404-{}", std::process::id()))
            .join("mobility.pdf");
        let err = download_one(&client, "DE", &format!("{base}/DE.pdf"), &dest)
            .await
            .unwrap_err();
        match err {
            FetchError::Status { code, status } => {
                assert_eq!(code, "DE");
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
            }
            other => panic!("expected a status error, got {other}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn partitions_by_presence_on_disk() {
        let root = std::env::temp_dir().join(format!("mobility-present-{}", std::process::id()));
        let settings = Settings::for_tests(&root);
        let fr = Geography::country("FR");
        let path = fr.document_path(&settings.vintage_dir());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let (present, missing) =
            partition_downloaded(&settings, vec![fr.clone(), Geography::country("DE")]);
        assert_eq!(present, vec![fr]);
        assert_eq!(missing, vec![Geography::country("DE")]);

        clean(&settings).unwrap();
        assert!(!settings.vintage_dir().exists());
        std::fs::remove_dir_all(&root).ok();
    }
}
