use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Turns one page of a report into an SVG document.
pub trait PageRenderer: Send + Sync {
    /// Render `page` (1-based) of `document` to `out` and return the SVG text.
    fn render_page(&self, document: &Path, page: u32, out: &Path) -> Result<String>;
}

/// Renders pages with the Inkscape command line.
pub struct Inkscape {
    program: PathBuf,
}

impl Inkscape {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Inkscape {
            program: program.into(),
        }
    }

    fn command(&self, document: &Path, page: u32, out: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--pdf-poppler")
            .arg("--export-type=svg")
            .arg("--export-plain-svg")
            .arg("--export-area-page")
            .arg("--vacuum-defs")
            .arg(format!("--pdf-page={page}"))
            .arg(format!("--export-filename={}", out.display()))
            .arg(document);
        cmd
    }
}

impl PageRenderer for Inkscape {
    fn render_page(&self, document: &Path, page: u32, out: &Path) -> Result<String> {
        if let Some(dir) = out.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        // A renderer can exit 0 without writing; never read a page left by an earlier run.
        match std::fs::remove_file(out) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to clear {}", out.display())),
        }

        debug!("Rendering page {} of {}", page, document.display());
        let output = self
            .command(document, page, out)
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {} on page {} of {}: {}",
                self.program.display(),
                output.status,
                page,
                document.display(),
                stderr.trim()
            );
        }

        std::fs::read_to_string(out).with_context(|| format!("Renderer wrote no page at {}", out.display()))
    }
}
