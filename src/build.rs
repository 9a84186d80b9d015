//! One-shot PDF builds, in the foreground or on a background thread.
//!
//! A build either writes the complete PDF or leaves nothing behind: bytes are
//! rendered in memory, written to a temporary file next to the output and
//! moved into place only on success.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use log::{error, info};
use tempfile::NamedTempFile;

use crate::assemble::{AssembleOptions, assemble};
use crate::error::{Error, Result};
use crate::extract::Journal;
use crate::render::{RenderConfig, render_pdf};
use crate::selection::Selection;

/// Everything one build needs. The request owns its data, so the caller can
/// keep changing its own state while a build runs.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub journals: Vec<Journal>,
    pub selection: Selection,
    pub options: AssembleOptions,
    pub render: RenderConfig,
    pub output: PathBuf,
}

impl BuildRequest {
    /// A request with default assembly and render settings.
    pub fn new(journals: Vec<Journal>, selection: Selection, output: impl Into<PathBuf>) -> Self {
        Self {
            journals,
            selection,
            options: AssembleOptions::default(),
            render: RenderConfig::default(),
            output: output.into(),
        }
    }

    pub fn with_options(mut self, options: AssembleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_render_config(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }
}

/// Assemble, render and write the PDF. Returns the output path.
pub fn build_pdf(request: &BuildRequest) -> Result<PathBuf> {
    let document = assemble(&request.journals, &request.selection, &request.options)?;
    let bytes = render_pdf(&document, &request.render)?;
    write_atomic(&request.output, &bytes)?;
    info!("Wrote {}", request.output.display());
    Ok(request.output.clone())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Final state of a background build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Completed(PathBuf),
    Failed(String),
}

/// Receives the outcome of one submitted build.
#[derive(Debug)]
pub struct BuildHandle {
    rx: mpsc::Receiver<BuildOutcome>,
}

impl BuildHandle {
    /// Block until the build finishes.
    pub fn wait(self) -> BuildOutcome {
        self.rx
            .recv()
            .unwrap_or_else(|_| BuildOutcome::Failed("build thread exited without a result".into()))
    }

    /// The outcome, if the build has finished.
    pub fn try_outcome(&self) -> Option<BuildOutcome> {
        self.rx.try_recv().ok()
    }
}

/// Runs at most one build at a time on a worker thread.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the worker finishes, even on panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start a build. Fails with [`Error::BuildInProgress`] while another
    /// build from this builder is running.
    pub fn submit(&self, request: BuildRequest) -> Result<BuildHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::BuildInProgress);
        }

        let guard = BusyGuard(Arc::clone(&self.busy));
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("journal-pdf-build".into())
            .spawn(move || {
                let outcome = match build_pdf(&request) {
                    Ok(path) => BuildOutcome::Completed(path),
                    Err(e) => {
                        error!("Build of {} failed: {e}", request.output.display());
                        BuildOutcome::Failed(e.to_string())
                    }
                };
                // Flag cleared before the outcome is visible.
                drop(guard);
                let _ = tx.send(outcome);
            });

        match spawned {
            Ok(_) => Ok(BuildHandle { rx }),
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                Err(Error::Io(e))
            }
        }
    }
}
