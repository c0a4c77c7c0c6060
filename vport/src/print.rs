//! Print collaborator boundary.
//!
//! The protocol core only dispatches print traffic; everything that
//! touches an OS spooler lives behind [`PrintHandler`]. [`FileSpooler`]
//! is the built-in implementation: one `<id>.prn` file per job.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};
use vport_proto::{PrintJob, PrintJobData};

use crate::lock;

/// External print-spooler collaborator the dispatch table forwards to.
pub trait PrintHandler: Send + Sync {
    /// The agent opened a print job.
    fn job_started(&self, job: &PrintJob);

    /// A chunk of job data arrived; an empty chunk ends the job.
    fn job_data(&self, chunk: &PrintJobData);
}

/// Discards all print traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPrinter;

impl PrintHandler for NullPrinter {
    fn job_started(&self, _job: &PrintJob) {}
    fn job_data(&self, _chunk: &PrintJobData) {}
}

/// Spools each job's raw data to `<id>.prn` in a directory.
#[derive(Debug)]
pub struct FileSpooler {
    dir: PathBuf,
    open_jobs: Mutex<HashMap<u32, File>>,
}

impl FileSpooler {
    /// Opens a spooler over `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            open_jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Spool file path for a job id.
    pub fn job_path(&self, id: u32) -> PathBuf {
        self.dir.join(format!("{id}.prn"))
    }
}

impl PrintHandler for FileSpooler {
    fn job_started(&self, job: &PrintJob) {
        info!(
            "print job {} started ({} option bytes)",
            job.id,
            job.options.len()
        );
        match File::create(self.job_path(job.id)) {
            Ok(file) => {
                // A job id reused before its empty end chunk replaces
                // the stale entry and its half-written file.
                lock(&self.open_jobs).insert(job.id, file);
            }
            Err(e) => warn!("cannot create spool file for job {}: {e}", job.id),
        }
    }

    fn job_data(&self, chunk: &PrintJobData) {
        let mut jobs = lock(&self.open_jobs);
        if chunk.data.is_empty() {
            if jobs.remove(&chunk.id).is_some() {
                info!("print job {} finished", chunk.id);
            } else {
                warn!("end of unknown print job {}", chunk.id);
            }
            return;
        }
        match jobs.get_mut(&chunk.id) {
            Some(file) => {
                if let Err(e) = file.write_all(&chunk.data) {
                    warn!("cannot spool data for job {}: {e}", chunk.id);
                    jobs.remove(&chunk.id);
                }
            }
            None => warn!("data for unknown print job {}", chunk.id),
        }
    }
}
