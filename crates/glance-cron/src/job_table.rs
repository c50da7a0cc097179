//! The recurring-job store the rescheduler owns one entry in.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobTableError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },
}

/// One recurring job, identified by its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    pub label: String,
    pub command: String,
    pub cadence: String,
    pub enabled: bool,
}

/// Check that a job with `label` and `command` reads back from a crontab
/// unchanged, so it can be found again by label.
pub fn check_entry(label: &str, command: &str) -> Result<(), &'static str> {
    let has_line_break = |s: &str| s.contains(['\n', '\r']);
    if label.is_empty() {
        return Err("label is empty");
    }
    if label.trim() != label {
        return Err("label has leading or trailing whitespace");
    }
    if label.contains('#') || has_line_break(label) {
        return Err("label contains '#' or a line break");
    }
    if command.trim().is_empty() {
        return Err("command is empty");
    }
    if command.trim() != command {
        return Err("command has leading or trailing whitespace");
    }
    if has_line_break(command) {
        return Err("command contains a line break");
    }
    Ok(())
}

/// A table of recurring jobs keyed by label.
pub trait JobTable {
    /// First job carrying `label`, if any.
    fn find(&self, label: &str) -> Result<Option<CronJob>, JobTableError>;
    /// Remove every job carrying `label`; returns how many were removed.
    fn remove(&mut self, label: &str) -> Result<usize, JobTableError>;
    fn add(&mut self, job: CronJob) -> Result<(), JobTableError>;
}

/// Job table held in memory, for dry runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryJobTable {
    jobs: Vec<CronJob>,
}

impl MemoryJobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<CronJob>) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &[CronJob] {
        &self.jobs
    }
}

impl JobTable for MemoryJobTable {
    fn find(&self, label: &str) -> Result<Option<CronJob>, JobTableError> {
        Ok(self.jobs.iter().find(|j| j.label == label).cloned())
    }

    fn remove(&mut self, label: &str) -> Result<usize, JobTableError> {
        let before = self.jobs.len();
        self.jobs.retain(|j| j.label != label);
        Ok(before - self.jobs.len())
    }

    fn add(&mut self, job: CronJob) -> Result<(), JobTableError> {
        self.jobs.push(job);
        Ok(())
    }
}
