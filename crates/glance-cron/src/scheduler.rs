//! Remove-then-add maintenance of the single recurring job.

use crate::cadence::{CadenceError, CronExpr};
use crate::job_table::{check_entry, CronJob, JobTable, JobTableError};
use crate::policy::{Cadences, SchedulePolicy};
use chrono::{Local, NaiveDateTime};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid {policy} cadence {cadence:?}: {source}; no successor run was scheduled")]
    InvalidCadence {
        policy: SchedulePolicy,
        cadence: String,
        #[source]
        source: CadenceError,
    },
    #[error("invalid job entry (label {label:?}): {reason}; no successor run was scheduled")]
    InvalidEntry { label: String, reason: &'static str },
    #[error("job table: {0}")]
    JobTable(#[from] JobTableError),
}

/// The job that was (or would be) installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub policy: SchedulePolicy,
    pub job: CronJob,
    /// Next trigger after the scheduling moment, if any within a year.
    pub next_run: Option<NaiveDateTime>,
}

/// Keeps at most one job carrying `label` in the table.
pub struct Rescheduler<T> {
    table: T,
    label: String,
    command: String,
    cadences: Cadences,
}

impl<T: JobTable> Rescheduler<T> {
    pub fn new(table: T, label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            table,
            label: label.into(),
            command: command.into(),
            cadences: Cadences::default(),
        }
    }

    pub fn with_cadences(mut self, cadences: Cadences) -> Self {
        self.cadences = cadences;
        self
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn check_entry(&self) -> Result<(), ScheduleError> {
        check_entry(&self.label, &self.command).map_err(|reason| ScheduleError::InvalidEntry {
            label: self.label.clone(),
            reason,
        })
    }

    /// Remove any job carrying the label. Finding none is not an error.
    pub fn reconcile(&mut self) -> Result<usize, ScheduleError> {
        self.check_entry()?;
        let removed = self.table.remove(&self.label)?;
        if removed > 0 {
            tracing::info!(label = %self.label, removed, "previous job entry removed");
        } else {
            tracing::info!(label = %self.label, "no previous job entry found");
        }
        Ok(removed)
    }

    /// Build and validate the job for `policy` without touching the table.
    pub fn plan(&self, policy: SchedulePolicy, now: NaiveDateTime) -> Result<ScheduledJob, ScheduleError> {
        self.check_entry()?;
        let cadence = self.cadences.for_policy(policy);
        let expr = CronExpr::parse(cadence).map_err(|source| ScheduleError::InvalidCadence {
            policy,
            cadence: cadence.to_string(),
            source,
        })?;

        Ok(ScheduledJob {
            policy,
            job: CronJob {
                label: self.label.clone(),
                command: self.command.clone(),
                cadence: expr.as_str().to_string(),
                enabled: true,
            },
            next_run: expr.next_after(now),
        })
    }

    /// Install one enabled job for `policy`. An invalid cadence or entry installs nothing.
    pub fn schedule(&mut self, policy: SchedulePolicy) -> Result<ScheduledJob, ScheduleError> {
        self.schedule_at(policy, Local::now().naive_local())
    }

    /// [`schedule`](Self::schedule) with `next_run` computed from `now`.
    pub fn schedule_at(&mut self, policy: SchedulePolicy, now: NaiveDateTime) -> Result<ScheduledJob, ScheduleError> {
        let scheduled = match self.plan(policy, now) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "invalid job entry, the next run will not start automatically");
                return Err(e);
            }
        };
        self.table.add(scheduled.job.clone())?;
        tracing::info!(
            label = %self.label,
            %policy,
            cadence = %scheduled.job.cadence,
            wait_mins = policy.wait().as_secs() / 60,
            next_run = ?scheduled.next_run,
            "job entry added"
        );
        Ok(scheduled)
    }

    /// Replace the job according to whether the rate limit was hit this run.
    pub fn reschedule(&mut self, rate_limited: bool) -> Result<ScheduledJob, ScheduleError> {
        self.reschedule_at(rate_limited, Local::now().naive_local())
    }

    pub fn reschedule_at(&mut self, rate_limited: bool, now: NaiveDateTime) -> Result<ScheduledJob, ScheduleError> {
        let policy = SchedulePolicy::from_rate_limited(rate_limited);
        self.reconcile()?;
        self.schedule_at(policy, now)
    }
}
