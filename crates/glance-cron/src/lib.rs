//! glance-cron — Adaptive rescheduling of the next automated run.
//!
//! Exactly one recurring job carries the automation's label. Each run removes
//! it and adds a fresh one whose cadence depends on whether the rate limit
//! was hit.

pub mod cadence;
pub mod crontab;
pub mod job_table;
pub mod policy;
pub mod scheduler;

pub use cadence::{CadenceError, CronExpr};
pub use crontab::UserCrontab;
pub use job_table::{CronJob, JobTable, JobTableError, MemoryJobTable};
pub use policy::{Cadences, SchedulePolicy};
pub use scheduler::{Rescheduler, ScheduleError, ScheduledJob};
