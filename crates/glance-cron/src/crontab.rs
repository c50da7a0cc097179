//! User crontab backend.
//!
//! Jobs are lines of the form `[#]<cadence> <command> # <label>`; a leading `#`
//! marks a disabled job. Lines read from the table, jobs included, are written
//! back verbatim; only added jobs are rendered.

use crate::cadence::CronExpr;
use crate::job_table::{CronJob, JobTable, JobTableError};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    /// `raw` is the original text; `None` for jobs added in this session.
    Job { job: CronJob, raw: Option<String> },
    Other(String),
}

/// Parsed contents of a crontab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrontabFile {
    lines: Vec<Line>,
}

impl CrontabFile {
    pub fn parse(text: &str) -> Self {
        let lines = text
            .lines()
            .map(|l| match parse_job(l) {
                Some(job) => Line::Job { job, raw: Some(l.to_string()) },
                None => Line::Other(l.to_string()),
            })
            .collect();
        Self { lines }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Job { raw: Some(raw), .. } => out.push_str(raw),
                Line::Job { job, raw: None } => out.push_str(&render_job(job)),
                Line::Other(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        out
    }

    pub fn jobs(&self) -> impl Iterator<Item = &CronJob> {
        self.lines.iter().filter_map(|l| match l {
            Line::Job { job, .. } => Some(job),
            Line::Other(_) => None,
        })
    }

    pub fn find(&self, label: &str) -> Option<&CronJob> {
        self.jobs().find(|j| j.label == label)
    }

    pub fn remove(&mut self, label: &str) -> usize {
        let before = self.lines.len();
        self.lines
            .retain(|l| !matches!(l, Line::Job { job, .. } if job.label == label));
        before - self.lines.len()
    }

    pub fn push(&mut self, job: CronJob) {
        self.lines.push(Line::Job { job, raw: None });
    }
}

/// Split the first `n` whitespace-separated fields off `s`, returning them and
/// the untouched remainder.
fn split_fields(s: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = s.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Some((fields, rest))
}

fn parse_job(line: &str) -> Option<CronJob> {
    let trimmed = line.trim();
    let (enabled, body) = match trimmed.strip_prefix('#') {
        Some(rest) => (false, rest.trim_start()),
        None => (true, trimmed),
    };
    if body.is_empty() {
        return None;
    }

    let (cadence, rest) = if body.starts_with('@') {
        let (fields, rest) = split_fields(body, 1)?;
        (fields[0].to_string(), rest)
    } else {
        let (fields, rest) = split_fields(body, 5)?;
        (fields.join(" "), rest)
    };
    // Comments that merely look like jobs (e.g. the "m h dom mon dow" header)
    // fail validation here.
    CronExpr::parse(&cadence).ok()?;

    let (command, label) = match rest.rsplit_once(" # ") {
        Some((command, label)) => (command.trim_end(), label.trim()),
        None => (rest.trim_end(), ""),
    };
    if command.is_empty() {
        return None;
    }

    Some(CronJob {
        label: label.to_string(),
        command: command.to_string(),
        cadence,
        enabled,
    })
}

fn render_job(job: &CronJob) -> String {
    let prefix = if job.enabled { "" } else { "# " };
    if job.label.is_empty() {
        format!("{prefix}{} {}", job.cadence, job.command)
    } else {
        format!("{prefix}{} {} # {}", job.cadence, job.command, job.label)
    }
}

/// The invoking user's crontab, read with `crontab -l` and replaced with `crontab -`.
pub struct UserCrontab {
    program: PathBuf,
}

impl UserCrontab {
    pub fn new() -> Self {
        Self::with_program("crontab")
    }

    /// Use a different `crontab` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn read(&self) -> Result<CrontabFile, JobTableError> {
        let output = Command::new(&self.program)
            .arg("-l")
            .stdin(Stdio::null())
            .output()?;
        if output.status.success() {
            return Ok(CrontabFile::parse(&String::from_utf8_lossy(&output.stdout)));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no crontab") {
            tracing::debug!("user has no crontab yet");
            return Ok(CrontabFile::default());
        }
        Err(self.command_error(output.status, &stderr))
    }

    pub fn write(&self, file: &CrontabFile) -> Result<(), JobTableError> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(file.render().as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(self.command_error(output.status, &String::from_utf8_lossy(&output.stderr)));
        }
        Ok(())
    }

    fn command_error(&self, status: std::process::ExitStatus, stderr: &str) -> JobTableError {
        JobTableError::Command {
            program: self.program.display().to_string(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }
}

impl Default for UserCrontab {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable for UserCrontab {
    fn find(&self, label: &str) -> Result<Option<CronJob>, JobTableError> {
        Ok(self.read()?.find(label).cloned())
    }

    fn remove(&mut self, label: &str) -> Result<usize, JobTableError> {
        let mut file = self.read()?;
        let removed = file.remove(label);
        if removed > 0 {
            self.write(&file)?;
        }
        Ok(removed)
    }

    fn add(&mut self, job: CronJob) -> Result<(), JobTableError> {
        let mut file = self.read()?;
        file.push(job);
        self.write(&file)
    }
}
