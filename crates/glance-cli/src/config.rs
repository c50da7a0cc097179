use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// CLI configuration: built-in defaults, then an optional TOML file, then
/// `GLANCE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// SCRFD detector file name, relative to `model_dir`.
    pub detector_model: String,
    /// Beauty regressor file name, relative to `model_dir`.
    pub beauty_model: String,
    /// Minimum median public score for an accept.
    pub score_threshold: f32,
    /// Whether to write annotated copies of scored photos.
    pub annotate: bool,
    /// Root directory for annotated copies.
    pub output_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Label identifying the recurring job in the crontab.
    pub job_label: String,
    /// Command the recurring job runs.
    pub job_command: String,
    pub cadence_normal: String,
    pub cadence_rate_limited: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            model_dir: data_dir.join("models"),
            detector_model: "det_10g.onnx".to_string(),
            beauty_model: "beauty_ldl_resnet50.onnx".to_string(),
            score_threshold: 5.0,
            annotate: false,
            output_dir: data_dir.join("results"),
            fetch_timeout_secs: 10,
            intra_threads: 2,
            job_label: "glance profile scout".to_string(),
            job_command: format!("bash {}", data_dir.join("crontab_script.sh").display()),
            cadence_normal: glance_cron::policy::NORMAL_CADENCE.to_string(),
            cadence_rate_limited: glance_cron::policy::RATE_LIMITED_CADENCE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` (or `GLANCE_CONFIG`) must exist; the default location
    /// is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("GLANCE_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(p) => Self::from_file(&p)?,
            None => {
                let p = default_config_path();
                if p.exists() {
                    Self::from_file(&p)?
                } else {
                    tracing::debug!(path = %p.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Apply `GLANCE_*` overrides looked up through `var`. Unparsable values
    /// keep the current setting.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("GLANCE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = var("GLANCE_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("GLANCE_DETECTOR_MODEL") {
            self.detector_model = v;
        }
        if let Some(v) = var("GLANCE_BEAUTY_MODEL") {
            self.beauty_model = v;
        }
        if let Some(v) = var("GLANCE_ANNOTATE") {
            self.annotate = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(v) = var("GLANCE_JOB_LABEL") {
            self.job_label = v;
        }
        if let Some(v) = var("GLANCE_JOB_COMMAND") {
            self.job_command = v;
        }
        if let Some(v) = var("GLANCE_CADENCE_NORMAL") {
            self.cadence_normal = v;
        }
        if let Some(v) = var("GLANCE_CADENCE_RATE_LIMITED") {
            self.cadence_rate_limited = v;
        }
        self.score_threshold = parsed(&var, "GLANCE_SCORE_THRESHOLD", self.score_threshold);
        self.fetch_timeout_secs = parsed(&var, "GLANCE_FETCH_TIMEOUT_SECS", self.fetch_timeout_secs);
        self.intra_threads = parsed(&var, "GLANCE_INTRA_THREADS", self.intra_threads);
    }

    /// Cadences are checked when a job is scheduled, not here.
    pub fn validate(&self) -> Result<()> {
        if !self.score_threshold.is_finite() {
            bail!("score_threshold must be a finite number, got {}", self.score_threshold);
        }
        if self.intra_threads == 0 {
            bail!("intra_threads must be at least 1");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be at least 1");
        }
        if let Err(reason) = glance_cron::job_table::check_entry(&self.job_label, &self.job_command) {
            bail!("job_label {:?} / job_command {:?}: {reason}", self.job_label, self.job_command);
        }
        Ok(())
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector_model)
    }

    /// Path to the beauty regression model.
    pub fn beauty_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.beauty_model)
    }

    pub fn cadences(&self) -> glance_cron::Cadences {
        glance_cron::Cadences {
            normal: self.cadence_normal.clone(),
            rate_limited: self.cadence_rate_limited.clone(),
        }
    }
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match var(key) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "ignoring unparsable override");
            default
        }),
        None => default,
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
        .join("glance")
}

fn default_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("glance")
        .join("config.toml")
}
