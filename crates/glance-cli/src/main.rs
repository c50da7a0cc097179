mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use glance_core::fetch::upgrade_thumbnail_url;
use glance_core::scorer::remap;
use glance_core::{
    EvaluatorConfig, FileFetcher, HttpFetcher, OnnxBeautyModel, PhotoFetcher, Profile, ProfileEvaluator,
    ScrfdLocator, Threshold,
};
use glance_cron::{Rescheduler, SchedulePolicy, UserCrontab};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "glance", about = "Profile photo scoring and adaptive rescheduling")]
struct Cli {
    /// TOML config file (default: $XDG_CONFIG_HOME/glance/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a profile's photos and print the decision as JSON
    Evaluate {
        /// Display name of the profile
        #[arg(short, long)]
        name: String,
        /// Age, if known
        #[arg(short, long)]
        age: Option<u32>,
        /// Treat photos as local file paths instead of URLs
        #[arg(long)]
        local: bool,
        /// Override the configured score threshold
        #[arg(long)]
        threshold: Option<f32>,
        /// Write annotated copies under the output directory
        #[arg(long)]
        annotate: bool,
        /// Photo URLs (or paths with --local), in profile order
        photos: Vec<String>,
    },
    /// Replace the recurring job according to this run's rate-limit state
    Reschedule {
        /// The rate limit was hit during this run
        #[arg(long)]
        rate_limited: bool,
        /// Print the job that would be installed without touching the crontab
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove the recurring job
    Unschedule,
    /// Map a raw model score onto the public scale
    Remap {
        /// Raw score in [1, 5]
        raw: f32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Remap { raw } => {
            println!("{:.2}", remap(raw));
        }
        Commands::Evaluate {
            name,
            age,
            local,
            threshold,
            annotate,
            photos,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(t) = threshold {
                config.score_threshold = t;
            }
            config.annotate |= annotate;
            config.validate()?;
            evaluate(&config, name, age, local, photos)?;
        }
        Commands::Reschedule { rate_limited, dry_run } => {
            let config = Config::load(cli.config.as_deref())?;
            reschedule(&config, rate_limited, dry_run)?;
        }
        Commands::Unschedule => {
            let config = Config::load(cli.config.as_deref())?;
            let mut scheduler = Rescheduler::new(UserCrontab::new(), &config.job_label, &config.job_command);
            let removed = scheduler.reconcile().context("removing the recurring job")?;
            println!("removed {removed} job(s) labelled {:?}", config.job_label);
        }
    }

    Ok(())
}

fn evaluate(config: &Config, name: String, age: Option<u32>, local: bool, photos: Vec<String>) -> Result<()> {
    let threshold = Threshold::new(config.score_threshold)?;

    let detector_path = config.detector_model_path();
    let locator = ScrfdLocator::load(&detector_path, config.intra_threads)
        .with_context(|| format!("loading face detector {}", detector_path.display()))?;
    let beauty_path = config.beauty_model_path();
    let model = OnnxBeautyModel::load(&beauty_path, config.intra_threads)
        .with_context(|| format!("loading beauty model {}", beauty_path.display()))?;

    let evaluator_config = EvaluatorConfig {
        threshold,
        annotate_dir: config.annotate.then(|| config.output_dir.clone()),
    };

    let evaluation = if local {
        let profile = Profile::new(name, age, photos);
        run(ProfileEvaluator::new(locator, model, FileFetcher::new(), evaluator_config), &profile)
    } else {
        let photos = photos.iter().map(|url| upgrade_thumbnail_url(url)).collect();
        let profile = Profile::new(name, age, photos);
        let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs))
            .context("building HTTP client")?;
        run(ProfileEvaluator::new(locator, model, fetcher, evaluator_config), &profile)
    };

    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}

fn run<F: PhotoFetcher>(
    mut evaluator: ProfileEvaluator<ScrfdLocator, OnnxBeautyModel, F>,
    profile: &Profile,
) -> glance_core::Evaluation {
    evaluator.evaluate_profile(profile)
}

fn reschedule(config: &Config, rate_limited: bool, dry_run: bool) -> Result<()> {
    let mut scheduler =
        Rescheduler::new(UserCrontab::new(), &config.job_label, &config.job_command).with_cadences(config.cadences());

    let scheduled = if dry_run {
        let now = chrono::Local::now().naive_local();
        scheduler.plan(SchedulePolicy::from_rate_limited(rate_limited), now)?
    } else {
        scheduler.reschedule(rate_limited)?
    };

    match scheduled.next_run {
        Some(next) => println!(
            "{} job {:?}: {} (next run {})",
            scheduled.policy,
            scheduled.job.label,
            scheduled.job.cadence,
            next.format("%Y-%m-%d %H:%M")
        ),
        None => println!(
            "{} job {:?}: {} (no run within a year)",
            scheduled.policy, scheduled.job.label, scheduled.job.cadence
        ),
    }
    Ok(())
}
