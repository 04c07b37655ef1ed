//! gesture_trainer: interactive entry point.

use std::path::PathBuf;

use clap::Parser;
use gesture_trainer::app::{run, run_headless};
use gesture_trainer::config::AppConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gesture_trainer", about = "Capture, train and classify BUY / SELL hand gestures")]
struct Args {
    /// TOML config file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Samples captured per gesture.
    #[arg(long)]
    capture_count: Option<usize>,

    /// Pause before each capture phase, in milliseconds.
    #[arg(long)]
    capture_delay_ms: Option<u64>,

    #[arg(long)]
    epochs: Option<usize>,

    /// Seed for the simulated camera.
    #[arg(long)]
    seed: Option<u64>,

    /// Run without a window, posing the hand automatically.
    #[arg(long)]
    headless: bool,

    /// Classifications to make before a headless run exits.
    #[arg(long, default_value_t = 10)]
    classifications: usize,
}

impl Args {
    fn app_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None       => AppConfig::default(),
        };
        if let Some(n) = self.capture_count    { cfg.machine.capture_count = n; }
        if let Some(ms) = self.capture_delay_ms { cfg.machine.capture_delay_ms = ms; }
        if let Some(e) = self.epochs           { cfg.model.epochs = e; }
        if let Some(s) = self.seed             { cfg.source.seed = Some(s); }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// `RUST_LOG` directives when set and valid, otherwise `info`.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    let args = Args::parse();
    let cfg = args.app_config()?;
    info!(
        capture_count = cfg.machine.capture_count,
        capture_delay_ms = cfg.machine.capture_delay_ms,
        epochs = cfg.model.epochs,
        headless = args.headless,
        "starting gesture trainer"
    );

    if args.headless {
        let results = run_headless(cfg, args.classifications).await?;
        for (i, c) in results.iter().enumerate() {
            println!("{:>3}  shown {:<10} {}", i + 1, format!("{:?}", c.shown), c.label);
        }
    } else {
        run(cfg).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn rust_log_level_is_kept() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("trace")).max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn cli_zero_capture_count_is_rejected() {
        let args = Args::parse_from(["gesture_trainer", "--capture-count", "0"]);
        assert!(args.app_config().is_err());

        let args = Args::parse_from(["gesture_trainer", "--capture-count", "3", "--epochs", "2"]);
        let cfg = args.app_config().unwrap();
        assert_eq!(cfg.machine.capture_count, 3);
        assert_eq!(cfg.model.epochs, 2);
    }
}
