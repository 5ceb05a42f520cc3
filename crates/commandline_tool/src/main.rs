use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use commandline_tool::{
    Commands, build_processor, parse_args, run_analyze, run_describe, run_generate, run_job, run_upload_url,
};
use log::{debug, info};
use main_processor::pkg_config::load_config;
use rand::SeedableRng;
use rand::{Rng, rngs::StdRng};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter as SubLevel;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Moves the previous run's latest.log aside as `yyMMddHH` plus two random digits.
fn archive_latest_log(log_dir: &Path) {
    let latest_path = log_dir.join("latest.log");
    let Ok(modified) = fs::metadata(&latest_path).and_then(|m| m.modified()) else {
        return;
    };

    let datetime: chrono::DateTime<Local> = modified.into();
    let mut rng = StdRng::from_entropy();
    let rnd: u8 = rng.gen_range(0..100);
    let code = format!(
        "{:02}{:02}{:02}{:02}{:02}",
        datetime.year() % 100,
        datetime.month(),
        datetime.day(),
        datetime.hour(),
        rnd
    );

    let mut final_path = log_dir.join(format!("{}.log", code));
    let mut idx = 1;
    while final_path.exists() {
        final_path = log_dir.join(format!("{}-{}.log", code, idx));
        idx += 1;
    }
    if let Err(e) = fs::rename(&latest_path, &final_path) {
        eprintln!("Failed to archive previous log: {}", e);
    }
}

fn init_logging(debug: bool) -> Option<WorkerGuard> {
    let _ = LogTracer::init();

    let log_dir = Path::new("log");
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }
    archive_latest_log(log_dir);

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let file_appender = rolling::never(log_dir, "latest.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    // terminal: WARN unless --debug; file: INFO unless --debug
    let stdout_filter = if debug { SubLevel::DEBUG } else { SubLevel::WARN };
    let file_filter = if debug { SubLevel::DEBUG } else { SubLevel::INFO };

    let subscriber = tracing_subscriber::registry()
        .with(stdout_layer.with_filter(stdout_filter))
        .with(file_layer.with_filter(file_filter));
    match subscriber.try_init() {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();
    let _guard = init_logging(cli.debug);

    let cfg = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!("Configuration: {:?}", cfg.llm.bedrock);

    match cli.command {
        Commands::Generate {
            image,
            language,
            upload,
        } => {
            info!("Generating {} stacks from {}", language, image);
            let processor = build_processor(cfg).await?;
            run_generate(&processor, &image, language, upload, cli.quiet).await
        }

        Commands::Job { event } => {
            info!("Running job from {}", event.display());
            let processor = build_processor(cfg).await?;
            run_job(&processor, &event, cli.quiet).await
        }

        Commands::Analyze { image, action } => run_analyze(&cfg, &image, action).await,

        Commands::Describe { image, prompt } => run_describe(&cfg, &image, prompt).await,

        Commands::UploadUrl { key, content_type } => run_upload_url(&cfg, &key, &content_type).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_latest_log_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("latest.log"), "old run").unwrap();

        archive_latest_log(dir.path());

        assert!(!dir.path().join("latest.log").exists());
        let archived: Vec<_> = fs::read_dir(dir.path()).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(fs::read_to_string(archived[0].path()).unwrap(), "old run");
    }

    #[test]
    fn missing_latest_log_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        archive_latest_log(dir.path());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
