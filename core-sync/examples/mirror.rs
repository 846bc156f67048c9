//! Run a configured sync from the command line
//!
//! Loads the saved configuration, runs the named sync with ffmpeg/ffprobe,
//! prints the log feed and a progress line while it runs. Ctrl-C cancels
//! the run; files already in flight are finished first.
//!
//! Run with:
//! ```bash
//! # Run the sync named "Car stick" from the default config file
//! cargo run -p core-sync --example mirror -- "Car stick"
//!
//! # Use another config file
//! cargo run -p core-sync --example mirror -- "Car stick" ./config.json
//!
//! # One-off job with a saved profile: <source> <dest> <profile name>
//! cargo run -p core-sync --example mirror -- --adhoc ~/Music /media/usb "High-Quality MP3"
//! ```

use anyhow::{anyhow, bail, Context};
use bridge_desktop::FfmpegTools;
use bridge_traits::logging::LogLevel;
use core_async::time::{interval, Duration, MissedTickBehavior};
use core_runtime::config::{AppConfig, SyncJob};
use core_runtime::events::{CoreEvent, EventBus, EventStream, SyncEvent};
use core_runtime::logging::{init_logging, LoggingConfig};
use core_sync::{SyncConfig, SyncCoordinator};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_level(LogLevel::Info)
            .with_path_redaction(false),
    )?;

    let args: Vec<String> = env::args().skip(1).collect();
    let (config, job) = resolve_job(&args).await?;

    let mut tools = FfmpegTools::new(&config.tools.ffmpeg, &config.tools.ffprobe);
    if let Some(limit) = config.tools.probe_timeout() {
        tools = tools.with_probe_timeout(limit);
    }
    tools
        .verify()
        .await
        .context("ffmpeg and ffprobe must be installed to sync")?;
    let tools = Arc::new(tools);

    let event_bus = Arc::new(EventBus::default());
    let mut events = EventStream::new(event_bus.subscribe());

    let coordinator = Arc::new(SyncCoordinator::new(
        SyncConfig::default(),
        tools.clone(),
        tools,
        Arc::clone(&event_bus),
    ));

    println!(
        "{} -> {} ({})",
        job.source_dir.display(),
        job.dest_dir.display(),
        job.profile.name
    );

    let mut run = Arc::clone(&coordinator).start_sync(job);
    let mut ticker = interval(Duration::from_millis(100));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_processed = None;

    let summary = loop {
        tokio::select! {
            joined = &mut run => break joined??,
            event = events.recv() => {
                if let Ok(CoreEvent::Sync(event)) = event {
                    print_event(&event);
                }
            }
            _ = ticker.tick() => {
                let progress = coordinator.progress().await;
                if !progress.is_idle() && last_processed != Some(progress.processed()) {
                    last_processed = Some(progress.processed());
                    eprintln!(
                        "[{:>3.0}%] {}/{} ({} failed)",
                        progress.fraction() * 100.0,
                        progress.processed(),
                        progress.total,
                        progress.failed
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                match coordinator.cancel_sync().await {
                    Ok(run_id) => eprintln!("Cancelling {}, finishing files in flight...", run_id),
                    Err(err) => eprintln!("{}", err),
                }
            }
        }
    };

    // Lifecycle events emitted just before the run returned
    while let Some(Ok(CoreEvent::Sync(event))) = events.try_recv() {
        print_event(&event);
    }

    println!(
        "{}: {} of {} files done, {} failed{} in {:.1}s",
        summary.job_name,
        summary.completed,
        summary.total,
        summary.failed,
        if summary.cancelled { " (cancelled)" } else { "" },
        summary.duration.as_secs_f64()
    );

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn resolve_job(args: &[String]) -> anyhow::Result<(AppConfig, SyncJob)> {
    match args {
        [flag, source, dest, profile] if flag == "--adhoc" => {
            let config = AppConfig::load(&AppConfig::default_path()?).await?;
            let profile = config
                .profile(profile)
                .cloned()
                .ok_or_else(|| anyhow!("no profile named {:?}", profile))?;
            let job = SyncJob::new("adhoc", source, dest, profile);
            job.validate()?;
            Ok((config, job))
        }
        [name, rest @ ..] if rest.len() <= 1 => {
            let path = match rest.first() {
                Some(path) => PathBuf::from(path),
                None => AppConfig::default_path()?,
            };
            let config = AppConfig::load(&path)
                .await
                .with_context(|| format!("loading {}", path.display()))?;
            let job = config
                .sync(name)
                .cloned()
                .ok_or_else(|| anyhow!("no sync named {:?} in {}", name, path.display()))?;
            job.validate()?;
            Ok((config, job))
        }
        _ => bail!("usage: mirror <sync name> [config path] | mirror --adhoc <source> <dest> <profile>"),
    }
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Log { event, .. } => println!("{}", event.render()),
        SyncEvent::Aborted { message, .. } => eprintln!("Sync aborted: {}", message),
        SyncEvent::Started { .. } | SyncEvent::Finished { .. } => {}
    }
}
