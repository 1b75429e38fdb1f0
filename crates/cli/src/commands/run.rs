//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(pacing) = args.pacing {
        info!(pacing, "Overriding session pacing factor from CLI");
        blueprint.session.pacing_factor = pacing.max(0.0);
    }
    if args.no_evidence && blueprint.evidence.enabled {
        info!("Evidence capture disabled from CLI");
        blueprint.evidence.enabled = false;
    }

    for warning in config_loader::collect_warnings(&blueprint) {
        warn!("{warning}");
    }

    info!(
        site = %blueprint.site.name,
        lanes = blueprint.roi.lanes.len(),
        stop_line = blueprint.roi.stop_line.is_some(),
        speed_rule = blueprint.roi.speed_rule_configured(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        replay_path: args.replay.clone(),
        initial_signal: args.signal.clone(),
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting session...");
    let summary = pipeline
        .run(shutdown_signal())
        .await
        .context("Session failed")?;

    if summary.interrupted {
        warn!("Session interrupted by shutdown signal");
    }
    info!(
        frames = summary.frames,
        alerts = summary.total_alerts(),
        duration_secs = summary.duration.as_secs_f64(),
        "Session completed"
    );
    summary.print_summary();

    info!("Lanewatch finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed that branch never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::SiteBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Site: {}", blueprint.site.name);
    if let Some(ref source) = blueprint.site.source {
        println!("  Source: {source}");
    }
    println!("  Nominal FPS: {}", blueprint.site.nominal_fps);

    let roi = &blueprint.roi;
    println!("\nROI:");
    println!("  Lanes: {}", roi.lanes.len());
    println!("  Stop line: {}", if roi.stop_line.is_some() { "yes" } else { "no" });
    if roi.learns_directions() {
        println!(
            "  Lane directions: learned (warm-up {} frames)",
            roi.auto_lane_warmup_frames
        );
    } else {
        println!("  Lane directions: {} configured", roi.lane_directions.len());
    }
    match (roi.speed_rule_configured(), roi.speed_limit_kmh) {
        (true, Some(limit)) => println!("  Speed limit: {limit} km/h"),
        _ => println!("  Speed limit: disabled"),
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
