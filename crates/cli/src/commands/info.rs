//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{LineSegment, SiteBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    site: SiteInfo,
    roi: RoiInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<EngineInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SiteInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    nominal_fps: f64,
}

#[derive(Serialize)]
struct RoiInfo {
    lanes: usize,
    stop_line: Option<LineSegment>,
    classes: Vec<String>,
    direction_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed_limit_kmh: Option<f64>,
    speed_rule: bool,
}

#[derive(Serialize)]
struct EngineInfo {
    cooldown_s: f64,
    highlight_s: f64,
    line_tolerance_px: f64,
    wrong_way_frames: u32,
    wrong_way_min_speed_pxps: f64,
    learning_min_samples: usize,
    learning_interval_frames: u64,
    helmet_every: u64,
    plate_every: u64,
    track_idle_timeout_s: f64,
    alert_log_capacity: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn direction_mode(blueprint: &SiteBlueprint) -> String {
    let roi = &blueprint.roi;
    if roi.learns_directions() {
        format!("learned (warm-up {} frames)", roi.auto_lane_warmup_frames)
    } else if !roi.lane_directions.is_empty() {
        format!("fixed ({} configured)", roi.lane_directions.len())
    } else {
        "none".to_string()
    }
}

fn build_config_info(blueprint: &SiteBlueprint, args: &InfoArgs) -> ConfigInfo {
    let roi = &blueprint.roi;
    let engine = &blueprint.engine;

    let engine_info = args.engine.then(|| EngineInfo {
        cooldown_s: engine.cooldown_s,
        highlight_s: engine.highlight_s,
        line_tolerance_px: engine.line_tolerance_px,
        wrong_way_frames: engine.wrong_way.threshold_frames,
        wrong_way_min_speed_pxps: engine.wrong_way.min_speed_pxps,
        learning_min_samples: engine.learning.min_samples,
        learning_interval_frames: engine.learning.update_interval_frames,
        helmet_every: engine.classifiers.helmet_every,
        plate_every: engine.classifiers.plate_every,
        track_idle_timeout_s: engine.track_idle_timeout_s,
        alert_log_capacity: engine.alert_log_capacity,
    });

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        site: SiteInfo {
            name: blueprint.site.name.clone(),
            source: blueprint.site.source.clone(),
            nominal_fps: blueprint.site.nominal_fps,
        },
        roi: RoiInfo {
            lanes: roi.lanes.len(),
            stop_line: roi.stop_line,
            classes: roi.classes.clone(),
            direction_mode: direction_mode(blueprint),
            speed_limit_kmh: roi.speed_limit_kmh,
            speed_rule: roi.speed_rule_configured(),
        },
        engine: engine_info,
        sinks,
    }
}

fn print_config_info(blueprint: &SiteBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Lanewatch Site Configuration                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 Site");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", blueprint.site.name);
    println!("   ├─ Nominal FPS: {}", blueprint.site.nominal_fps);
    match &blueprint.site.source {
        Some(source) => println!("   └─ Source: {source}"),
        None => println!("   └─ Source: (from --replay)"),
    }

    let roi = &blueprint.roi;
    println!("\n🛣  ROI");
    println!("   ├─ Lanes: {}", roi.lanes.len());
    for (i, lane) in roi.lanes.iter().enumerate() {
        println!("   │  ├─ lane {i}: {} vertices", lane.len());
    }
    match &roi.stop_line {
        Some(line) => println!(
            "   ├─ Stop line: ({:.2}, {:.2}) → ({:.2}, {:.2})",
            line.a.x, line.a.y, line.b.x, line.b.y
        ),
        None => println!("   ├─ Stop line: none (signal rule disabled)"),
    }
    println!("   ├─ Directions: {}", direction_mode(blueprint));
    println!("   ├─ Classes: {}", roi.classes.join(", "));
    match (roi.speed_rule_configured(), roi.speed_limit_kmh) {
        (true, Some(limit)) => println!("   └─ Speed limit: {limit} km/h"),
        _ => println!("   └─ Speed limit: disabled"),
    }

    if args.engine {
        let engine = &blueprint.engine;
        println!("\n⚙️  Rule Engine");
        println!("   ├─ Cooldown: {} s", engine.cooldown_s);
        println!("   ├─ Highlight / focus: {} s / {} s", engine.highlight_s, engine.focus_s);
        println!("   ├─ Stop line tolerance: {} px", engine.line_tolerance_px);
        println!(
            "   ├─ Wrong way: {} frames, min {} px/s",
            engine.wrong_way.threshold_frames, engine.wrong_way.min_speed_pxps
        );
        println!(
            "   ├─ Learning: {} samples, every {} frames",
            engine.learning.min_samples, engine.learning.update_interval_frames
        );
        println!(
            "   ├─ Classifier cadence: helmet every {}, plate every {}",
            engine.classifiers.helmet_every, engine.classifiers.plate_every
        );
        println!("   └─ Alert log: {} entries", engine.alert_log_capacity);
    }

    let evidence = &blueprint.evidence;
    println!("\n📸 Evidence");
    if evidence.enabled {
        println!("   └─ {} (crop q{}, frame q{})", evidence.base_dir.display(), evidence.crop_quality, evidence.frame_quality);
    } else {
        println!("   └─ disabled");
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}
