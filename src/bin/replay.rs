use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;

use saga_motion_rs::config::PipelineConfig;
use saga_motion_rs::pipeline::Pipeline;
use saga_motion_rs::recording::SessionRecording;
use saga_motion_rs::rerun_logger::RerunLogger;

#[derive(Parser, Debug)]
struct Args {
    /// Path to session_*.json[.gz] recording
    #[arg(long, conflicts_with = "session_dir")]
    log: Option<PathBuf>,

    /// Directory of recordings to batch replay (processes session_*.json[.gz])
    #[arg(long)]
    session_dir: Option<PathBuf>,

    /// JSON pipeline configuration (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a Rerun .rrd of the replay (single --log only)
    #[arg(long, requires = "log")]
    rerun: Option<PathBuf>,

    /// Print discrete events as they fire
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn run_once(path: &Path, config: &PipelineConfig, args: &Args) -> anyhow::Result<serde_json::Value> {
    let recording = SessionRecording::load(path)?;
    let mut pipeline = Pipeline::new(config.clone())?;
    let rerun = match args.rerun.as_ref() {
        Some(out) => Some(RerunLogger::new(&out.display().to_string())?),
        None => None,
    };

    let mut event_counts: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut max_speed: f32 = 0.0;
    let mut max_height: f32 = 0.0;
    let mut airborne_ticks = 0u64;
    let mut unhealthy_ticks = 0u64;
    let mut travelled = 0.0_f32;

    pipeline.start_session();

    for (frame, dt) in recording.frames.iter().zip(recording.frame_dts()) {
        let report = pipeline.tick(frame.sample.as_ref(), dt);

        for event in &report.events {
            *event_counts.entry(event.name()).or_default() += 1;
            if args.verbose && event.is_discrete() {
                println!("[{:>8.3}s] {:?}", pipeline.clock(), event);
            }
        }

        let locomotion = pipeline.locomotion_state();
        max_speed = max_speed.max(report.displacement.horizontal_speed);
        max_height = max_height.max(locomotion.height);
        travelled += report.displacement.horizontal.norm();
        if !locomotion.grounded {
            airborne_ticks += 1;
        }
        if !report.source_healthy {
            unhealthy_ticks += 1;
        }

        if let Some(rr) = rerun.as_ref() {
            rr.set_time(pipeline.clock());
            if let Some(sample) = frame.sample.as_ref() {
                rr.log_head(sample.head_y(), pipeline.height_delta(sample.head_y()));
            }
            rr.log_tick(&pipeline.get_snapshot(), &report.displacement);
            rr.log_events(&report.events);
        }
    }

    let calibration = pipeline.calibration_state();
    let clock = pipeline.clock();
    let stats = pipeline.shutdown();

    Ok(json!({
        "log": path.display().to_string(),
        "frames": recording.frames.len(),
        "missing_frames": recording.frames.iter().filter(|f| f.sample.is_none()).count(),
        "unhealthy_ticks": unhealthy_ticks,
        "simulated_secs": clock,
        "calibrated": calibration.is_calibrated,
        "base_height": calibration.base_height,
        "events": event_counts,
        "stats": stats,
        "travelled": travelled,
        "max_speed": max_speed,
        "max_height": max_height,
        "airborne_ticks": airborne_ticks
    }))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let config = match args.config.as_ref() {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let mut results = Vec::new();

    if let Some(dir) = args.session_dir.as_ref() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.starts_with("session_") && (name.ends_with(".json") || name.ends_with(".json.gz"))
            })
            .collect();
        paths.sort();
        for path in paths {
            match run_once(&path, &config, &args) {
                Ok(res) => results.push(res),
                Err(e) => eprintln!("Failed {}: {}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &config, &args)?);
    } else {
        anyhow::bail!("Provide --log or --session-dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
