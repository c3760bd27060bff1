use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant};

use saga_motion_rs::config::PipelineConfig;
use saga_motion_rs::events::PipelineEvent;
use saga_motion_rs::live_status::{self, LiveStatus};
use saga_motion_rs::pipeline::Pipeline;
use saga_motion_rs::recording::SessionRecording;
use saga_motion_rs::session::StatsSnapshot;
use saga_motion_rs::source::{landmark_loop, FrameDrain, ScriptedRoutine};

#[derive(Parser, Debug)]
#[command(name = "saga_motion")]
#[command(about = "Body-motion gameplay pipeline driven by a scripted workout", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until the routine ends)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Pipeline tick rate
    #[arg(long, default_value = "30")]
    tick_hz: f32,

    /// JSON pipeline configuration (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Standing head height of the simulated player (m)
    #[arg(long, default_value = "1.70")]
    standing_height: f32,

    /// Drop every Nth landmark sample to simulate tracking loss
    #[arg(long)]
    dropout_every: Option<u32>,

    /// Output directory
    #[arg(long, default_value = "saga_sessions")]
    output_dir: String,
}

#[derive(Serialize)]
struct SessionSummary {
    started: String,
    ticks: u64,
    samples_received: u64,
    samples_missing: u64,
    samples_superseded: u64,
    samples_reused: u64,
    event_counts: BTreeMap<String, u64>,
    stats: StatsSnapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("[{}] Saga Motion Starting", ts_now());
    println!("  Duration: {} seconds (0=routine length)", args.duration);
    println!("  Tick rate: {} Hz", args.tick_hz);
    println!("  Dropout: {:?}", args.dropout_every);
    println!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;

    let config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let tick_hz = args.tick_hz.max(1.0);

    // Discrete events are printed off the tick loop
    let (event_tx, event_rx) = crossbeam::channel::bounded::<PipelineEvent>(1024);
    let printer = thread::spawn(move || {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for event in event_rx.iter() {
            *counts.entry(event.name().to_string()).or_default() += 1;
            match event {
                PipelineEvent::CalibrationComplete { base_height } => {
                    println!("[{}] Calibrated: base height {:.2} m", ts_now(), base_height)
                }
                PipelineEvent::JumpDetected { count } => println!("[{}] Jump #{}", ts_now(), count),
                PipelineEvent::SquatCompleted { count } => println!("[{}] Squat #{}", ts_now(), count),
                _ => {}
            }
        }
        counts
    });

    let mut pipeline = Pipeline::new(config)?.with_sink(event_tx);

    let routine = ScriptedRoutine::workout(args.standing_height).with_dropout(args.dropout_every);
    let (landmark_tx, mut landmark_rx) = mpsc::channel(64);
    let _source_handle = tokio::spawn(landmark_loop(landmark_tx, routine, tick_hz));

    let mut recording = SessionRecording::new(tick_hz);
    let mut status = LiveStatus::new();
    let mut ticker = interval(Duration::from_secs_f32(1.0 / tick_hz));
    let mut drain = FrameDrain::new();
    let mut ticks = 0u64;

    let start = Utc::now();
    let mut last_status_update = Utc::now();
    let mut last_tick = Instant::now();

    pipeline.start_session();
    println!("[{}] Session started, stand still for calibration...", ts_now());

    loop {
        ticker.tick().await;

        if args.duration > 0 {
            let elapsed = Utc::now().signed_duration_since(start);
            if elapsed.num_seconds() as u64 >= args.duration {
                println!("[{}] Duration reached, stopping...", ts_now());
                break;
            }
        }

        // Freshest frame; a late frame reuses the previous one
        let Some(latest) = drain.next_tick(&mut landmark_rx) else {
            println!("[{}] Routine finished, stopping...", ts_now());
            break;
        };

        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f32();
        last_tick = now;

        let report = pipeline.tick(latest.as_ref(), dt);
        recording.push(live_status::current_timestamp(), latest);
        ticks += 1;

        if !report.source_healthy && ticks % tick_hz as u64 == 0 {
            println!("[{}] {}", ts_now(), pipeline.source_status());
        }

        let wall = Utc::now();
        if (wall.signed_duration_since(last_status_update).num_seconds() as u64) >= 2 {
            let uptime = wall.signed_duration_since(start).num_seconds().max(0) as u64;
            status.update(&pipeline.get_snapshot(), uptime);
            status.samples_superseded = drain.superseded;
            let status_path = format!("{}/live_status.json", args.output_dir);
            if let Err(e) = status.save(&status_path) {
                log::warn!("Failed to write {}: {}", status_path, e);
            }
            last_status_update = wall;
        }
    }

    // Final status before the pipeline is consumed
    let uptime = Utc::now().signed_duration_since(start).num_seconds().max(0) as u64;
    let snapshot = pipeline.get_snapshot();
    status.update(&snapshot, uptime);
    status.samples_superseded = drain.superseded;
    let _ = status.save(&format!("{}/live_status_final.json", args.output_dir));

    let stats = pipeline.shutdown();
    let event_counts = printer
        .join()
        .map_err(|_| anyhow::anyhow!("event printer thread panicked"))?;

    let stamp = ts_now_clean();
    let recording_path = PathBuf::from(format!("{}/session_{}.json.gz", args.output_dir, stamp));
    recording.save(&recording_path)?;

    let summary = SessionSummary {
        started: start.to_rfc3339(),
        ticks,
        samples_received: snapshot.source.total_received,
        samples_missing: snapshot.source.total_missing,
        samples_superseded: drain.superseded,
        samples_reused: drain.reused,
        event_counts,
        stats,
    };
    let summary_path = format!("{}/summary_{}.json", args.output_dir, stamp);
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;

    print_final_stats(&summary, &recording_path);
    Ok(())
}

fn print_final_stats(summary: &SessionSummary, recording_path: &Path) {
    let stats = &summary.stats;
    println!("\n=== Final Stats ===");
    println!(
        "Ticks: {} ({} samples, {} missing, {} late)",
        summary.ticks, summary.samples_received, summary.samples_missing, summary.samples_reused
    );
    println!("Distance: {:.1} m ({:.0}% of goal)", stats.distance, stats.distance_progress * 100.0);
    println!("Jumps: {}{}", stats.jumps, if stats.jump_goal_met { " (goal met)" } else { "" });
    println!("Squats: {}{}", stats.squats, if stats.squat_goal_met { " (goal met)" } else { "" });
    println!("Elapsed: {:.1} s", stats.elapsed);
    println!("Recording: {}", recording_path.display());
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
