use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ppe_track::{
    Detection, FrameDetections, MonitorConfig, Observations, RawObservation, TrackingEngine,
};

/// Replay recorded detections and verifier output through the tracker and
/// print one JSON compliance report per frame.
#[derive(Parser)]
#[command(name = "ppe-replay", version, about, long_about = None)]
struct Cli {
    /// Deployment YAML config
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// JSON-lines input, one frame per line
    #[arg(short, long)]
    input: PathBuf,

    /// Indent each report
    #[arg(long)]
    pretty: bool,
}

/// One recorded frame.
#[derive(Deserialize)]
struct ReplayFrame {
    frame_number: u64,
    /// `[x1, y1, x2, y2, score]` rows; absent on intermediate frames.
    #[serde(default)]
    detections: Option<Vec<[f32; 5]>>,
    /// Verifier output keyed by track id.
    #[serde(default)]
    observations: HashMap<u64, HashMap<String, String>>,
}

fn parse_observations(frame_number: u64, raw: &HashMap<String, String>) -> Observations {
    raw.iter()
        .map(|(item, status)| {
            if let Err(err) = status.parse::<RawObservation>() {
                warn!(frame_number, %item, error = %err, "treating status as UNKNOWN");
            }
            (item.clone(), RawObservation::parse_lenient(status))
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = MonitorConfig::from_yaml_file(&cli.config)
        .and_then(MonitorConfig::into_tracker_config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    info!(
        interval = config.detection_interval,
        min_hits = config.min_hits,
        max_age = config.max_age,
        items = ?config.ppe_items,
        "configuration loaded"
    );
    let mut engine = TrackingEngine::new(config)?;

    let input = File::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut frames = 0usize;

    for (line_no, line) in BufReader::new(input).lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: ReplayFrame = serde_json::from_str(&line)
            .with_context(|| format!("parsing line {}", line_no + 1))?;

        let detections = match &frame.detections {
            Some(rows) => FrameDetections::Ready(
                rows.iter()
                    .map(|&[x1, y1, x2, y2, score]| Detection::new(x1, y1, x2, y2, score))
                    .collect(),
            ),
            None => FrameDetections::Skipped,
        };

        let frame_number = frame.frame_number;
        let report = engine
            .process_frame(frame_number, detections, |track_id, _| {
                frame
                    .observations
                    .get(&track_id)
                    .map(|raw| parse_observations(frame_number, raw))
            })
            .with_context(|| format!("line {}", line_no + 1))?;

        if cli.pretty {
            serde_json::to_writer_pretty(&mut out, &report)?;
        } else {
            serde_json::to_writer(&mut out, &report)?;
        }
        writeln!(out)?;
        frames += 1;
    }

    info!(frames, "replay finished");
    Ok(())
}
