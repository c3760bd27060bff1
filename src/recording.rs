//! Recorded landmark sessions (`.json` or `.json.gz`)

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::types::LandmarkSample;

/// One tick of input; `sample` is `None` when the tracker lost the player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub timestamp: f64,
    pub sample: Option<LandmarkSample>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecording {
    pub tick_hz: f32,
    pub frames: Vec<LandmarkFrame>,
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}

impl SessionRecording {
    pub fn new(tick_hz: f32) -> Self {
        Self { tick_hz, frames: Vec::new() }
    }

    pub fn push(&mut self, timestamp: f64, sample: Option<LandmarkSample>) {
        self.frames.push(LandmarkFrame { timestamp, sample });
    }

    /// Nominal tick length, used when timestamps are unusable.
    pub fn nominal_dt(&self) -> f32 {
        if self.tick_hz > 0.0 { 1.0 / self.tick_hz } else { 1.0 / 30.0 }
    }

    /// Per-frame dt from timestamps, falling back to the nominal tick for
    /// the first frame and for non-increasing timestamps.
    pub fn frame_dts(&self) -> Vec<f32> {
        let nominal = self.nominal_dt();
        let mut previous: Option<f64> = None;
        self.frames
            .iter()
            .map(|frame| {
                let dt = match previous {
                    Some(p) if frame.timestamp > p => (frame.timestamp - p) as f32,
                    _ => nominal,
                };
                previous = Some(frame.timestamp);
                dt
            })
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if is_gzip(path) {
            let reader = BufReader::new(GzDecoder::new(file));
            Ok(serde_json::from_reader(reader)?)
        } else {
            Ok(serde_json::from_reader(BufReader::new(file))?)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        if is_gzip(path) {
            let mut encoder = GzEncoder::new(file, Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?;
        } else {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format() {
        let mut recording = SessionRecording::new(30.0);
        recording.push(1.0, Some(LandmarkSample::standing_at(1.7)));
        recording.push(1.1, None);
        let json = serde_json::to_value(&recording).unwrap();

        assert_eq!(json["tick_hz"], 30.0);
        assert!(json["frames"][1]["sample"].is_null());
        let head = json["frames"][0]["sample"]["head"].as_array().unwrap();
        assert_eq!(head.len(), 3);
    }

    #[test]
    fn test_frame_dts_fall_back_to_nominal() {
        let mut recording = SessionRecording::new(20.0);
        for ts in [10.0, 10.1, 10.1, 10.25] {
            recording.push(ts, None);
        }
        let dts = recording.frame_dts();
        assert_eq!(dts[0], 0.05);
        assert!((dts[1] - 0.1).abs() < 1e-5);
        assert_eq!(dts[2], 0.05);
        assert!((dts[3] - 0.15).abs() < 1e-5);
    }

    #[test]
    fn test_gzip_file_round_trip() {
        let path = std::env::temp_dir().join(format!("saga_recording_{}.json.gz", std::process::id()));
        let mut recording = SessionRecording::new(30.0);
        recording.push(0.0, Some(LandmarkSample::standing_at(1.6)));
        recording.push(0.033, None);
        recording.save(&path).unwrap();

        let loaded = SessionRecording::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, recording);
    }
}
