use crate::environment::{Point, TerminalCause};
use crate::error::ReportError;
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

pub const TRAINING_LOG: &str = "training_log.csv";
pub const POSITIONS_LOG: &str = "positions_log.csv";

#[derive(Debug, Serialize)]
struct EpisodeRow {
    #[serde(rename = "Game_No")]
    game: u32,
    #[serde(rename = "Score")]
    score: u32,
    #[serde(rename = "Record")]
    record: u32,
    #[serde(rename = "Avg_Steps")]
    avg_steps: String,
    #[serde(rename = "Death_Reason")]
    cause: String,
}

#[derive(Debug, Serialize)]
struct PositionRow {
    #[serde(rename = "Game_No")]
    game: u32,
    #[serde(rename = "X")]
    x: i32,
    #[serde(rename = "Y")]
    y: i32,
}

/// Steps taken per food eaten, counting the final stretch as one more target.
pub fn average_steps(steps: u32, score: u32) -> f32 {
    steps as f32 / (score + 1) as f32
}

/// Append-only CSV logs of finished episodes and, optionally, every head position.
pub struct TrainingLog {
    episodes: Writer<File>,
    positions: Option<Writer<File>>,
}

impl TrainingLog {
    /// Opens the logs under `log_dir`. With `fresh`, existing logs are removed first.
    pub fn open(log_dir: &Path, fresh: bool, log_positions: bool) -> Result<Self, ReportError> {
        fs::create_dir_all(log_dir)?;

        let episodes = open_appending(&log_dir.join(TRAINING_LOG), fresh)?;
        let positions = if log_positions {
            Some(open_appending(&log_dir.join(POSITIONS_LOG), fresh)?)
        } else {
            None
        };

        Ok(Self { episodes, positions })
    }

    pub fn record_episode(
        &mut self,
        game: u32,
        score: u32,
        record: u32,
        avg_steps: f32,
        cause: Option<TerminalCause>,
    ) -> Result<(), ReportError> {
        self.episodes.serialize(EpisodeRow {
            game,
            score,
            record,
            avg_steps: format!("{avg_steps:.2}"),
            cause: cause.map(|c| c.to_string()).unwrap_or_default(),
        })?;
        self.episodes.flush()?;
        Ok(())
    }

    /// No-op when position logging is off.
    pub fn record_position(&mut self, game: u32, position: Point) -> Result<(), ReportError> {
        if let Some(positions) = self.positions.as_mut() {
            positions.serialize(PositionRow { game, x: position.0, y: position.1 })?;
            positions.flush()?;
        }
        Ok(())
    }
}

// header only goes into a file that is new or empty
fn open_appending(path: &Path, fresh: bool) -> Result<Writer<File>, ReportError> {
    if fresh && path.exists() {
        fs::remove_file(path)?;
    }
    let needs_header = fs::metadata(path).map(|meta| meta.len() == 0).unwrap_or(true);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(WriterBuilder::new().has_headers(needs_header).from_writer(file))
}
