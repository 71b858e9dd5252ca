//! Per-run report written as JSON after every run.

use crate::config::{AnalysisParams, Config, Variant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Why a file was abandoned before export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// OCR did not confirm the expected channel map
    ChannelMapMismatch,
    /// A stop was requested while the file was in progress
    Interrupted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ChannelMapMismatch => write!(f, "channel map did not verify"),
            SkipReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Terminal state of one acquisition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Exported {
        segments_checked: u32,
        /// 1-based numbers of the segments that needed R-peak editing
        flagged_segments: Vec<u32>,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl FileOutcome {
    pub fn is_exported(&self) -> bool {
        matches!(self, FileOutcome::Exported { .. })
    }
}

/// What happened to a single file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file: String,
    pub outcome: FileOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Everything one invocation did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub variant: Variant,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub parameters: AnalysisParams,
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub files: Vec<FileRecord>,
}

impl RunReport {
    pub fn new(config: &Config) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            variant: config.variant,
            started_at: Utc::now(),
            finished_at: None,
            parameters: config.analysis,
            input_folder: config.input_folder.clone(),
            output_folder: config.output_folder.clone(),
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, record: FileRecord) {
        self.files.push(record);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn exported_count(&self) -> usize {
        self.files.iter().filter(|r| r.outcome.is_exported()).count()
    }

    /// Write the report as `run_<timestamp>.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "run_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
