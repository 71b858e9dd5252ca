//! Cumulative run statistics.
//!
//! Counts what the automation did and how often it needed the operator, and
//! persists the totals across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Run counters for the current session plus persisted totals.
#[derive(Debug)]
pub struct RunLog {
    /// Acquisition files found in the input folder
    files_found: AtomicU64,
    /// Files taken through export
    files_exported: AtomicU64,
    /// Files abandoned after a failed verification
    files_skipped: AtomicU64,
    /// Segments scanned for yellow R-peaks
    segments_checked: AtomicU64,
    /// Segments that needed manual R-peak editing
    segments_flagged: AtomicU64,
    /// Times the operator was asked to step in
    manual_interventions: AtomicU64,
    /// Template matches that timed out
    elements_missed: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            files_found: AtomicU64::new(0),
            files_exported: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            segments_checked: AtomicU64::new(0),
            segments_flagged: AtomicU64::new(0),
            manual_interventions: AtomicU64::new(0),
            elements_missed: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a run log that continues from the totals stored at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            eprintln!("Note: Could not load previous run statistics: {e}");
        }

        log
    }

    pub fn record_files_found(&self, count: u64) {
        self.files_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_file_exported(&self) {
        self.files_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one inspected segment.
    pub fn record_segment(&self, flagged: bool) {
        self.segments_checked.fetch_add(1, Ordering::Relaxed);
        if flagged {
            self.segments_flagged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_intervention(&self) {
        self.manual_interventions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_element_missed(&self) {
        self.elements_missed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        RunStats {
            files_found: self.files_found.load(Ordering::Relaxed),
            files_exported: self.files_exported.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            segments_checked: self.segments_checked.load(Ordering::Relaxed),
            segments_flagged: self.segments_flagged.load(Ordering::Relaxed),
            manual_interventions: self.manual_interventions.load(Ordering::Relaxed),
            elements_missed: self.elements_missed.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Files found: {}\n\
             - Files exported: {}\n\
             - Files skipped: {}\n\
             - Segments checked: {}\n\
             - Segments with yellow R-peaks: {}\n\
             - Manual interventions: {}\n\
             - UI elements not found: {}\n\
             - Session duration: {} seconds",
            stats.files_found,
            stats.files_exported,
            stats.files_skipped,
            stats.segments_checked,
            stats.segments_flagged,
            stats.manual_interventions,
            stats.elements_missed,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                files_found: stats.files_found,
                files_exported: stats.files_exported,
                files_skipped: stats.files_skipped,
                segments_checked: stats.segments_checked,
                segments_flagged: stats.segments_flagged,
                manual_interventions: stats.manual_interventions,
                elements_missed: stats.elements_missed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.files_found
                    .store(persisted.files_found, Ordering::Relaxed);
                self.files_exported
                    .store(persisted.files_exported, Ordering::Relaxed);
                self.files_skipped
                    .store(persisted.files_skipped, Ordering::Relaxed);
                self.segments_checked
                    .store(persisted.segments_checked, Ordering::Relaxed);
                self.segments_flagged
                    .store(persisted.segments_flagged, Ordering::Relaxed);
                self.manual_interventions
                    .store(persisted.manual_interventions, Ordering::Relaxed);
                self.elements_missed
                    .store(persisted.elements_missed, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub files_found: u64,
    pub files_exported: u64,
    pub files_skipped: u64,
    pub segments_checked: u64,
    pub segments_flagged: u64,
    pub manual_interventions: u64,
    pub elements_missed: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub files_found: u64,
    pub files_exported: u64,
    pub files_skipped: u64,
    pub segments_checked: u64,
    pub segments_flagged: u64,
    pub manual_interventions: u64,
    pub elements_missed: u64,
    pub last_updated: DateTime<Utc>,
}

/// Run log shared between the workflow and the binary.
pub type SharedRunLog = Arc<RunLog>;

pub fn create_shared_log() -> SharedRunLog {
    Arc::new(RunLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedRunLog {
    Arc::new(RunLog::with_persistence(path))
}
