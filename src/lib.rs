//! HRV Autopilot - unattended replay of the MindWare HRV analysis workflow.
//!
//! This library drives the MindWare HRV analysis application through its user
//! interface: it opens every acquisition file in a folder, sets the analysis
//! parameters, runs the analysis, stops for a human wherever R-peaks need
//! editing, and exports the results.
//!
//! # How decisions are made
//!
//! - **Template matching**: controls are found by comparing the screen to
//!   reference images
//! - **OCR**: dialog contents are read back with Tesseract and checked for
//!   expected text
//! - **Pixel heuristics**: a segment needs editing when its ECG plot shows
//!   yellow R-peak markers
//! - **Fixed waits**: the application exposes no readiness signal
//!
//! Anything unexpected ends with a beep and a console prompt; nothing is
//! retried automatically.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        HRV Autopilot                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Session   │──▶│  Automator  │──▶│   Desktop   │       │
//! │  │ (file loop) │   │  (actions)  │   │ (Win32 I/O) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │             │       │                             │
//! │         ▼             ▼       ▼                             │
//! │  ┌─────────────┐   ┌──────────┐ ┌──────────┐               │
//! │  │ Run Report  │   │  Vision  │ │ Operator │               │
//! │  │  & Stats    │   │match, OCR│ │(console) │               │
//! │  └─────────────┘   └──────────┘ └──────────┘               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hrv_autopilot::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! let screenshot = image::open("ecg_segment.png").expect("Failed to read").to_rgba8();
//! let verdict = config.yellow.inspect(&screenshot);
//! println!("ratio {:.6}, needs editing: {}", verdict.ratio, verdict.flagged);
//! ```

pub mod config;
pub mod desktop;
pub mod report;
pub mod vision;
pub mod workflow;

// Re-export key types at crate root for convenience
pub use config::{AnalysisParams, Config, ConfigError, Variant};
pub use desktop::{Desktop, DesktopError, Key, PlatformDesktop, Point, Region};
pub use report::{FileOutcome, RunLog, RunReport, RunStats, SharedRunLog};
pub use vision::{Tesseract, TextRecognizer, YellowDetector, YellowReport};
pub use workflow::{Automator, AutomationError, ConsoleOperator, Operator, RunOptions, Session};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown before a run takes over the machine.
pub const SAFETY_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 HRV AUTOPILOT - BEFORE YOU START                 ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool moves the mouse and types on your behalf.             ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Opens each acquisition file in MindWare HRV                 ║
║    • Sets segment time, LF and HF filters                        ║
║    • Stops and beeps when R-peaks need manual editing            ║
║    • Exports the results to your output folder                   ║
║                                                                  ║
║  ✗ WHILE IT RUNS:                                                ║
║    • Do not touch the mouse or keyboard unless prompted          ║
║    • Keep the MindWare window at its configured position         ║
║    • Keep the screen unlocked and the display scale at 100%      ║
║                                                                  ║
║  It never edits your data files. Results are written by          ║
║  MindWare HRV itself.                                            ║
║                                                                  ║
║  Press Ctrl+C to stop before the next file or segment.           ║
║  Totals from earlier runs:                                       ║
║    hrv-autopilot status                                          ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
