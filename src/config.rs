//! Configuration for HRV Autopilot.
//!
//! Every screen coordinate, template location and wait used by the workflow
//! lives here so a different screen layout or a slower machine only needs a
//! new config file.

use crate::desktop::{Point, Region};
use crate::vision::{default_channel_map, Expectation, YellowDetector};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which build of the analysis application is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Licensed build working on `.acq` acquisitions
    Main,
    /// Demo build working on `.mwi` files, with startup dialogs
    Demo,
}

impl Variant {
    /// File extension (without dot) of the acquisitions this build opens.
    pub fn extension(&self) -> &'static str {
        match self {
            Variant::Main => "acq",
            Variant::Demo => "mwi",
        }
    }

    pub fn default_max_segments(&self) -> u32 {
        match self {
            Variant::Main => 20,
            Variant::Demo => 8,
        }
    }

    /// Whether a missing UI element stops for the operator.
    pub fn escalates_missing_elements(&self) -> bool {
        matches!(self, Variant::Main)
    }

    /// Whether "Demo Mode" / "Continue" must be clicked after launch.
    pub fn has_startup_dialogs(&self) -> bool {
        matches!(self, Variant::Demo)
    }

    /// Whether an empty input folder also closes the application window.
    pub fn closes_window_when_idle(&self) -> bool {
        matches!(self, Variant::Main)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Main => write!(f, "main"),
            Variant::Demo => write!(f, "demo"),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "main" | "acq" => Ok(Variant::Main),
            "demo" | "mwi" => Ok(Variant::Demo),
            other => Err(format!("unknown variant '{other}' (expected main or demo)")),
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, remote = "Self")]
pub struct Config {
    pub variant: Variant,

    /// How to start and place the analysis application
    pub app: AppConfig,

    /// Folder scanned for acquisition files
    pub input_folder: PathBuf,

    /// Folder the application writes its results to
    pub output_folder: PathBuf,

    /// Folder holding the UI element reference images
    pub templates_dir: PathBuf,

    /// Where region screenshots are written before OCR
    pub screenshot_dir: PathBuf,

    /// Path for run statistics and run reports
    pub data_path: PathBuf,

    pub ocr: OcrConfig,

    /// Segment count follows the variant when absent or zero
    #[serde(default = "AnalysisParams::unresolved")]
    pub analysis: AnalysisParams,

    pub matching: MatchSettings,

    pub screen: ScreenLayout,

    /// Expected channel map text
    pub channel_map: Vec<Expectation>,

    /// Text proving the digital event channel is configured
    pub event_channel_text: String,

    pub yellow: YellowDetector,

    /// Delay between typed characters
    #[serde(with = "duration_ms")]
    pub typing_interval: Duration,

    pub timings: Timings,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hrv-autopilot");
        let documents = dirs::document_dir().unwrap_or_else(|| PathBuf::from("."));

        Self {
            variant: Variant::Main,
            app: AppConfig::default(),
            input_folder: documents.join("MindWare").join("HRV Examples"),
            output_folder: documents.join("MindWare").join("HRV Output"),
            templates_dir: PathBuf::from("templates"),
            screenshot_dir: PathBuf::from("."),
            data_path: data_dir,
            ocr: OcrConfig::default(),
            analysis: AnalysisParams::for_variant(Variant::Main),
            matching: MatchSettings::default(),
            screen: ScreenLayout::default(),
            channel_map: default_channel_map(),
            event_channel_text: "Event Channel".to_string(),
            yellow: YellowDetector::default(),
            typing_interval: Duration::from_millis(100),
            timings: Timings::default(),
        }
    }
}

impl Serialize for Config {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Config::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut config = Config::deserialize(deserializer)?;
        if config.analysis.max_segments == 0 {
            config.analysis.max_segments = config.variant.default_max_segments();
        }
        Ok(config)
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hrv-autopilot")
            .join("config.json")
    }

    /// Directory for per-run JSON reports.
    pub fn reports_path(&self) -> PathBuf {
        self.data_path.join("reports")
    }

    /// File holding cumulative run statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("run_stats.json")
    }

    /// Ensure all directories the tool writes to exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.data_path, &self.reports_path(), &self.screenshot_dir] {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    /// Switch variant. The segment count follows unless it was customised.
    pub fn set_variant(&mut self, variant: Variant) {
        if self.analysis.max_segments == self.variant.default_max_segments() {
            self.analysis.max_segments = variant.default_max_segments();
        }
        self.variant = variant;
    }

    /// Reject values the workflow cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.matching;
        for (name, c) in [
            ("matching.confidence", m.confidence),
            ("matching.optional_confidence", m.optional_confidence),
            ("matching.manual_fix_confidence", m.manual_fix_confidence),
        ] {
            if !(c > 0.0 && c <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in (0, 1], got {c}"
                )));
            }
        }
        if m.downscale == 0 {
            return Err(ConfigError::Invalid("matching.downscale must be >= 1".into()));
        }
        for (name, region) in [
            ("screen.channel_map", self.screen.channel_map),
            ("screen.event_channel", self.screen.event_channel),
            ("screen.ecg_segment", self.screen.ecg_segment),
        ] {
            if region.is_empty() {
                return Err(ConfigError::Invalid(format!("{name} has zero size")));
            }
        }
        if !(0.0..1.0).contains(&self.yellow.threshold) {
            return Err(ConfigError::Invalid(format!(
                "yellow.threshold must be in [0, 1), got {}",
                self.yellow.threshold
            )));
        }
        Ok(())
    }
}

/// Launch and window placement of the analysis application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub executable: PathBuf,

    /// Substring of the main window title
    pub window_title: String,

    /// Where to put the window; `None` leaves it alone
    pub window_geometry: Option<Region>,

    /// Fixed wait after launching
    #[serde(with = "duration_ms")]
    pub launch_wait: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(
                r"C:\Program Files (x86)\MindWare\HRV 3.2.13\MindWare HRV Analysis 3.2.13.exe",
            ),
            window_title: "MindWare HRV Analysis".to_string(),
            window_geometry: Some(Region::new(0, 0, 1280, 800)),
            launch_wait: Duration::from_secs(25),
        }
    }
}

/// Text recognition engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub command: PathBuf,
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        let command = if cfg!(target_os = "windows") {
            PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe")
        } else {
            PathBuf::from("tesseract")
        };
        Self {
            command,
            language: "eng".to_string(),
        }
    }
}

/// Parameters typed into the analysis settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub segment_time_secs: u32,
    pub lf_filter_hz: f64,
    pub hf_filter_hz: f64,
    /// Segments inspected for R-peak artifacts per file
    #[serde(default)]
    pub max_segments: u32,
}

impl AnalysisParams {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            segment_time_secs: 60,
            lf_filter_hz: 0.15,
            hf_filter_hz: 0.15,
            max_segments: variant.default_max_segments(),
        }
    }

    /// Defaults with the segment count left for the variant to decide.
    fn unresolved() -> Self {
        Self {
            max_segments: 0,
            ..Self::default()
        }
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self::for_variant(Variant::Main)
    }
}

/// Template matching behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Minimum score for a regular element
    pub confidence: f32,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Coarse search reduction factor (1 = full resolution only)
    pub downscale: u32,
    /// Score for optional pop-ups
    pub optional_confidence: f32,
    #[serde(with = "duration_ms")]
    pub optional_timeout: Duration,
    /// Score for the channel map OK button after a manual fix
    pub manual_fix_confidence: f32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            confidence: 0.9,
            timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(500),
            downscale: 4,
            optional_confidence: 0.6,
            optional_timeout: Duration::from_secs(5),
            manual_fix_confidence: 0.7,
        }
    }
}

/// Fixed screen positions, valid for the default window geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenLayout {
    /// Channel map dialog, read by OCR
    pub channel_map: Region,
    /// Digital event channel dialog, read by OCR
    pub event_channel: Region,
    /// ECG plot of the current segment, scanned for yellow R-peaks
    pub ecg_segment: Region,
    /// "Next segment" control
    pub next_segment: Point,
}

impl Default for ScreenLayout {
    fn default() -> Self {
        Self {
            channel_map: Region::new(806, 496, 1114, 673),
            event_channel: Region::new(791, 479, 1130, 642),
            ecg_segment: Region::new(403, 274, 700, 128),
            next_segment: Point::new(458, 206),
        }
    }
}

/// Fixed waits between workflow steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    #[serde(with = "duration_ms")]
    pub key_gap: Duration,
    #[serde(with = "duration_ms")]
    pub field_settle: Duration,
    #[serde(with = "duration_ms")]
    pub file_open: Duration,
    #[serde(with = "duration_ms")]
    pub channel_map_appear: Duration,
    /// After a dialog is confirmed or a parameter committed
    #[serde(with = "duration_ms")]
    pub dialog_close: Duration,
    #[serde(with = "duration_ms")]
    pub event_ok_gap: Duration,
    #[serde(with = "duration_ms")]
    pub tab_switch: Duration,
    #[serde(with = "duration_ms")]
    pub analysis_render: Duration,
    #[serde(with = "duration_ms")]
    pub segment_settle: Duration,
    #[serde(with = "duration_ms")]
    pub edit_window_open: Duration,
    #[serde(with = "duration_ms")]
    pub next_segment: Duration,
    #[serde(with = "duration_ms")]
    pub export_dialog: Duration,
    #[serde(with = "duration_ms")]
    pub export_confirm: Duration,
    #[serde(with = "duration_ms")]
    pub export_write: Duration,
    #[serde(with = "duration_ms")]
    pub window_close: Duration,
    #[serde(with = "duration_ms")]
    pub reopen: Duration,
    #[serde(with = "duration_ms")]
    pub demo_mode: Duration,
    #[serde(with = "duration_ms")]
    pub demo_continue: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        let ms = Duration::from_millis;
        Self {
            key_gap: ms(500),
            field_settle: ms(1000),
            file_open: ms(3000),
            channel_map_appear: ms(3000),
            dialog_close: ms(5000),
            event_ok_gap: ms(2000),
            tab_switch: ms(1000),
            analysis_render: ms(10_000),
            segment_settle: ms(1000),
            edit_window_open: ms(2000),
            next_segment: ms(3000),
            export_dialog: ms(6000),
            export_confirm: ms(1000),
            export_write: ms(10_000),
            window_close: ms(2000),
            reopen: ms(500),
            demo_mode: ms(2000),
            demo_continue: ms(7000),
        }
    }
}

impl Timings {
    /// No waits at all; for dry runs against a scripted desktop.
    pub fn zero() -> Self {
        let z = Duration::ZERO;
        Self {
            key_gap: z,
            field_settle: z,
            file_open: z,
            channel_map_appear: z,
            dialog_close: z,
            event_ok_gap: z,
            tab_switch: z,
            analysis_render: z,
            segment_settle: z,
            edit_window_open: z,
            next_segment: z,
            export_dialog: z,
            export_confirm: z,
            export_write: z,
            window_close: z,
            reopen: z,
            demo_mode: z,
            demo_continue: z,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("hrv-autopilot-config-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("main".parse::<Variant>().unwrap(), Variant::Main);
        assert_eq!(" Demo ".parse::<Variant>().unwrap(), Variant::Demo);
        assert_eq!("mwi".parse::<Variant>().unwrap(), Variant::Demo);
        assert!("trial".parse::<Variant>().is_err());
    }

    #[test]
    fn test_variant_behaviour() {
        assert_eq!(Variant::Main.extension(), "acq");
        assert_eq!(Variant::Demo.extension(), "mwi");
        assert!(Variant::Main.escalates_missing_elements());
        assert!(!Variant::Demo.escalates_missing_elements());
        assert!(Variant::Demo.has_startup_dialogs());
        assert_eq!(Variant::Demo.default_max_segments(), 8);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.variant, Variant::Main);
        assert_eq!(config.analysis.segment_time_secs, 60);
        assert_eq!(config.analysis.max_segments, 20);
        assert_eq!(config.matching.confidence, 0.9);
        assert_eq!(config.matching.timeout, Duration::from_secs(15));
        assert_eq!(config.yellow.threshold, 0.0001);
        assert_eq!(config.screen.ecg_segment, Region::new(403, 274, 700, 128));
        assert_eq!(config.screen.next_segment, Point::new(458, 206));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let json = r#"{
            "variant": "demo",
            "timings": { "analysis_render": 2500 },
            "matching": { "downscale": 2 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.variant, Variant::Demo);
        assert_eq!(config.timings.analysis_render, Duration::from_millis(2500));
        assert_eq!(config.timings.file_open, Duration::from_millis(3000));
        assert_eq!(config.matching.downscale, 2);
        assert_eq!(config.matching.confidence, 0.9);
        assert_eq!(config.event_channel_text, "Event Channel");
        assert_eq!(config.analysis.max_segments, 8);
    }

    #[test]
    fn test_segment_count_follows_loaded_variant() {
        let demo: Config = serde_json::from_str(r#"{ "variant": "demo" }"#).unwrap();
        assert_eq!(demo.analysis.max_segments, 8);

        let main: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(main.analysis.max_segments, 20);

        let partial: Config = serde_json::from_str(
            r#"{ "variant": "demo", "analysis": { "segment_time_secs": 30 } }"#,
        )
        .unwrap();
        assert_eq!(partial.analysis.segment_time_secs, 30);
        assert_eq!(partial.analysis.max_segments, 8);

        let explicit: Config = serde_json::from_str(
            r#"{ "variant": "demo", "analysis": { "max_segments": 20 } }"#,
        )
        .unwrap();
        assert_eq!(explicit.analysis.max_segments, 20);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_path("roundtrip.json");
        let mut config = Config::default();
        config.set_variant(Variant::Demo);
        config.input_folder = PathBuf::from("/data/acq");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.variant, Variant::Demo);
        assert_eq!(loaded.input_folder, PathBuf::from("/data/acq"));
        assert_eq!(loaded.analysis.max_segments, 8);
        assert_eq!(loaded.timings, config.timings);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from(&temp_path("does-not-exist.json")).unwrap();
        assert_eq!(config.variant, Variant::Main);
    }

    #[test]
    fn test_set_variant_keeps_custom_segment_count() {
        let mut config = Config::default();
        config.analysis.max_segments = 12;
        config.set_variant(Variant::Demo);
        assert_eq!(config.analysis.max_segments, 12);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.matching.confidence = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.matching.downscale = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.screen.ecg_segment = Region::new(0, 0, 0, 0);
        assert!(config.validate().is_err());
    }
}
