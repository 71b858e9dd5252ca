//! Drives the per-file workflow against a scripted desktop.
//!
//! The fake screen carries a distinct texture for every UI element, so the
//! real template matcher finds them; OCR text and ECG captures are scripted.

use hrv_autopilot::config::{Config, Timings, Variant};
use hrv_autopilot::desktop::{chord_label, Desktop, DesktopError, Key, Point, Region};
use hrv_autopilot::report::{create_shared_log, FileOutcome, RunReport, SharedRunLog, SkipReason};
use hrv_autopilot::vision::{OcrError, TextRecognizer};
use hrv_autopilot::workflow::{Automator, Element, Operator, RunOptions, Session};
use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TEMPLATE_W: u32 = 16;
const TEMPLATE_H: u32 = 8;

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Launch(PathBuf),
    Place(String),
    Click(Point),
    DoubleClick(Point),
    Press(Key),
    Hotkey(String),
    Type(char),
    Beep,
}

/// Pseudo-random texture, distinct per seed.
fn texture(seed: u32) -> GrayImage {
    GrayImage::from_fn(TEMPLATE_W, TEMPLATE_H, |x, y| {
        let mut h = seed
            .wrapping_mul(0x9E37_79B9)
            .wrapping_add(x.wrapping_mul(0x85EB_CA6B))
            .wrapping_add(y.wrapping_mul(0xC2B2_AE35));
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        Luma([(h >> 24) as u8])
    })
}

fn template_for(element: Element) -> GrayImage {
    let index = Element::ALL.iter().position(|e| *e == element).unwrap() as u32;
    texture(index + 1)
}

fn top_left_for(element: Element) -> (u32, u32) {
    let index = Element::ALL.iter().position(|e| *e == element).unwrap() as u32;
    (4 + (index % 5) * 38, 4 + (index / 5) * 22)
}

fn center_of(element: Element) -> Point {
    let (x, y) = top_left_for(element);
    Point::new((x + TEMPLATE_W / 2) as i32, (y + TEMPLATE_H / 2) as i32)
}

struct ScriptedDesktop {
    screen: RgbaImage,
    ecg_region: Region,
    /// Upcoming ECG captures; `true` shows yellow R-peaks
    ecg_frames: VecDeque<bool>,
    place_fails: bool,
    /// Raised once an ECG segment has been captured
    stop_on_ecg: Option<Arc<AtomicBool>>,
    actions: Vec<Action>,
    /// When each action happened
    stamps: Vec<Instant>,
}

impl ScriptedDesktop {
    /// Every element visible except `hidden`.
    fn new(ecg_region: Region, hidden: &[Element]) -> Self {
        let mut screen = RgbaImage::from_pixel(200, 120, Rgba([200, 200, 200, 255]));
        for element in Element::ALL {
            if hidden.contains(&element) {
                continue;
            }
            let gray = template_for(element);
            let patch = RgbaImage::from_fn(TEMPLATE_W, TEMPLATE_H, |x, y| {
                let v = gray.get_pixel(x, y).0[0];
                Rgba([v, v, v, 255])
            });
            let (x, y) = top_left_for(element);
            imageops::replace(&mut screen, &patch, x as i64, y as i64);
        }
        Self {
            screen,
            ecg_region,
            ecg_frames: VecDeque::new(),
            place_fails: false,
            stop_on_ecg: None,
            actions: Vec::new(),
            stamps: Vec::new(),
        }
    }

    fn record(&mut self, action: Action) {
        self.actions.push(action);
        self.stamps.push(Instant::now());
    }

    fn with_ecg(mut self, frames: &[bool]) -> Self {
        self.ecg_frames = frames.iter().copied().collect();
        self
    }

    fn hotkeys(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Hotkey(chord) => Some(chord.clone()),
                _ => None,
            })
            .collect()
    }

    fn clicks_at(&self, at: Point) -> usize {
        self.actions
            .iter()
            .filter(|a| **a == Action::Click(at))
            .count()
    }

    fn typed(&self) -> String {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Type(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn beeps(&self) -> usize {
        self.actions.iter().filter(|a| **a == Action::Beep).count()
    }
}

impl Desktop for ScriptedDesktop {
    fn launch(&mut self, executable: &Path) -> Result<(), DesktopError> {
        self.record(Action::Launch(executable.to_path_buf()));
        Ok(())
    }

    fn place_window(&mut self, title: &str, _geometry: Region) -> Result<(), DesktopError> {
        self.record(Action::Place(title.to_string()));
        if self.place_fails {
            return Err(DesktopError::WindowNotFound(title.to_string()));
        }
        Ok(())
    }

    fn capture(&mut self, region: Option<Region>) -> Result<RgbaImage, DesktopError> {
        match region {
            None => Ok(self.screen.clone()),
            Some(r) if r == self.ecg_region => {
                let yellow = self.ecg_frames.pop_front().unwrap_or(false);
                if let Some(stop) = &self.stop_on_ecg {
                    stop.store(true, Ordering::SeqCst);
                }
                let mut image = RgbaImage::from_pixel(r.width, r.height, Rgba([0, 0, 0, 255]));
                if yellow {
                    for x in 0..r.width / 2 {
                        image.put_pixel(x, 0, Rgba([230, 220, 20, 255]));
                    }
                }
                Ok(image)
            }
            Some(r) => Ok(RgbaImage::from_pixel(
                r.width,
                r.height,
                Rgba([255, 255, 255, 255]),
            )),
        }
    }

    fn click(&mut self, at: Point) -> Result<(), DesktopError> {
        self.record(Action::Click(at));
        Ok(())
    }

    fn double_click(&mut self, at: Point) -> Result<(), DesktopError> {
        self.record(Action::DoubleClick(at));
        Ok(())
    }

    fn press(&mut self, key: Key) -> Result<(), DesktopError> {
        self.record(Action::Press(key));
        Ok(())
    }

    fn hotkey(&mut self, keys: &[Key]) -> Result<(), DesktopError> {
        self.record(Action::Hotkey(chord_label(keys)));
        Ok(())
    }

    fn type_char(&mut self, ch: char) -> Result<(), DesktopError> {
        self.record(Action::Type(ch));
        Ok(())
    }

    fn beep(&mut self) {
        self.record(Action::Beep);
    }
}

#[derive(Default)]
struct ScriptedOperator {
    pauses: Vec<String>,
}

impl Operator for ScriptedOperator {
    fn pause(&mut self, message: &str) {
        self.pauses.push(message.to_string());
    }

    fn ask(&mut self, _prompt: &str) -> String {
        String::new()
    }
}

/// Answers by screenshot file name.
struct FakeRecognizer {
    channel_map: Option<String>,
    event_dialog: String,
}

impl FakeRecognizer {
    fn verified() -> Self {
        Self {
            channel_map: Some("Channel Map\nECG  CH1\nZ0\ndZdt\nResp".to_string()),
            event_dialog: "Digital Event Channel 1".to_string(),
        }
    }
}

impl TextRecognizer for FakeRecognizer {
    fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        assert!(image_path.is_file(), "screenshot not saved before OCR");
        match image_path.file_name().and_then(|n| n.to_str()) {
            Some("channel_map_check.png") => self
                .channel_map
                .clone()
                .ok_or_else(|| OcrError::Unavailable(PathBuf::from("tesseract"))),
            Some("digital_event_check.png") => Ok(self.event_dialog.clone()),
            _ => Ok(String::new()),
        }
    }
}

struct Fixture {
    dir: PathBuf,
    config: Config,
}

impl Fixture {
    fn new(name: &str, variant: Variant, files: &[&str]) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "hrv-autopilot-workflow-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("input")).unwrap();
        for file in files {
            std::fs::write(dir.join("input").join(file), b"").unwrap();
        }

        let mut config = Config::default();
        config.set_variant(variant);
        config.input_folder = dir.join("input");
        config.output_folder = PathBuf::from(r"C:\HRV Output");
        config.screenshot_dir = dir.join("shots");
        config.templates_dir = dir.join("templates");
        config.data_path = dir.join("data");
        config.timings = Timings::zero();
        config.typing_interval = Duration::ZERO;
        config.app.launch_wait = Duration::ZERO;
        config.matching.timeout = Duration::ZERO;
        config.matching.optional_timeout = Duration::ZERO;
        config.matching.poll_interval = Duration::ZERO;
        config.matching.downscale = 1;
        config.screen.channel_map = Region::new(0, 0, 20, 10);
        config.screen.event_channel = Region::new(20, 0, 20, 10);
        config.screen.ecg_segment = Region::new(40, 0, 40, 8);
        config.screen.next_segment = Point::new(190, 110);
        config.analysis.max_segments = 3;

        Self { dir, config }
    }

    fn desktop(&self, hidden: &[Element]) -> ScriptedDesktop {
        ScriptedDesktop::new(self.config.screen.ecg_segment, hidden)
    }

    fn session(
        &self,
        desktop: ScriptedDesktop,
        recognizer: FakeRecognizer,
        log: SharedRunLog,
        stop: Arc<AtomicBool>,
    ) -> Session<ScriptedDesktop, ScriptedOperator, FakeRecognizer> {
        let mut automator = Automator::new(
            self.config.clone(),
            desktop,
            ScriptedOperator::default(),
            recognizer,
            log,
        );
        for element in Element::ALL {
            automator
                .templates_mut()
                .insert(element, template_for(element));
        }
        Session::new(automator, stop)
    }

    fn run(
        &self,
        desktop: ScriptedDesktop,
        recognizer: FakeRecognizer,
        options: RunOptions,
    ) -> (RunReport, ScriptedDesktop, ScriptedOperator, SharedRunLog) {
        let log = create_shared_log();
        let stop = desktop
            .stop_on_ecg
            .clone()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        let mut session = self.session(desktop, recognizer, log.clone(), stop);
        let report = session.run(&options).unwrap();
        let (desktop, operator, _) = session.into_automator().into_parts();
        (report, desktop, operator, log)
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[test]
fn test_full_export_flow() {
    let fixture = Fixture::new("export", Variant::Main, &["session1.acq", "notes.txt"]);
    let desktop = fixture
        .desktop(&[Element::ContinuePopup])
        .with_ecg(&[false, true, false]);

    let (report, desktop, operator, log) =
        fixture.run(desktop, FakeRecognizer::verified(), RunOptions::default());

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file, "session1.acq");
    assert_eq!(
        report.files[0].outcome,
        FileOutcome::Exported {
            segments_checked: 3,
            flagged_segments: vec![2],
        }
    );
    assert!(report.finished_at.is_some());

    assert_eq!(
        desktop.hotkeys(),
        vec!["ctrl+a", "ctrl+a", "ctrl+shift+w", "ctrl+a", "alt+f4", "ctrl+o"]
    );

    // One pause per flagged segment, nothing else escalated
    assert_eq!(operator.pauses.len(), 1);
    assert!(operator.pauses[0].contains("Fix R-peaks manually"));

    assert_eq!(desktop.clicks_at(center_of(Element::AnalyzeButton)), 1);
    assert_eq!(desktop.clicks_at(center_of(Element::EditRsButton)), 1);
    assert_eq!(desktop.clicks_at(center_of(Element::UseDefaultDirectory)), 2);
    // Main build confirms the event dialog with the same button twice
    assert_eq!(desktop.clicks_at(center_of(Element::EventOk)), 2);
    assert_eq!(desktop.clicks_at(Point::new(190, 110)), 3);
    assert!(desktop
        .actions
        .contains(&Action::DoubleClick(center_of(Element::SegmentTimeField))));
    assert!(!desktop.actions.iter().any(|a| matches!(a, Action::Launch(_))));

    let typed = desktop.typed();
    assert!(typed.contains("session1.acq"));
    assert!(typed.contains(&fixture.config.input_folder.display().to_string()));
    assert!(typed.contains("600.150.15"));
    assert!(typed.contains(r"C:\HRV Output"));

    let shots = &fixture.config.screenshot_dir;
    assert!(shots.join("channel_map_check.png").is_file());
    assert!(shots.join("digital_event_check.png").is_file());
    assert!(shots.join("ecg_segment.png").is_file());

    let stats = log.stats();
    assert_eq!(stats.files_found, 1);
    assert_eq!(stats.files_exported, 1);
    assert_eq!(stats.segments_checked, 3);
    assert_eq!(stats.segments_flagged, 1);
    assert_eq!(stats.manual_interventions, 1);
    assert_eq!(stats.elements_missed, 0);
}

#[test]
fn test_channel_map_failure_skips_to_next_file() {
    let fixture = Fixture::new("skip", Variant::Main, &["b.acq", "a.acq"]);
    let recognizer = FakeRecognizer {
        channel_map: Some("Channel Map\nZ0 CH3\nResp CH4".to_string()),
        event_dialog: String::new(),
    };

    let (report, desktop, operator, log) =
        fixture.run(fixture.desktop(&[]), recognizer, RunOptions::default());

    let names: Vec<_> = report.files.iter().map(|r| r.file.as_str()).collect();
    assert_eq!(names, vec!["a.acq", "b.acq"]);
    for record in &report.files {
        assert_eq!(
            record.outcome,
            FileOutcome::Skipped {
                reason: SkipReason::ChannelMapMismatch
            }
        );
    }

    assert_eq!(operator.pauses.len(), 2);
    assert!(operator.pauses.iter().all(|p| p.contains("refine the Channel Map")));
    assert_eq!(desktop.beeps(), 2);

    // Only the open-file field edits happen; no analysis, no export
    assert_eq!(desktop.hotkeys(), vec!["ctrl+a"; 4]);
    assert_eq!(desktop.clicks_at(center_of(Element::OkChannelMap)), 2);
    assert_eq!(desktop.clicks_at(center_of(Element::AddButton)), 0);
    assert_eq!(desktop.clicks_at(center_of(Element::AnalyzeButton)), 0);

    assert_eq!(log.stats().files_skipped, 2);
    assert_eq!(log.stats().files_exported, 0);
}

#[test]
fn test_ocr_error_is_escalated_then_skipped() {
    let fixture = Fixture::new("ocr-error", Variant::Main, &["a.acq"]);
    let recognizer = FakeRecognizer {
        channel_map: None,
        event_dialog: String::new(),
    };

    let (report, desktop, operator, log) =
        fixture.run(fixture.desktop(&[]), recognizer, RunOptions::default());

    assert_eq!(
        report.files[0].outcome,
        FileOutcome::Skipped {
            reason: SkipReason::ChannelMapMismatch
        }
    );
    // An unreadable dialog goes straight to the channel map fix
    assert_eq!(operator.pauses.len(), 1);
    assert!(operator.pauses[0].contains("refine the Channel Map"));
    assert_eq!(desktop.beeps(), 1);
    assert_eq!(log.stats().manual_interventions, 1);
}

#[test]
fn test_missing_event_channel_is_escalated_and_export_continues() {
    let fixture = Fixture::new("event-missing", Variant::Main, &["a.acq"]);
    let recognizer = FakeRecognizer {
        event_dialog: String::new(),
        ..FakeRecognizer::verified()
    };

    let (report, desktop, operator, log) = fixture.run(
        fixture.desktop(&[Element::ContinuePopup]),
        recognizer,
        RunOptions::default(),
    );

    assert!(report.files[0].outcome.is_exported());
    assert_eq!(operator.pauses.len(), 1);
    assert!(operator.pauses[0].contains("Digital Event Channel"));
    assert_eq!(desktop.beeps(), 1);
    assert_eq!(desktop.clicks_at(center_of(Element::EventOk)), 2);
    assert!(desktop.hotkeys().contains(&"ctrl+shift+w".to_string()));
    assert_eq!(log.stats().manual_interventions, 1);
}

#[test]
fn test_stop_between_segments_skips_export() {
    let fixture = Fixture::new("stop-segments", Variant::Main, &["a.acq", "b.acq"]);
    let mut desktop = fixture
        .desktop(&[Element::ContinuePopup])
        .with_ecg(&[false, false, false]);
    desktop.stop_on_ecg = Some(Arc::new(AtomicBool::new(false)));

    let (report, desktop, operator, log) =
        fixture.run(desktop, FakeRecognizer::verified(), RunOptions::default());

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file, "a.acq");
    assert_eq!(
        report.files[0].outcome,
        FileOutcome::Skipped {
            reason: SkipReason::Interrupted
        }
    );
    assert!(!desktop.hotkeys().contains(&"ctrl+shift+w".to_string()));
    assert_eq!(desktop.clicks_at(Point::new(190, 110)), 1);
    assert!(operator.pauses.is_empty());

    let stats = log.stats();
    assert_eq!(stats.segments_checked, 1);
    assert_eq!(stats.files_skipped, 1);
    assert_eq!(stats.files_exported, 0);
}

#[test]
fn test_numeric_fields_settle_before_editing() {
    let mut fixture = Fixture::new("settle", Variant::Main, &["a.acq"]);
    fixture.config.timings.field_settle = Duration::from_millis(40);
    fixture.config.timings.key_gap = Duration::from_millis(20);
    fixture.config.analysis.max_segments = 1;

    let (_report, desktop, _operator, _log) = fixture.run(
        fixture.desktop(&[Element::ContinuePopup]),
        FakeRecognizer::verified(),
        RunOptions::default(),
    );

    let field = center_of(Element::SegmentTimeField);
    let click = desktop
        .actions
        .iter()
        .position(|a| *a == Action::Click(field))
        .unwrap();
    assert_eq!(desktop.actions[click + 1], Action::DoubleClick(field));
    assert!(matches!(desktop.actions[click + 2], Action::Type('6')));

    let settle = desktop.stamps[click + 1] - desktop.stamps[click];
    let gap = desktop.stamps[click + 2] - desktop.stamps[click + 1];
    assert!(settle >= Duration::from_millis(40), "{settle:?}");
    assert!(gap >= Duration::from_millis(20), "{gap:?}");
}

#[test]
fn test_main_variant_escalates_missing_element() {
    let fixture = Fixture::new("missing-main", Variant::Main, &["a.acq"]);
    let desktop = fixture.desktop(&[Element::AnalyzeButton, Element::ContinuePopup]);

    let (report, desktop, operator, log) =
        fixture.run(desktop, FakeRecognizer::verified(), RunOptions::default());

    assert!(report.files[0].outcome.is_exported());
    assert_eq!(operator.pauses.len(), 1);
    assert!(operator.pauses[0].contains("Could not find Analyze"));
    assert_eq!(desktop.beeps(), 1);
    assert_eq!(log.stats().elements_missed, 1);
    // The absent pop-up is optional and never counted
    assert_eq!(log.stats().manual_interventions, 1);
}

#[test]
fn test_demo_variant_reports_missing_element_silently() {
    let mut fixture = Fixture::new("missing-demo", Variant::Demo, &["demo.mwi", "other.acq"]);
    fixture.config.analysis.max_segments = 2;
    let desktop = fixture.desktop(&[Element::AddButton, Element::ContinuePopup]);

    let (report, desktop, operator, log) =
        fixture.run(desktop, FakeRecognizer::verified(), RunOptions::default());

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file, "demo.mwi");
    assert_eq!(
        report.files[0].outcome,
        FileOutcome::Exported {
            segments_checked: 2,
            flagged_segments: vec![],
        }
    );
    assert!(operator.pauses.is_empty());
    assert_eq!(desktop.beeps(), 0);
    assert_eq!(log.stats().elements_missed, 1);

    assert_eq!(desktop.clicks_at(center_of(Element::EventOk)), 1);
    assert_eq!(desktop.clicks_at(center_of(Element::EventOkSecond)), 1);
}

#[test]
fn test_empty_folder_closes_window_on_main() {
    let fixture = Fixture::new("empty-main", Variant::Main, &["readme.txt"]);
    let (report, desktop, operator, _log) =
        fixture.run(fixture.desktop(&[]), FakeRecognizer::verified(), RunOptions::default());

    assert!(report.files.is_empty());
    assert!(report.finished_at.is_some());
    assert_eq!(desktop.hotkeys(), vec!["alt+f4"]);
    assert!(operator.pauses.is_empty());
}

#[test]
fn test_empty_folder_on_demo_just_ends() {
    let fixture = Fixture::new("empty-demo", Variant::Demo, &[]);
    let (report, desktop, _operator, _log) =
        fixture.run(fixture.desktop(&[]), FakeRecognizer::verified(), RunOptions::default());

    assert!(report.files.is_empty());
    assert!(desktop.actions.is_empty());
}

#[test]
fn test_single_file_option() {
    let fixture = Fixture::new("single", Variant::Main, &["a.acq", "b.acq", "c.acq"]);
    let options = RunOptions {
        launch: false,
        only_file: Some("b.acq".to_string()),
    };
    let (report, _desktop, _operator, log) = fixture.run(
        fixture.desktop(&[Element::ContinuePopup]),
        FakeRecognizer::verified(),
        options,
    );

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file, "b.acq");
    assert_eq!(log.stats().files_found, 1);
}

#[test]
fn test_launch_places_window_and_clears_demo_dialogs() {
    let fixture = Fixture::new("launch", Variant::Demo, &[]);
    let mut desktop = fixture.desktop(&[]);
    desktop.place_fails = true;
    let options = RunOptions {
        launch: true,
        only_file: None,
    };

    let (_report, desktop, operator, _log) =
        fixture.run(desktop, FakeRecognizer::verified(), options);

    assert_eq!(
        desktop.actions[0],
        Action::Launch(fixture.config.app.executable.clone())
    );
    assert_eq!(
        desktop.actions[1],
        Action::Place(fixture.config.app.window_title.clone())
    );
    // Placement failure is only a warning
    assert_eq!(desktop.clicks_at(center_of(Element::DemoMode)), 1);
    assert_eq!(desktop.clicks_at(center_of(Element::DemoContinue)), 1);
    assert!(operator.pauses.is_empty());
}

#[test]
fn test_stop_request_ends_run_before_first_file() {
    let fixture = Fixture::new("stop", Variant::Main, &["a.acq"]);
    let log = create_shared_log();
    let mut session = fixture.session(
        fixture.desktop(&[]),
        FakeRecognizer::verified(),
        log.clone(),
        Arc::new(AtomicBool::new(true)),
    );

    let report = session.run(&RunOptions::default()).unwrap();
    assert!(report.files.is_empty());
    assert!(session.automator().desktop().actions.is_empty());
    assert_eq!(log.stats().files_found, 1);
}

#[test]
fn test_missing_input_folder_is_an_error() {
    let mut fixture = Fixture::new("no-input", Variant::Main, &[]);
    fixture.config.input_folder = fixture.dir.join("does-not-exist");
    let mut session = fixture.session(
        fixture.desktop(&[]),
        FakeRecognizer::verified(),
        create_shared_log(),
        Arc::new(AtomicBool::new(false)),
    );
    assert!(session.run(&RunOptions::default()).is_err());
}

#[test]
fn test_templates_are_distinct_on_screen() {
    // Every element must match only at its own position on the fake screen.
    let fixture = Fixture::new("layout", Variant::Main, &[]);
    let desktop = fixture.desktop(&[]);
    let screen = imageops::grayscale(&desktop.screen);
    let mut seen = HashSet::new();
    let mut positions = HashMap::new();
    for element in Element::ALL {
        let hit = hrv_autopilot::vision::locate(&screen, &template_for(element), 0.9, 1)
            .unwrap()
            .unwrap();
        assert_eq!(hit.center, center_of(element), "{element}");
        assert!(seen.insert(hit.center));
        positions.insert(element, hit.center);
    }
    assert_eq!(positions.len(), Element::ALL.len());
}
