//! The per-file loop.
//!
//! Each acquisition file walks a fixed sequence of steps. A failed channel map
//! check sends the file to a manual fix and on to the next file; every other
//! problem is handed to the operator and the sequence carries on.

use super::automator::{Automator, MatchOptions};
use super::elements::Element;
use super::error::AutomationError;
use super::files::{discover_files, file_label, select_file};
use super::operator::Operator;
use crate::desktop::{Desktop, Key, Region};
use crate::report::{FileOutcome, FileRecord, RunReport, SkipReason};
use crate::vision::{Expectation, TextRecognizer};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a file is in its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStep {
    Open,
    VerifyChannelMap,
    ManualFix,
    AddEventChannel,
    ConfigureParameters,
    RunAnalysis,
    CheckSegments,
    Export,
    CloseAndReopen,
    Done,
}

/// What a run should do besides the file loop.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Start the application and wait for it before the first file
    pub launch: bool,
    /// Process only the file with this name
    pub only_file: Option<String>,
}

/// Segment results gathered during the artifact check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SegmentTally {
    checked: u32,
    flagged: Vec<u32>,
}

/// One automation run over the input folder.
pub struct Session<D, O, R> {
    automator: Automator<D, O, R>,
    stop: Arc<AtomicBool>,
}

impl<D, O, R> Session<D, O, R>
where
    D: Desktop,
    O: Operator,
    R: TextRecognizer,
{
    pub fn new(automator: Automator<D, O, R>, stop: Arc<AtomicBool>) -> Self {
        Self { automator, stop }
    }

    pub fn automator(&self) -> &Automator<D, O, R> {
        &self.automator
    }

    pub fn into_automator(self) -> Automator<D, O, R> {
        self.automator
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Launch if asked, then process every matching file in the input folder.
    ///
    /// Only a failed launch or an unreadable input folder is an error; all
    /// other failures end up with the operator.
    pub fn run(&mut self, options: &RunOptions) -> Result<RunReport, AutomationError> {
        let mut report = RunReport::new(self.automator.config());

        if options.launch {
            self.launch_app()?;
        }

        let config = self.automator.config();
        let extension = config.variant.extension();
        let files = discover_files(&config.input_folder, extension)?;
        let files = select_file(files, options.only_file.as_deref());
        self.automator.log().record_files_found(files.len() as u64);

        if files.is_empty() {
            println!("No .{extension} files found in folder!");
            if self.automator.config().variant.closes_window_when_idle() {
                let a = &mut self.automator;
                a.safe("close window", |a| a.hotkey(&[Key::Alt, Key::F4]));
                a.sleep(a.config().timings.window_close);
            }
            report.finish();
            return Ok(report);
        }

        println!("Found {} .{extension} files to process:", files.len());
        for file in &files {
            println!("  {}", file_label(file));
        }

        for file in &files {
            if self.stop_requested() {
                println!("\nStop requested, ending run.");
                break;
            }

            let started_at = Utc::now();
            let outcome = self.process_file(file);
            match &outcome {
                FileOutcome::Exported { .. } => self.automator.log().record_file_exported(),
                FileOutcome::Skipped { reason } => {
                    info!(file = %file_label(file), %reason, "file skipped");
                    self.automator.log().record_file_skipped();
                }
            }
            report.push(FileRecord {
                file: file_label(file),
                outcome,
                started_at,
                finished_at: Utc::now(),
            });
        }

        println!("\nAll files processed. Workflow finished.");
        report.finish();
        Ok(report)
    }

    fn launch_app(&mut self) -> Result<(), AutomationError> {
        let app = self.automator.config().app.clone();
        println!("Starting MindWare HRV...");
        self.automator.desktop_mut().launch(&app.executable)?;
        self.automator.sleep(app.launch_wait);

        if let Some(geometry) = app.window_geometry {
            match self
                .automator
                .desktop_mut()
                .place_window(&app.window_title, geometry)
            {
                Ok(()) => println!("Window repositioned for consistent automation."),
                Err(e) => {
                    warn!(error = %e, "window placement failed");
                    println!("WARNING: Could not reposition window: {e}");
                }
            }
        }

        if self.automator.config().variant.has_startup_dialogs() {
            let timings = self.automator.config().timings.clone();
            self.automator.click_element(Element::DemoMode);
            self.automator.sleep(timings.demo_mode);
            self.automator.click_element(Element::DemoContinue);
            self.automator.sleep(timings.demo_continue);
        }
        Ok(())
    }

    /// Take one file from opening to export, or to an early skip.
    pub fn process_file(&mut self, file: &Path) -> FileOutcome {
        let name = file_label(file);
        let mut step = FileStep::Open;
        let mut tally = SegmentTally::default();
        let mut skipped = None;

        while step != FileStep::Done {
            debug!(file = %name, ?step, "step");
            step = match step {
                FileStep::Open => {
                    self.open_file(&name);
                    FileStep::VerifyChannelMap
                }
                FileStep::VerifyChannelMap => {
                    if self.verify_channel_map() {
                        FileStep::AddEventChannel
                    } else {
                        FileStep::ManualFix
                    }
                }
                FileStep::ManualFix => {
                    self.manual_channel_fix();
                    skipped = Some(SkipReason::ChannelMapMismatch);
                    FileStep::Done
                }
                FileStep::AddEventChannel => {
                    self.add_event_channel();
                    FileStep::ConfigureParameters
                }
                FileStep::ConfigureParameters => {
                    self.configure_parameters();
                    FileStep::RunAnalysis
                }
                FileStep::RunAnalysis => {
                    self.run_analysis();
                    FileStep::CheckSegments
                }
                FileStep::CheckSegments => match self.check_segments() {
                    Some(result) => {
                        tally = result;
                        FileStep::Export
                    }
                    None => {
                        skipped = Some(SkipReason::Interrupted);
                        FileStep::Done
                    }
                },
                FileStep::Export => {
                    self.export(&name);
                    FileStep::CloseAndReopen
                }
                FileStep::CloseAndReopen => {
                    self.close_and_reopen();
                    FileStep::Done
                }
                FileStep::Done => FileStep::Done,
            };
        }

        match skipped {
            Some(reason) => FileOutcome::Skipped { reason },
            None => FileOutcome::Exported {
                segments_checked: tally.checked,
                flagged_segments: tally.flagged,
            },
        }
    }

    fn open_file(&mut self, name: &str) {
        println!("\nStarting analysis for file: {name}");
        let a = &mut self.automator;
        let folder = a.config().input_folder.display().to_string();

        a.safe("folder path", |a| {
            a.replace_field_text(Element::FolderPathField, &folder)?;
            a.press(Key::Enter)
        });
        a.safe("file name", |a| {
            a.replace_field_text(Element::FilenameField, name)?;
            a.press(Key::Enter)
        });

        println!("File opened successfully");
        let t = &a.config().timings;
        let (open, appear) = (t.file_open, t.channel_map_appear);
        a.sleep(open);
        a.sleep(appear);
    }

    fn verify_channel_map(&mut self) -> bool {
        let region = self.automator.config().screen.channel_map;
        let expected = self.automator.config().channel_map.clone();

        if !self.text_matches("channel map", region, "channel_map_check.png", &expected) {
            return false;
        }

        println!("Channel Map verified successfully.");
        let a = &mut self.automator;
        a.click_element(Element::OkChannelMap);
        a.sleep(a.config().timings.dialog_close);
        true
    }

    /// OCR check whose failures count as a mismatch, leaving escalation to the caller.
    fn text_matches(
        &mut self,
        check: &str,
        region: Region,
        file_name: &str,
        expected: &[Expectation],
    ) -> bool {
        match self.automator.verify_text(region, file_name, expected) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(check, error = %e, "text check failed");
                println!("ERROR: {e}");
                false
            }
        }
    }

    fn manual_channel_fix(&mut self) {
        let a = &mut self.automator;
        a.desktop_mut().beep();
        println!("Channel Map verification failed.");
        a.pause_for_fix(
            "Please refine the Channel Map manually, then press ENTER in the console to continue...",
        );

        let confidence = a.config().matching.manual_fix_confidence;
        let options = MatchOptions::standard(a.config()).with_confidence(confidence);
        a.click_element_with(Element::OkChannelMap, options);
        a.sleep(a.config().timings.dialog_close);
    }

    fn add_event_channel(&mut self) {
        println!("Adding Digital Event Channel...");
        let a = &mut self.automator;
        let timings = a.config().timings.clone();

        a.click_element(Element::AddButton);
        a.sleep(timings.dialog_close);

        let region = a.config().screen.event_channel;
        let expected = [Expectation::new(
            "Event Channel",
            a.config().event_channel_text.clone(),
        )];
        let present =
            self.text_matches("event channel", region, "digital_event_check.png", &expected);

        let a = &mut self.automator;
        if present {
            println!("Digital Event Channel already set.");
        } else {
            a.desktop_mut().beep();
            println!("Digital Event Channel not set.");
            a.pause_for_fix(
                "Please set the Digital Event Channel manually, then press ENTER in the console to continue...",
            );
        }

        a.click_element(Element::EventOk);
        a.sleep(timings.event_ok_gap);
        a.click_element(Element::second_event_ok(a.config().variant));
        a.sleep(timings.dialog_close);

        let popup = MatchOptions::optional(a.config());
        if a.click_element_with(Element::ContinuePopup, popup) {
            println!("Pop-up detected: pressed Continue.");
        } else {
            println!("No pop-up detected, continuing workflow.");
        }
    }

    fn configure_parameters(&mut self) {
        let a = &mut self.automator;
        let params = a.config().analysis;
        let timings = a.config().timings.clone();
        let output = a.config().output_folder.display().to_string();

        let segment_time = params.segment_time_secs.to_string();
        a.safe("segment time", |a| {
            a.set_numeric_field(Element::SegmentTimeField, &segment_time)
        });
        println!("Set segment time to {} seconds", params.segment_time_secs);
        a.sleep(timings.dialog_close);

        a.click_element(Element::HrvCalibrationTab);
        a.sleep(timings.tab_switch);
        a.click_element(Element::CalculationEntire);
        a.sleep(timings.tab_switch);

        let lf = params.lf_filter_hz.to_string();
        a.safe("LF filter", |a| a.set_numeric_field(Element::LfField, &lf));
        println!("Set LF Band filter to {} Hz", params.lf_filter_hz);
        a.sleep(timings.dialog_close);

        let hf = params.hf_filter_hz.to_string();
        a.safe("HF filter", |a| a.set_numeric_field(Element::HfField, &hf));
        println!("Set HF/RSA Band filter to {} Hz", params.hf_filter_hz);
        a.sleep(timings.dialog_close);

        a.click_element(Element::RpeakTab);
        a.sleep(timings.tab_switch);
        a.click_element(Element::AdditionalSettingsTab);
        a.sleep(timings.tab_switch);
        a.click_element(Element::UseDefaultDirectory);
        a.click_element(Element::UseDefaultDirectory);
        a.sleep(timings.tab_switch);

        a.safe("output folder", |a| {
            a.wait_and_click(Element::FolderField, MatchOptions::standard(a.config()))?;
            a.type_text(&output)?;
            a.press(Key::Enter)?;
            a.sleep(timings.tab_switch);
            a.press(Key::Enter)
        });
        println!("Set output folder");
        a.sleep(timings.dialog_close);
    }

    fn run_analysis(&mut self) {
        let a = &mut self.automator;
        a.click_element(Element::AnalyzeButton);
        println!("Analysis started successfully");
        a.sleep(a.config().timings.analysis_render);
    }

    /// Walk the segments, pausing on every one with yellow R-peaks.
    ///
    /// `None` when a stop was requested before all segments were seen.
    fn check_segments(&mut self) -> Option<SegmentTally> {
        let max_segments = self.automator.config().analysis.max_segments;
        let next = self.automator.config().screen.next_segment;
        let timings = self.automator.config().timings.clone();
        let mut tally = SegmentTally::default();

        for segment in 1..=max_segments {
            if self.stop_requested() {
                println!("\nStop requested during segment checks.");
                return None;
            }

            let a = &mut self.automator;
            println!("\nChecking segment {segment}...");
            if let Some(report) = a.safe("segment check", |a| a.segment_yellow_check()) {
                tally.checked += 1;
                a.log().record_segment(report.flagged);
                if report.flagged {
                    tally.flagged.push(segment);
                    println!("Yellow peaks detected. Clicking 'Edit R's'...");
                    a.desktop_mut().beep();
                    a.click_element(Element::EditRsButton);
                    a.sleep(timings.edit_window_open);
                    a.pause_for_fix(
                        ">>> Fix R-peaks manually, close the Edit window, then press Enter to continue...",
                    );
                } else {
                    println!("Segment is clean. No action needed.");
                }
            }

            a.safe("next segment", |a| a.click_at(next));
            a.sleep(timings.next_segment);
        }
        Some(tally)
    }

    fn export(&mut self, name: &str) {
        println!("\nAll segments checked. Exporting results...");
        let a = &mut self.automator;
        let timings = a.config().timings.clone();
        let output = a.config().output_folder.display().to_string();

        a.safe("export shortcut", |a| {
            a.hotkey(&[Key::Control, Key::Shift, Key::Char('w')])
        });
        a.sleep(timings.export_dialog);

        a.safe("export folder", |a| {
            a.replace_field_text(Element::OutputFolderField, &output)?;
            a.press(Key::Enter)?;
            a.sleep(timings.export_confirm);
            a.press(Key::Enter)?;
            a.sleep(timings.export_write);
            a.press(Key::Enter)
        });
        println!("Export complete for {name}");
    }

    fn close_and_reopen(&mut self) {
        let a = &mut self.automator;
        let timings = a.config().timings.clone();
        a.safe("close analysis window", |a| a.hotkey(&[Key::Alt, Key::F4]));
        a.sleep(timings.window_close);
        a.safe("open dialog", |a| a.hotkey(&[Key::Control, Key::Char('o')]));
        a.sleep(timings.reopen);
    }
}
