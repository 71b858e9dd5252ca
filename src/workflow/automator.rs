//! Primitive actions against the analysis application.
//!
//! Every action that touches the screen goes through [`Automator`], which
//! owns the desktop, the operator and the recognizer, and knows how a
//! failure is escalated for the configured variant.

use super::elements::{Element, TemplateLibrary};
use super::error::AutomationError;
use super::operator::Operator;
use crate::config::Config;
use crate::desktop::{chord_label, Desktop, DesktopError, Key, Point, Region};
use crate::report::SharedRunLog;
use crate::vision::{check_text, locate, Expectation, TextRecognizer, YellowReport};
use image::{imageops, RgbaImage};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const FIX_PROMPT: &str = "Please fix the issue manually, then press ENTER in the console to continue...";

/// How hard to look for an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub confidence: f32,
    pub timeout: Duration,
    /// Optional elements are never escalated to the operator
    pub optional: bool,
}

impl MatchOptions {
    /// Regular element with the configured confidence and timeout.
    pub fn standard(config: &Config) -> Self {
        Self {
            confidence: config.matching.confidence,
            timeout: config.matching.timeout,
            optional: false,
        }
    }

    /// Pop-up that may or may not appear.
    pub fn optional(config: &Config) -> Self {
        Self {
            confidence: config.matching.optional_confidence,
            timeout: config.matching.optional_timeout,
            optional: true,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

pub struct Automator<D, O, R> {
    config: Config,
    desktop: D,
    operator: O,
    recognizer: R,
    templates: TemplateLibrary,
    log: SharedRunLog,
    /// Last position the pointer was sent to
    pointer: Option<Point>,
}

impl<D, O, R> Automator<D, O, R>
where
    D: Desktop,
    O: Operator,
    R: TextRecognizer,
{
    pub fn new(config: Config, desktop: D, operator: O, recognizer: R, log: SharedRunLog) -> Self {
        let templates = TemplateLibrary::new(&config.templates_dir);
        Self {
            config,
            desktop,
            operator,
            recognizer,
            templates,
            log,
            pointer: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    pub fn desktop_mut(&mut self) -> &mut D {
        &mut self.desktop
    }

    pub fn templates_mut(&mut self) -> &mut TemplateLibrary {
        &mut self.templates
    }

    pub fn log(&self) -> &SharedRunLog {
        &self.log
    }

    /// Give back the parts the automator was built from.
    pub fn into_parts(self) -> (D, O, R) {
        (self.desktop, self.operator, self.recognizer)
    }

    pub fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    /// Poll the screen for `element` until it matches or the timeout passes.
    ///
    /// The screen is captured at least once, so a zero timeout is a single
    /// look.
    pub fn find(
        &mut self,
        element: Element,
        options: MatchOptions,
    ) -> Result<Option<Point>, AutomationError> {
        let start = Instant::now();
        let downscale = self.config.matching.downscale;
        loop {
            let screen = imageops::grayscale(&self.desktop.capture(None)?);
            let template = self.templates.get(element)?;
            let found = match locate(&screen, template, options.confidence, downscale) {
                Ok(found) => found,
                Err(e) => return Err(AutomationError::Template(self.templates.path_of(element), e)),
            };

            if let Some(hit) = found {
                debug!(%element, score = hit.score, at = %hit.center, "element located");
                return Ok(Some(hit.center));
            }
            if start.elapsed() >= options.timeout {
                return Ok(None);
            }
            self.sleep(self.config.matching.poll_interval);
        }
    }

    /// Locate `element` and click its center.
    ///
    /// Returns `Ok(false)` when the element never showed up. The licensed
    /// build then hands over to the operator; the demo build only reports it.
    pub fn wait_and_click(
        &mut self,
        element: Element,
        options: MatchOptions,
    ) -> Result<bool, AutomationError> {
        if let Some(center) = self.find(element, options)? {
            self.click_at(center)?;
            println!("Clicked {element}");
            return Ok(true);
        }

        if options.optional {
            debug!(%element, "optional element absent");
            return Ok(false);
        }

        self.log.record_element_missed();
        warn!(%element, timeout = ?options.timeout, "element not found");
        if self.config.variant.escalates_missing_elements() {
            self.desktop.beep();
            self.pause_for_fix(&format!(
                "Could not find {element}. Please fix manually, then press ENTER to continue..."
            ));
        } else {
            println!(
                "ERROR: Could not find {element} within {} seconds.",
                options.timeout.as_secs_f32()
            );
        }
        Ok(false)
    }

    /// Click `element` with the configured defaults, inside [`Self::safe`].
    pub fn click_element(&mut self, element: Element) -> bool {
        let options = MatchOptions::standard(&self.config);
        self.click_element_with(element, options)
    }

    pub fn click_element_with(&mut self, element: Element, options: MatchOptions) -> bool {
        let label = element.to_string();
        self.safe(&label, |a| a.wait_and_click(element, options))
            .unwrap_or(false)
    }

    /// Run `action`; on error alert the operator and wait for a manual fix.
    ///
    /// The action's result is `None` after a failure.
    pub fn safe<T>(
        &mut self,
        label: &str,
        action: impl FnOnce(&mut Self) -> Result<T, AutomationError>,
    ) -> Option<T> {
        match action(self) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(action = label, error = %e, "action failed");
                self.desktop.beep();
                println!("ERROR: {e}");
                self.pause_for_fix(FIX_PROMPT);
                None
            }
        }
    }

    /// Count an escalation and block until the operator is done.
    pub fn pause_for_fix(&mut self, message: &str) {
        self.log.record_intervention();
        self.operator.pause(message);
    }

    pub fn click_at(&mut self, at: Point) -> Result<(), AutomationError> {
        debug!(%at, "click");
        self.desktop.click(at)?;
        self.pointer = Some(at);
        Ok(())
    }

    /// Double-click wherever the last click went.
    pub fn double_click_here(&mut self) -> Result<(), AutomationError> {
        let at = self.pointer.ok_or_else(|| {
            DesktopError::InputRejected("no pointer position to double-click at".to_string())
        })?;
        debug!(%at, "double click");
        self.desktop.double_click(at)?;
        Ok(())
    }

    pub fn press(&mut self, key: Key) -> Result<(), AutomationError> {
        debug!(%key, "press");
        self.desktop.press(key)?;
        Ok(())
    }

    pub fn hotkey(&mut self, keys: &[Key]) -> Result<(), AutomationError> {
        debug!(chord = %chord_label(keys), "hotkey");
        self.desktop.hotkey(keys)?;
        Ok(())
    }

    /// Type `text` one character at a time.
    pub fn type_text(&mut self, text: &str) -> Result<(), AutomationError> {
        debug!(len = text.chars().count(), "typing");
        for ch in text.chars() {
            self.desktop.type_char(ch)?;
            self.sleep(self.config.typing_interval);
        }
        Ok(())
    }

    /// Click a text field, clear it and type `text`. Enter is left to the caller.
    pub fn replace_field_text(
        &mut self,
        element: Element,
        text: &str,
    ) -> Result<(), AutomationError> {
        let gap = self.config.timings.key_gap;
        // Keys still go out if the field was not found; the operator may
        // have focused it by hand.
        self.wait_and_click(element, MatchOptions::standard(&self.config))?;
        self.sleep(self.config.timings.field_settle);
        self.hotkey(&[Key::Control, Key::Char('a')])?;
        self.sleep(gap);
        self.press(Key::Delete)?;
        self.sleep(gap);
        self.type_text(text)?;
        self.sleep(self.config.timings.field_settle);
        Ok(())
    }

    /// Click a numeric field, select its value by double-click, type and commit.
    pub fn set_numeric_field(&mut self, element: Element, value: &str) -> Result<(), AutomationError> {
        self.wait_and_click(element, MatchOptions::standard(&self.config))?;
        self.sleep(self.config.timings.field_settle);
        self.double_click_here()?;
        self.sleep(self.config.timings.key_gap);
        self.type_text(value)?;
        self.press(Key::Enter)?;
        Ok(())
    }

    /// Capture `region`, keep the screenshot as `file_name` and recognize its text.
    pub fn read_region(&mut self, region: Region, file_name: &str) -> Result<String, AutomationError> {
        let (path, _) = self.save_capture(region, file_name)?;
        let text = self.recognizer.recognize(&path)?;
        println!("Extracted text ({file_name}):");
        println!("{text}");
        Ok(text)
    }

    /// OCR `region` and check every expectation against it.
    ///
    /// Returns `Ok(false)` after printing each failing expectation.
    pub fn verify_text(
        &mut self,
        region: Region,
        file_name: &str,
        expectations: &[Expectation],
    ) -> Result<bool, AutomationError> {
        let text = self.read_region(region, file_name)?;
        let check = check_text(&text, expectations);
        for failure in &check.failures {
            println!(
                "ERROR: {} does not match expected value '{}'",
                failure.label, failure.expected
            );
        }
        Ok(check.passed())
    }

    /// Inspect the current segment's ECG plot for yellow R-peaks.
    pub fn segment_yellow_check(&mut self) -> Result<YellowReport, AutomationError> {
        self.sleep(self.config.timings.segment_settle);
        let region = self.config.screen.ecg_segment;
        let (_, image) = self.save_capture(region, "ecg_segment.png")?;
        let report = self.config.yellow.inspect(&image);
        println!("Yellow pixel ratio: {:.6}", report.ratio);
        Ok(report)
    }

    fn save_capture(
        &mut self,
        region: Region,
        file_name: &str,
    ) -> Result<(PathBuf, RgbaImage), AutomationError> {
        let image = self.desktop.capture(Some(region))?;
        std::fs::create_dir_all(&self.config.screenshot_dir)?;
        let path = self.config.screenshot_dir.join(file_name);
        image.save(&path)?;
        info!(path = %path.display(), %region, "screenshot saved");
        Ok((path, image))
    }
}
