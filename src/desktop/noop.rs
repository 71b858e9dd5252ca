//! Non-Windows (noop) desktop backend.
//!
//! The target application only exists on Windows. This backend lets the crate
//! and the offline commands build elsewhere; every screen operation fails with
//! [`DesktopError::Unsupported`].

use crate::desktop::types::{Desktop, DesktopError, Key, Point, Region};
use image::RgbaImage;
use std::path::Path;

/// A desktop that cannot see or touch anything.
#[derive(Debug, Default)]
pub struct NoopDesktop;

impl NoopDesktop {
    pub fn new() -> Self {
        Self
    }
}

impl Desktop for NoopDesktop {
    fn launch(&mut self, _executable: &Path) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("launching the analysis application"))
    }

    fn place_window(&mut self, _title: &str, _geometry: Region) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("window placement"))
    }

    fn capture(&mut self, _region: Option<Region>) -> Result<RgbaImage, DesktopError> {
        Err(DesktopError::Unsupported("screen capture"))
    }

    fn click(&mut self, _at: Point) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("mouse input"))
    }

    fn double_click(&mut self, _at: Point) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("mouse input"))
    }

    fn press(&mut self, _key: Key) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("keyboard input"))
    }

    fn hotkey(&mut self, _keys: &[Key]) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("keyboard input"))
    }

    fn type_char(&mut self, _ch: char) -> Result<(), DesktopError> {
        Err(DesktopError::Unsupported("keyboard input"))
    }

    fn beep(&mut self) {
        // Terminal bell is the closest thing to an alert here.
        eprint!("\x07");
    }
}

/// Live automation is only possible on Windows.
pub fn check_support() -> bool {
    false
}
