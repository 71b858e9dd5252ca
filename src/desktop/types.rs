//! Screen geometry, keys and the desktop seam used by the automation.
//!
//! Coordinates are absolute screen pixels on the primary monitor.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An absolute screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by an offset.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A screen rectangle given as left/top corner plus size.
///
/// Also used for window geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Middle point of the rectangle.
    pub fn center(&self) -> Point {
        Point::new(
            self.left + (self.width / 2) as i32,
            self.top + (self.height / 2) as i32,
        )
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Keys the workflow needs to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Delete,
    F4,
    Control,
    Shift,
    Alt,
    /// A letter or digit key, pressed as a virtual key (for shortcuts).
    Char(char),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Enter => write!(f, "enter"),
            Key::Delete => write!(f, "delete"),
            Key::F4 => write!(f, "f4"),
            Key::Control => write!(f, "ctrl"),
            Key::Shift => write!(f, "shift"),
            Key::Alt => write!(f, "alt"),
            Key::Char(c) => write!(f, "{}", c.to_ascii_lowercase()),
        }
    }
}

/// Format a key chord as `ctrl+shift+w`.
pub fn chord_label(keys: &[Key]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Everything the automation does to the machine it runs on.
///
/// Implemented per platform; tests drive the workflow with a scripted
/// implementation.
pub trait Desktop {
    /// Start the target application without waiting for it.
    fn launch(&mut self, executable: &Path) -> Result<(), DesktopError>;

    /// Move and resize the first visible window whose title contains `title`.
    fn place_window(&mut self, title: &str, geometry: Region) -> Result<(), DesktopError>;

    /// Capture a region of the screen, or the whole primary screen.
    fn capture(&mut self, region: Option<Region>) -> Result<RgbaImage, DesktopError>;

    fn click(&mut self, at: Point) -> Result<(), DesktopError>;

    fn double_click(&mut self, at: Point) -> Result<(), DesktopError>;

    fn press(&mut self, key: Key) -> Result<(), DesktopError>;

    /// Press the keys in order, then release them in reverse order.
    fn hotkey(&mut self, keys: &[Key]) -> Result<(), DesktopError>;

    /// Type a single character as text input.
    fn type_char(&mut self, ch: char) -> Result<(), DesktopError>;

    /// Audible alert for the operator. Best effort.
    fn beep(&mut self);
}

/// Errors raised by a desktop backend.
#[derive(Debug)]
pub enum DesktopError {
    /// The operation is not available on this platform.
    Unsupported(&'static str),
    LaunchFailed(String),
    WindowNotFound(String),
    CaptureFailed(String),
    InputRejected(String),
}

impl std::fmt::Display for DesktopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesktopError::Unsupported(op) => {
                write!(f, "{op} is not supported on this platform")
            }
            DesktopError::LaunchFailed(e) => write!(f, "Failed to launch application: {e}"),
            DesktopError::WindowNotFound(title) => {
                write!(f, "No window with title containing '{title}'")
            }
            DesktopError::CaptureFailed(e) => write!(f, "Screen capture failed: {e}"),
            DesktopError::InputRejected(e) => write!(f, "Input injection failed: {e}"),
        }
    }
}

impl std::error::Error for DesktopError {}
