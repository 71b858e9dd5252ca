//! Desktop access for the automation.
//!
//! This module provides the platform-specific implementations for capturing
//! the screen and injecting mouse and keyboard input.

pub mod types;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod noop;

// Re-export commonly used types
pub use types::{chord_label, Desktop, DesktopError, Key, Point, Region};

#[cfg(target_os = "windows")]
pub use windows::{check_support, WindowsDesktop};

/// Platform desktop type alias
#[cfg(target_os = "windows")]
pub type PlatformDesktop = WindowsDesktop;

#[cfg(not(target_os = "windows"))]
pub use noop::{check_support, NoopDesktop};

/// Platform desktop type alias
#[cfg(not(target_os = "windows"))]
pub type PlatformDesktop = NoopDesktop;
