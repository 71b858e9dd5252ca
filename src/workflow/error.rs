//! Errors raised while driving the analysis application.

use crate::desktop::DesktopError;
use crate::vision::{OcrError, TemplateError};
use std::path::PathBuf;

/// Anything a single automation action can fail with.
#[derive(Debug)]
pub enum AutomationError {
    Desktop(DesktopError),
    Ocr(OcrError),
    /// A reference image exists but cannot be matched against
    Template(PathBuf, TemplateError),
    /// A reference image or screenshot could not be read or written
    Image(String),
    Io(std::io::Error),
}

impl std::fmt::Display for AutomationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutomationError::Desktop(e) => write!(f, "Desktop error: {e}"),
            AutomationError::Ocr(e) => write!(f, "{e}"),
            AutomationError::Template(path, e) => write!(f, "{}: {e}", path.display()),
            AutomationError::Image(e) => write!(f, "Image error: {e}"),
            AutomationError::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for AutomationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AutomationError::Desktop(e) => Some(e),
            AutomationError::Ocr(e) => Some(e),
            AutomationError::Template(_, e) => Some(e),
            AutomationError::Image(_) => None,
            AutomationError::Io(e) => Some(e),
        }
    }
}

impl From<DesktopError> for AutomationError {
    fn from(e: DesktopError) -> Self {
        AutomationError::Desktop(e)
    }
}

impl From<OcrError> for AutomationError {
    fn from(e: OcrError) -> Self {
        AutomationError::Ocr(e)
    }
}

impl From<image::ImageError> for AutomationError {
    fn from(e: image::ImageError) -> Self {
        AutomationError::Image(e.to_string())
    }
}

impl From<std::io::Error> for AutomationError {
    fn from(e: std::io::Error) -> Self {
        AutomationError::Io(e)
    }
}
