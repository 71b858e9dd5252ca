//! Text recognition on saved screenshots.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Anything that can turn a screenshot file into text.
pub trait TextRecognizer {
    fn recognize(&self, image_path: &Path) -> Result<String, OcrError>;
}

/// Tesseract invoked as an external program.
#[derive(Debug, Clone)]
pub struct Tesseract {
    command: PathBuf,
    language: String,
}

impl Tesseract {
    pub fn new(command: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    /// Whether the command resolves to an executable, either as given or on `PATH`.
    pub fn is_installed(&self) -> bool {
        which::which(&self.command).is_ok()
    }
}

impl TextRecognizer for Tesseract {
    fn recognize(&self, image_path: &Path) -> Result<String, OcrError> {
        debug!(image = %image_path.display(), "running tesseract");
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => OcrError::Unavailable(self.command.clone()),
                _ => OcrError::Io(e.to_string()),
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// OCR errors.
#[derive(Debug)]
pub enum OcrError {
    /// The OCR executable could not be found
    Unavailable(PathBuf),
    Io(String),
    /// The engine ran but reported an error
    Failed(String),
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Unavailable(cmd) => {
                write!(f, "OCR engine not found at {}", cmd.display())
            }
            OcrError::Io(e) => write!(f, "IO error: {e}"),
            OcrError::Failed(e) => write!(f, "OCR failed: {e}"),
        }
    }
}

impl std::error::Error for OcrError {}
