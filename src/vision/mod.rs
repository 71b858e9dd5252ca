//! Screen inspection: template matching, OCR and pixel heuristics.

pub mod matcher;
pub mod ocr;
pub mod text;
pub mod yellow;

// Re-export commonly used types
pub use matcher::{best_match, locate, Match, TemplateError};
pub use ocr::{OcrError, Tesseract, TextRecognizer};
pub use text::{check_text, default_channel_map, Expectation, TextCheck};
pub use yellow::{YellowDetector, YellowReport, YellowRule};
