//! Substring checks on recognized dialog text.

use serde::{Deserialize, Serialize};

/// One labelled value that must appear in the recognized text.
///
/// An empty `expected` value means the field should be left unassigned; it
/// always holds because an empty dropdown produces no text to look for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    pub label: String,
    pub expected: String,
}

impl Expectation {
    pub fn new(label: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            expected: expected.into(),
        }
    }

    pub fn holds(&self, text: &str) -> bool {
        text.contains(&self.expected)
    }
}

/// Channel map with only the ECG channel assigned.
pub fn default_channel_map() -> Vec<Expectation> {
    vec![
        Expectation::new("ECG", "ECG"),
        Expectation::new("Z0", ""),
        Expectation::new("dZdt", ""),
        Expectation::new("Resp", ""),
    ]
}

/// Outcome of checking a text against a set of expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextCheck {
    /// Expectations that did not hold, in the order given
    pub failures: Vec<Expectation>,
}

impl TextCheck {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Check every expectation against `text`.
pub fn check_text(text: &str, expectations: &[Expectation]) -> TextCheck {
    TextCheck {
        failures: expectations
            .iter()
            .filter(|e| !e.holds(text))
            .cloned()
            .collect(),
    }
}
