//! Yellow R-peak artifact detection.
//!
//! The analysis application paints R-peaks that need manual correction in
//! yellow. A segment is flagged when the share of yellow pixels in the ECG
//! plot region exceeds a small threshold.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// RGB bounds that classify a pixel as yellow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YellowRule {
    /// Red must be strictly above this
    pub red_min: u8,
    /// Green must be strictly above this
    pub green_min: u8,
    /// Blue must be strictly below this
    pub blue_max: u8,
}

impl Default for YellowRule {
    fn default() -> Self {
        Self {
            red_min: 180,
            green_min: 180,
            blue_max: 100,
        }
    }
}

impl YellowRule {
    pub fn matches(&self, r: u8, g: u8, b: u8) -> bool {
        r > self.red_min && g > self.green_min && b < self.blue_max
    }
}

/// Detector configuration: pixel rule plus the flagging ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YellowDetector {
    pub rule: YellowRule,
    /// Segments with a yellow ratio strictly above this are flagged
    pub threshold: f64,
}

impl Default for YellowDetector {
    fn default() -> Self {
        Self {
            rule: YellowRule::default(),
            threshold: 0.0001,
        }
    }
}

/// Result of scanning one segment screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YellowReport {
    pub yellow_pixels: u64,
    pub total_pixels: u64,
    pub ratio: f64,
    pub flagged: bool,
}

impl YellowDetector {
    pub fn new(rule: YellowRule, threshold: f64) -> Self {
        Self { rule, threshold }
    }

    /// Count yellow pixels and decide whether the segment needs editing.
    pub fn inspect(&self, image: &RgbaImage) -> YellowReport {
        let total_pixels = image.width() as u64 * image.height() as u64;
        let yellow_pixels = image
            .pixels()
            .filter(|Rgba([r, g, b, _])| self.rule.matches(*r, *g, *b))
            .count() as u64;

        let ratio = if total_pixels == 0 {
            0.0
        } else {
            yellow_pixels as f64 / total_pixels as f64
        };

        YellowReport {
            yellow_pixels,
            total_pixels,
            ratio,
            flagged: ratio > self.threshold,
        }
    }
}
