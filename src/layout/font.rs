//! Font metrics for dialogue line estimation

use serde::{Deserialize, Serialize};

/// Metrics needed to estimate how dialogue wraps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FontMetrics {
    /// Line height in layout units
    pub line_height: f32,
    /// Widths of ASCII characters (0-127); empty means monospace
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub char_widths: Vec<f32>,
    /// Width for anything not covered by `char_widths`
    pub default_width: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        // Courier 12pt at 72 units per inch
        Self {
            line_height: 12.0,
            char_widths: Vec::new(),
            default_width: 7.2,
        }
    }
}

impl FontMetrics {
    pub fn new(line_height: f32, char_widths: Vec<f32>, default_width: f32) -> Self {
        Self {
            line_height,
            char_widths,
            default_width,
        }
    }

    /// Monospace metrics
    pub fn monospace(line_height: f32, char_width: f32) -> Self {
        Self::new(line_height, Vec::new(), char_width)
    }

    /// Get width of a character
    pub fn width(&self, c: char) -> f32 {
        if c.is_ascii() {
            if let Some(w) = self.char_widths.get(c as usize) {
                return *w;
            }
        }
        self.default_width
    }
}
