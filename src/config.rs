//! Reflow configuration

use crate::error::ReflowError;
use crate::layout::FontMetrics;
use serde::{Deserialize, Serialize};

/// Tunables for a reflow pass. Units are the host's layout units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReflowConfig {
    /// How close to a page top a transition may start before it is pushed
    pub edge_tolerance: f32,
    /// How close to a page bottom a scene heading may end before it is orphaned
    pub orphan_tolerance: f32,
    /// Room a character cue needs below it for the first dialogue line
    pub min_dialogue_height: f32,
    /// Subtracted from every spacer height
    pub safety_margin: f32,
    /// Dialogue column width, used when the host cannot report split offsets
    pub dialogue_width: f32,
    pub font: FontMetrics,
    pub more_text: String,
    /// Appended to the repeated character cue
    pub contd_suffix: String,
    pub rules: RuleToggles,
    /// Consecutive unstable-geometry frames retried before parking
    pub max_unstable_retries: u32,
    /// Collect band/block tables and counters on every pass
    pub telemetry: bool,
}

impl Default for ReflowConfig {
    fn default() -> Self {
        Self {
            edge_tolerance: 6.0,
            orphan_tolerance: 40.0,
            min_dialogue_height: 24.0, // two 12pt lines
            safety_margin: 2.0,
            dialogue_width: 252.0, // 3.5in
            font: FontMetrics::default(),
            more_text: "(MORE)".to_string(),
            contd_suffix: " (CONT'D)".to_string(),
            rules: RuleToggles::default(),
            max_unstable_retries: 3,
            telemetry: false,
        }
    }
}

impl ReflowConfig {
    /// Parse a (possibly partial) JSON config; missing fields keep defaults
    pub fn from_json(json: &str) -> Result<Self, ReflowError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Per-rule switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleToggles {
    pub transition_at_top: bool,
    pub scene_heading_orphan: bool,
    pub character_orphan: bool,
    pub parenthetical_grouping: bool,
    pub dialogue_continuation: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            transition_at_top: true,
            scene_heading_orphan: true,
            character_orphan: true,
            parenthetical_grouping: true,
            dialogue_continuation: true,
        }
    }
}
