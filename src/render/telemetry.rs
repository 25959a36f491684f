//! Debug telemetry for reflow passes

use crate::document::{BlockId, BlockKind};
use crate::error::Violation;
use crate::layout::{BlockIndex, PageBand, PageBands};
use crate::rules::CorrectiveAction;
use serde::Serialize;
use std::fmt;

/// Per-pass counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassCounters {
    pub pushed_blocks: usize,
    pub more_count: usize,
    pub contd_count: usize,
    pub unresolved_blocks: usize,
    pub push_exhausted: usize,
}

impl PassCounters {
    pub fn tally(actions: &[CorrectiveAction], violations: &[Violation]) -> Self {
        let mut counters = Self::default();
        for action in actions {
            match action {
                CorrectiveAction::PushToNextPage { .. } => counters.pushed_blocks += 1,
                CorrectiveAction::MoreMarker { .. } => counters.more_count += 1,
                CorrectiveAction::ContdMarker { .. } => counters.contd_count += 1,
            }
        }
        for violation in violations {
            match violation {
                Violation::UnresolvedBlockPosition { .. } => counters.unresolved_blocks += 1,
                Violation::PushExhausted { .. } => counters.push_exhausted += 1,
            }
        }
        counters
    }
}

/// One row of the block-assignment table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAssignment {
    pub id: BlockId,
    pub kind: BlockKind,
    pub top: f32,
    pub bottom: f32,
    pub start_page: usize,
    pub end_page: usize,
}

/// Everything a debug overlay needs to explain a pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassTelemetry {
    pub generation: u64,
    pub bands: Vec<PageBand>,
    pub blocks: Vec<BlockAssignment>,
    pub counters: PassCounters,
    pub violations: Vec<Violation>,
}

impl PassTelemetry {
    pub fn capture(
        generation: u64,
        bands: &PageBands,
        index: &BlockIndex<'_>,
        counters: PassCounters,
        violations: &[Violation],
    ) -> Self {
        Self {
            generation,
            bands: bands.as_slice().to_vec(),
            blocks: index
                .iter()
                .map(|b| BlockAssignment {
                    id: b.id,
                    kind: b.kind,
                    top: b.rect.top,
                    bottom: b.rect.bottom,
                    start_page: b.start_page,
                    end_page: b.end_page,
                })
                .collect(),
            counters,
            violations: violations.to_vec(),
        }
    }
}

impl fmt::Display for PassTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pass {}", self.generation)?;
        writeln!(f, "{:>5} {:>10} {:>10}", "page", "top", "bottom")?;
        for band in &self.bands {
            writeln!(f, "{:>5} {:>10.1} {:>10.1}", band.page_index, band.top, band.bottom)?;
        }
        writeln!(
            f,
            "{:>6} {:<14} {:>10} {:>10} {:>6}",
            "block", "kind", "top", "bottom", "pages"
        )?;
        for row in &self.blocks {
            writeln!(
                f,
                "{:>6} {:<14} {:>10.1} {:>10.1} {:>3}-{}",
                row.id.0,
                row.kind.type_name(),
                row.top,
                row.bottom,
                row.start_page,
                row.end_page
            )?;
        }
        let c = &self.counters;
        write!(
            f,
            "pushed={} more={} contd={} unresolved={} exhausted={}",
            c.pushed_blocks, c.more_count, c.contd_count, c.unresolved_blocks, c.push_exhausted
        )
    }
}
