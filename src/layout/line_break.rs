//! Dialogue line estimation
//!
//! Hosts that can map a y coordinate back to a document position should
//! implement [`GeometryPort::offset_at`](crate::layout::GeometryPort::offset_at).
//! When they cannot, the rule engine falls back to wrapping the dialogue text
//! itself and spreading the block's rendered height evenly over the lines.

use crate::layout::font::FontMetrics;
use smallvec::SmallVec;
use std::ops::Range;
use unicode_linebreak::{linebreaks, BreakOpportunity};
use unicode_segmentation::UnicodeSegmentation;

/// Where a block splits across a page boundary, as byte offsets into its text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPoint {
    /// End of the last content rendered on the earlier page
    pub last_on_page: usize,
    /// Start of the first content rendered on the following page
    pub first_on_next: usize,
}

/// Greedy line wrapper over UAX #14 break opportunities
pub struct LineEstimator<'a> {
    metrics: &'a FontMetrics,
    max_width: f32,
}

impl<'a> LineEstimator<'a> {
    pub fn new(metrics: &'a FontMetrics, max_width: f32) -> Self {
        Self { metrics, max_width }
    }

    /// Byte ranges of the wrapped lines. Always yields at least one line.
    pub fn lines(&self, text: &str) -> SmallVec<[Range<usize>; 8]> {
        let mut lines = SmallVec::new();
        let breaks: Vec<(usize, BreakOpportunity)> = linebreaks(text).collect();
        let mut next_break = 0;

        let mut line_start = 0;
        let mut x: f32 = 0.0;
        let mut last_break: Option<(usize, f32)> = None;

        for (byte_idx, grapheme) in text.grapheme_indices(true) {
            while next_break < breaks.len() && breaks[next_break].0 <= byte_idx {
                let (offset, opportunity) = breaks[next_break];
                next_break += 1;
                if offset != byte_idx || offset <= line_start {
                    continue;
                }
                match opportunity {
                    BreakOpportunity::Mandatory => {
                        lines.push(line_start..offset);
                        line_start = offset;
                        x = 0.0;
                        last_break = None;
                    }
                    BreakOpportunity::Allowed => last_break = Some((offset, x)),
                }
            }

            let width = self.grapheme_width(grapheme);

            if x + width > self.max_width && byte_idx > line_start {
                let (cut, cut_x) = match last_break {
                    Some((offset, bx)) if offset > line_start => (offset, bx),
                    // Emergency break mid-word
                    _ => (byte_idx, x),
                };
                lines.push(line_start..cut);
                line_start = cut;
                x -= cut_x;
                last_break = None;
            }

            x += width;
        }

        if line_start < text.len() || lines.is_empty() {
            lines.push(line_start..text.len());
        }

        lines
    }

    /// Estimate where text rendered between `top` and `bottom` crosses
    /// `boundary`. Returns `None` when the boundary does not cut the block.
    pub fn split(&self, text: &str, top: f32, bottom: f32, boundary: f32) -> Option<SplitPoint> {
        let height = bottom - top;
        if text.is_empty() || height <= 0.0 || boundary <= top || boundary >= bottom {
            return None;
        }

        let lines = self.lines(text);
        if lines.len() < 2 {
            return self.split_single_line(text, (boundary - top) / height);
        }

        let line_height = height / lines.len() as f32;
        let fitting = (((boundary - top) / line_height).floor() as usize).clamp(1, lines.len() - 1);

        let last = &lines[fitting - 1];
        let last_on_page = last.start + text[last.clone()].trim_end().len();
        Some(SplitPoint {
            last_on_page,
            first_on_next: lines[fitting].start,
        })
    }

    /// The host wrapped a line we could not; cut proportionally by grapheme.
    fn split_single_line(&self, text: &str, fraction: f32) -> Option<SplitPoint> {
        let starts: Vec<usize> = text.grapheme_indices(true).map(|(i, _)| i).collect();
        if starts.len() < 2 {
            return None;
        }

        let at = ((fraction * starts.len() as f32).floor() as usize).clamp(1, starts.len() - 1);
        let first_on_next = starts[at];
        Some(SplitPoint {
            last_on_page: text[..first_on_next].trim_end().len(),
            first_on_next,
        })
    }

    fn grapheme_width(&self, grapheme: &str) -> f32 {
        if grapheme == "\t" {
            self.metrics.default_width * 4.0
        } else if grapheme.chars().all(|c| c.is_control()) {
            0.0
        } else {
            grapheme.chars().map(|c| self.metrics.width(c)).sum()
        }
    }
}
