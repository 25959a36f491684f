//! Page bands: vertical page geometry derived from header anchors

use crate::error::GeometryUnstable;
use serde::Serialize;

/// Slack allowed between a band's bottom and the next band's top before the
/// pair counts as overlapping (sub-pixel rounding in the host).
const OVERLAP_TOLERANCE: f32 = 0.5;

/// Vertical interval occupied by one rendered page
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBand {
    pub page_index: usize,
    pub top: f32,
    pub bottom: f32,
}

/// Page header anchors reported by the pagination collaborator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageHeaders {
    /// Top coordinate of each header, in page order
    pub tops: Vec<f32>,
    /// Number of page-break containers currently in the editor
    pub container_count: usize,
}

impl PageHeaders {
    pub fn new(tops: Vec<f32>, container_count: usize) -> Self {
        Self {
            tops,
            container_count,
        }
    }

    /// Headers from a settled layout where every container has its header
    pub fn settled(tops: Vec<f32>) -> Self {
        let container_count = tops.len();
        Self::new(tops, container_count)
    }

    /// Evenly spaced headers for `count` pages with no gap between them
    pub fn uniform(count: usize, page_height: f32) -> Self {
        Self::settled((0..count).map(|i| i as f32 * page_height).collect())
    }
}

/// Ordered, non-overlapping page bands for one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageBands {
    bands: Vec<PageBand>,
    page_height: f32,
}

impl PageBands {
    /// Resolve bands from header anchors and the page height.
    ///
    /// Fails with [`GeometryUnstable`] instead of guessing when the
    /// pagination collaborator is mid-mutation.
    pub fn resolve(headers: &PageHeaders, page_height: f32) -> Result<Self, GeometryUnstable> {
        if headers.tops.len() != headers.container_count {
            return Err(GeometryUnstable::HeaderCountMismatch {
                headers: headers.tops.len(),
                containers: headers.container_count,
            });
        }

        if !page_height.is_finite() || page_height <= 0.0 {
            return Err(GeometryUnstable::InvalidPageHeight(page_height));
        }

        let mut bands: Vec<PageBand> = Vec::with_capacity(headers.tops.len());
        for (index, &top) in headers.tops.iter().enumerate() {
            if !top.is_finite() {
                return Err(GeometryUnstable::NonFiniteHeader { index });
            }

            if let Some(prev) = bands.last() {
                if top < prev.bottom - OVERLAP_TOLERANCE {
                    return Err(GeometryUnstable::OverlappingBands { index });
                }
            }

            bands.push(PageBand {
                page_index: index,
                top,
                bottom: top + page_height,
            });
        }

        Ok(Self { bands, page_height })
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn page_height(&self) -> f32 {
        self.page_height
    }

    pub fn get(&self, page_index: usize) -> Option<&PageBand> {
        self.bands.get(page_index)
    }

    pub fn as_slice(&self) -> &[PageBand] {
        &self.bands
    }

    /// Page containing the coordinate `y` (a rect top).
    ///
    /// Picks the highest band whose top is at or above `y`. Coordinates past
    /// the last band clamp to it; coordinates above the first band or in an
    /// inter-page gap resolve to `None`.
    pub fn page_at(&self, y: f32) -> Option<usize> {
        let idx = self.bands.partition_point(|b| b.top <= y).checked_sub(1)?;
        let band = &self.bands[idx];
        if y < band.bottom || idx + 1 == self.bands.len() {
            Some(idx)
        } else {
            None
        }
    }

    /// Page on which content ending at `y` (a rect bottom) ends.
    ///
    /// A bottom lying exactly on a band's bottom edge belongs to that band,
    /// and a bottom spilling into the gap below a page stays on that page.
    pub fn page_at_end(&self, y: f32) -> Option<usize> {
        match self.bands.partition_point(|b| b.top < y).checked_sub(1) {
            Some(idx) => Some(idx),
            None => self.page_at(y),
        }
    }
}
