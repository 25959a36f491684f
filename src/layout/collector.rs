//! Block collection: document walk, rect lookup, page assignment

use crate::document::{BlockId, BlockKind, Document};
use crate::layout::bands::PageBands;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Rendered vertical extent of a block
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockRect {
    pub top: f32,
    pub bottom: f32,
}

impl BlockRect {
    pub fn new(top: f32, bottom: f32) -> Self {
        Self { top, bottom }
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Finite and not inverted
    pub fn is_valid(&self) -> bool {
        self.top.is_finite() && self.bottom.is_finite() && self.bottom >= self.top
    }
}

/// Geometry queries answered by the host renderer.
///
/// This is the only place the engine touches rendered layout, so the whole
/// rule core runs against a plain table in tests.
pub trait GeometryPort {
    /// Rendered rect of a block, `None` if it is not laid out
    fn rect_of(&self, id: BlockId) -> Option<BlockRect>;

    /// Absolute document position of the first content rendered at or below
    /// `y` inside the block. Hosts that cannot answer leave the default and
    /// the engine estimates from the block text.
    fn offset_at(&self, _id: BlockId, _y: f32) -> Option<usize> {
        None
    }
}

/// Rect snapshot keyed by block id
#[derive(Debug, Clone, Default)]
pub struct RectTable {
    rects: FxHashMap<BlockId, BlockRect>,
}

impl RectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: BlockId, rect: BlockRect) {
        self.rects.insert(id, rect);
    }

    pub fn with(mut self, id: u64, top: f32, bottom: f32) -> Self {
        self.insert(BlockId(id), BlockRect::new(top, bottom));
        self
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

impl GeometryPort for RectTable {
    fn rect_of(&self, id: BlockId) -> Option<BlockRect> {
        self.rects.get(&id).copied()
    }
}

impl FromIterator<(BlockId, BlockRect)> for RectTable {
    fn from_iter<I: IntoIterator<Item = (BlockId, BlockRect)>>(iter: I) -> Self {
        Self {
            rects: iter.into_iter().collect(),
        }
    }
}

/// A screenplay block with its page assignment for the current pass
#[derive(Debug, Clone, PartialEq)]
pub struct Block<'a> {
    pub id: BlockId,
    pub kind: BlockKind,
    pub text: &'a str,
    /// Absolute document positions
    pub range: Range<usize>,
    pub rect: BlockRect,
    pub start_page: usize,
    pub end_page: usize,
    /// Index of the previous resolved block
    pub prev: Option<usize>,
    /// Index of the next resolved block
    pub next: Option<usize>,
    /// Nearest preceding `Character` in the same dialogue run
    pub speaker: Option<usize>,
}

impl Block<'_> {
    pub fn spans_pages(&self) -> bool {
        self.start_page != self.end_page
    }
}

/// Resolved blocks of one pass in document order
#[derive(Debug, Clone, Default)]
pub struct BlockIndex<'a> {
    blocks: Vec<Block<'a>>,
    unresolved: Vec<BlockId>,
}

impl<'a> BlockIndex<'a> {
    /// Walk the document once and assign pages.
    ///
    /// Blocks whose rect is missing, invalid, or starts outside every band
    /// are left out and reported through [`BlockIndex::unresolved`].
    pub fn collect(
        document: &'a Document,
        bands: &PageBands,
        geometry: &impl GeometryPort,
    ) -> Self {
        let mut blocks: Vec<Block<'a>> = Vec::new();
        let mut unresolved = Vec::new();
        let mut speaker: Option<usize> = None;

        for entry in document.entries() {
            let Some(kind) = entry.kind else {
                if !entry.text.is_empty() {
                    log::trace!("skipping {} node {:?}", entry.type_name, entry.id);
                }
                continue;
            };

            if kind.ends_dialogue_run() {
                speaker = None;
            }

            let placed = geometry
                .rect_of(entry.id)
                .filter(BlockRect::is_valid)
                .and_then(|rect| {
                    let start = bands.page_at(rect.top)?;
                    let end = bands.page_at_end(rect.bottom)?.max(start);
                    Some((rect, start, end))
                });

            let Some((rect, start_page, end_page)) = placed else {
                log::debug!("block {:?} ({}) has no page position", entry.id, kind.type_name());
                unresolved.push(entry.id);
                if kind == BlockKind::Character {
                    speaker = None;
                }
                continue;
            };

            let idx = blocks.len();
            let prev = idx.checked_sub(1);
            if let Some(p) = prev {
                blocks[p].next = Some(idx);
            }

            blocks.push(Block {
                id: entry.id,
                kind,
                text: &entry.text,
                range: entry.range.clone(),
                rect,
                start_page,
                end_page,
                prev,
                next: None,
                speaker: if kind.is_dialogue_part() { speaker } else { None },
            });

            if kind == BlockKind::Character {
                speaker = Some(idx);
            }
        }

        Self { blocks, unresolved }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Block<'a>> {
        self.blocks.get(idx)
    }

    pub fn as_slice(&self) -> &[Block<'a>] {
        &self.blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block<'a>> {
        self.blocks.iter()
    }

    pub fn prev(&self, idx: usize) -> Option<&Block<'a>> {
        self.blocks.get(idx)?.prev.and_then(|p| self.blocks.get(p))
    }

    pub fn next(&self, idx: usize) -> Option<&Block<'a>> {
        self.blocks.get(idx)?.next.and_then(|n| self.blocks.get(n))
    }

    /// Ids of blocks excluded from rule evaluation this pass
    pub fn unresolved(&self) -> &[BlockId] {
        &self.unresolved
    }
}
