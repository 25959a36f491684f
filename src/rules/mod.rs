//! Screenplay reflow rules
//!
//! Five rules run in a fixed order over the block index of one pass:
//!
//! 1. a transition may not open a page
//! 2. a scene heading may not close a page
//! 3. a character cue needs room for its first dialogue line
//! 4. a parenthetical stays with the dialogue it introduces
//! 5. dialogue split across pages gets `(MORE)` / `(CONT'D)` markers
//!
//! A pushed block, and whatever trails it on the same page, counts as one
//! page later for every rule that runs after the push. Shifted blocks are not
//! pushed again and are not split, since their new geometry is unknown until
//! the host lays them out again.
//!
//! Pushes of the previous pass are held before any rule runs. Once the host
//! renders a spacer the anchor opens the next page and the violation is gone
//! from the geometry; a held push is re-emitted unchanged while the page it
//! was pushed off still could not take the anchor, and released otherwise.

mod tie_break;

pub use tie_break::{GroupingConflict, MinimalMovement, TieBreak};

use crate::config::ReflowConfig;
use crate::document::{utf16_len, BlockId, BlockKind};
use crate::layout::{Block, BlockIndex, GeometryPort, LineEstimator, PageBand, PageBands};
use rustc_hash::{FxHashMap, FxHashSet};

/// Which rule produced a push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    TransitionAtTop,
    SceneHeadingOrphan,
    CharacterOrphan,
    ParentheticalGrouping,
}

/// Engine-internal instruction; each one becomes exactly one decoration
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectiveAction {
    /// Insert a spacer before the anchor block
    PushToNextPage {
        anchor_pos: usize,
        /// Index of the anchor in the pass's block index
        anchor: usize,
        block: BlockId,
        rule: Rule,
        /// Distance from the anchor's top to the bottom of the page it leaves
        amount: f32,
        /// Gap between the content above the anchor and the anchor's top on
        /// that page
        lead: f32,
    },
    /// Dialogue continues on the next page
    MoreMarker { at_pos: usize },
    /// Repeated character cue at the top of the continuation
    ContdMarker { at_pos: usize, cue: String },
}

impl CorrectiveAction {
    pub fn position(&self) -> usize {
        match self {
            CorrectiveAction::PushToNextPage { anchor_pos, .. } => *anchor_pos,
            CorrectiveAction::MoreMarker { at_pos } => *at_pos,
            CorrectiveAction::ContdMarker { at_pos, .. } => *at_pos,
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, CorrectiveAction::PushToNextPage { .. })
    }
}

/// A push committed by an earlier pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeldPush {
    pub rule: Rule,
    pub lead: f32,
}

/// Pushes of the last committed pass, keyed by anchor block
#[derive(Debug, Clone, Default)]
pub struct HeldPushes {
    pushes: FxHashMap<BlockId, HeldPush>,
}

impl HeldPushes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(actions: &[CorrectiveAction]) -> Self {
        let pushes = actions
            .iter()
            .filter_map(|action| match action {
                CorrectiveAction::PushToNextPage {
                    block, rule, lead, ..
                } => Some((
                    *block,
                    HeldPush {
                        rule: *rule,
                        lead: *lead,
                    },
                )),
                _ => None,
            })
            .collect();
        Self { pushes }
    }

    pub fn get(&self, id: BlockId) -> Option<HeldPush> {
        self.pushes.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.pushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pushes.is_empty()
    }
}

/// Effective page bookkeeping for pending pushes
struct Placement {
    shifted: Vec<bool>,
    /// Anchors of held pushes; they already sit one page past their origin
    pinned: Vec<bool>,
    anchors: FxHashSet<usize>,
}

impl Placement {
    fn new(len: usize) -> Self {
        Self {
            shifted: vec![false; len],
            pinned: vec![false; len],
            anchors: FxHashSet::default(),
        }
    }

    fn is_shifted(&self, idx: usize) -> bool {
        self.shifted.get(idx).copied().unwrap_or(false)
    }

    fn is_pinned(&self, idx: usize) -> bool {
        self.pinned.get(idx).copied().unwrap_or(false)
    }

    /// Moved by this pass or held from the last one
    fn is_settled(&self, idx: usize) -> bool {
        self.is_shifted(idx) || self.is_pinned(idx)
    }

    fn start(&self, idx: usize, block: &Block<'_>) -> usize {
        self.effective(idx, block.start_page)
    }

    fn end(&self, idx: usize, block: &Block<'_>) -> usize {
        self.effective(idx, block.end_page)
    }

    /// Other rules see a pinned anchor on the page it was pushed off
    fn effective(&self, idx: usize, page: usize) -> usize {
        (page + usize::from(self.is_shifted(idx))).saturating_sub(usize::from(self.is_pinned(idx)))
    }

    fn pin(&mut self, idx: usize, anchor_pos: usize) -> bool {
        if self.is_settled(idx) || !self.anchors.insert(anchor_pos) {
            return false;
        }
        if let Some(slot) = self.pinned.get_mut(idx) {
            *slot = true;
        }
        true
    }

    /// Mark `idx` and the blocks trailing it on the same page as moved.
    /// Returns false when the block already moved or its anchor is taken.
    fn push(&mut self, index: &BlockIndex<'_>, idx: usize) -> bool {
        let Some(anchor) = index.get(idx) else {
            return false;
        };
        if self.is_settled(idx) || !self.anchors.insert(anchor.range.start) {
            return false;
        }

        let page = anchor.start_page;
        let mut cursor = Some(idx);
        while let Some(k) = cursor {
            let Some(block) = index.get(k) else {
                break;
            };
            if k != idx && block.start_page != page {
                break;
            }
            self.shifted[k] = true;
            cursor = block.next;
        }
        true
    }
}

/// State of one evaluation
struct Pass<'p, 'a> {
    index: &'p BlockIndex<'a>,
    bands: &'p PageBands,
    placement: Placement,
    actions: Vec<CorrectiveAction>,
}

impl Pass<'_, '_> {
    /// Push `idx` off its start page. The spacer must cover everything from
    /// the anchor's top down to the page bottom, otherwise the anchor still
    /// fits where it is.
    fn push(&mut self, idx: usize, rule: Rule) {
        let (index, bands) = (self.index, self.bands);
        let Some(block) = index.get(idx) else {
            return;
        };
        let Some(band) = bands.get(block.start_page) else {
            return;
        };
        if !self.placement.push(index, idx) {
            return;
        }
        let lead = (block.rect.top - self.fill_top(block, band)).max(0.0);

        log::trace!("{:?} pushes block {:?}", rule, block.id);
        self.actions.push(CorrectiveAction::PushToNextPage {
            anchor_pos: block.range.start,
            anchor: idx,
            block: block.id,
            rule,
            amount: band.bottom - block.rect.top,
            lead,
        });
    }

    /// Where the content above `block` ends on `band`: the previous block's
    /// bottom when it ends on that page, else the page top
    fn fill_top(&self, block: &Block<'_>, band: &PageBand) -> f32 {
        block
            .prev
            .and_then(|p| self.index.get(p))
            .filter(|prev| prev.end_page == band.page_index)
            .map_or(band.top, |prev| prev.rect.bottom.max(band.top))
    }

    /// Space between the block's bottom and its end page's bottom
    fn room_below(&self, block: &Block<'_>) -> Option<f32> {
        self.bands
            .get(block.end_page)
            .map(|band| band.bottom - block.rect.bottom)
    }
}

/// Evaluates the reflow rules for one pass
pub struct RuleEngine<'c, T = MinimalMovement> {
    config: &'c ReflowConfig,
    tie_break: T,
}

impl<'c> RuleEngine<'c> {
    pub fn new(config: &'c ReflowConfig) -> Self {
        Self {
            config,
            tie_break: MinimalMovement,
        }
    }
}

impl<'c, T: TieBreak> RuleEngine<'c, T> {
    pub fn with_tie_break(config: &'c ReflowConfig, tie_break: T) -> Self {
        Self { config, tie_break }
    }

    /// Produce the corrective actions for the current layout.
    ///
    /// A single page cannot violate pagination rules, so fewer than two bands
    /// always yields nothing.
    pub fn evaluate(
        &self,
        index: &BlockIndex<'_>,
        bands: &PageBands,
        geometry: &impl GeometryPort,
    ) -> Vec<CorrectiveAction> {
        self.evaluate_holding(index, bands, geometry, &HeldPushes::default())
    }

    /// Like [`RuleEngine::evaluate`], keeping the still-needed pushes of the
    /// previous pass in `held`.
    pub fn evaluate_holding(
        &self,
        index: &BlockIndex<'_>,
        bands: &PageBands,
        geometry: &impl GeometryPort,
        held: &HeldPushes,
    ) -> Vec<CorrectiveAction> {
        if bands.len() < 2 || index.is_empty() {
            return Vec::new();
        }

        let mut pass = Pass {
            index,
            bands,
            placement: Placement::new(index.len()),
            actions: Vec::new(),
        };

        self.hold_pushes(&mut pass, held);

        let rules = self.config.rules;
        if rules.transition_at_top {
            self.transition_at_top(&mut pass);
        }
        if rules.scene_heading_orphan {
            self.scene_heading_orphan(&mut pass);
        }
        if rules.character_orphan {
            self.character_orphan(&mut pass);
        }
        if rules.parenthetical_grouping {
            self.parenthetical_grouping(&mut pass);
        }
        if rules.dialogue_continuation {
            self.dialogue_continuation(&mut pass, geometry);
        }

        pass.actions
    }

    fn hold_pushes(&self, pass: &mut Pass<'_, '_>, held: &HeldPushes) {
        if held.is_empty() {
            return;
        }
        let index = pass.index;
        for (idx, block) in index.iter().enumerate() {
            let Some(push) = held.get(block.id) else {
                continue;
            };
            let Some(band) = self.displaced_from(pass, block) else {
                continue;
            };

            // Where the anchor would sit without the spacer
            let top = pass.fill_top(block, band) + push.lead;
            let bottom = top + block.rect.height();
            if !self.still_violated(pass, block, push.rule, band, top, bottom) {
                log::debug!("releasing {:?} push of block {:?}", push.rule, block.id);
                continue;
            }
            if !pass.placement.pin(idx, block.range.start) {
                continue;
            }

            log::trace!("{:?} holds block {:?}", push.rule, block.id);
            pass.actions.push(CorrectiveAction::PushToNextPage {
                anchor_pos: block.range.start,
                anchor: idx,
                block: block.id,
                rule: push.rule,
                amount: band.bottom - top,
                lead: push.lead,
            });
        }
    }

    /// Band of the page the block was pushed off, if the block now opens the
    /// following page with nothing of the previous block above it
    fn displaced_from<'b>(&self, pass: &Pass<'b, '_>, block: &Block<'_>) -> Option<&'b PageBand> {
        let origin = block.start_page.checked_sub(1)?;
        let band = pass.bands.get(block.start_page)?;
        let opens_page = block.rect.top - band.top <= self.config.edge_tolerance;
        let prev_above = block
            .prev
            .and_then(|p| pass.index.get(p))
            .map_or(true, |prev| prev.end_page < block.start_page);
        if opens_page && prev_above {
            pass.bands.get(origin)
        } else {
            None
        }
    }

    /// Whether the anchor at `top..bottom` on `band` would break `rule` again
    fn still_violated(
        &self,
        pass: &Pass<'_, '_>,
        block: &Block<'_>,
        rule: Rule,
        band: &PageBand,
        top: f32,
        bottom: f32,
    ) -> bool {
        let config = self.config;
        let room = band.bottom - bottom;
        let next_line_overflows = block.next.and_then(|n| pass.index.get(n)).is_some_and(|next| {
            let gap = (next.rect.top - block.rect.bottom).max(0.0);
            bottom + gap + config.font.line_height > band.bottom
        });

        match rule {
            Rule::TransitionAtTop => {
                let prev_above = block
                    .prev
                    .and_then(|p| pass.index.get(p))
                    .is_some_and(|prev| prev.end_page < band.page_index);
                prev_above && top - band.top <= config.edge_tolerance
            }
            Rule::SceneHeadingOrphan => room <= config.orphan_tolerance && next_line_overflows,
            Rule::CharacterOrphan | Rule::ParentheticalGrouping => {
                room < config.min_dialogue_height || next_line_overflows
            }
        }
    }

    /// A transition may not open a page after the scene it closes. The first
    /// block of the document, or one sharing its page with the block before
    /// it, is left alone.
    fn transition_at_top(&self, pass: &mut Pass<'_, '_>) {
        let index = pass.index;
        for (idx, block) in index.iter().enumerate() {
            if block.kind != BlockKind::Transition || pass.placement.is_settled(idx) {
                continue;
            }
            let Some(band) = pass.bands.get(block.start_page) else {
                continue;
            };
            let follows_earlier_page = block
                .prev
                .and_then(|p| index.get(p))
                .is_some_and(|prev| prev.end_page < block.start_page);
            if follows_earlier_page && block.rect.top - band.top <= self.config.edge_tolerance {
                pass.push(idx, Rule::TransitionAtTop);
            }
        }
    }

    fn scene_heading_orphan(&self, pass: &mut Pass<'_, '_>) {
        let index = pass.index;
        for (idx, block) in index.iter().enumerate() {
            if block.kind != BlockKind::SceneHeading || pass.placement.is_settled(idx) {
                continue;
            }
            let Some(room) = pass.room_below(block) else {
                continue;
            };
            if room > self.config.orphan_tolerance {
                continue;
            }
            let Some(next_idx) = block.next else {
                continue;
            };
            let Some(next) = index.get(next_idx) else {
                continue;
            };

            if pass.placement.start(next_idx, next) != pass.placement.end(idx, block) {
                pass.push(idx, Rule::SceneHeadingOrphan);
            }
        }
    }

    fn character_orphan(&self, pass: &mut Pass<'_, '_>) {
        let index = pass.index;
        for (idx, block) in index.iter().enumerate() {
            if block.kind != BlockKind::Character || pass.placement.is_settled(idx) {
                continue;
            }
            let Some(next_idx) = block.next else {
                continue;
            };
            let Some(next) = index.get(next_idx) else {
                continue;
            };
            if !matches!(next.kind, BlockKind::Dialogue | BlockKind::Parenthetical) {
                continue;
            }

            let separated =
                pass.placement.start(next_idx, next) != pass.placement.end(idx, block);
            if separated || self.lacks_dialogue_room(pass, block) {
                pass.push(idx, Rule::CharacterOrphan);
            }
        }
    }

    fn parenthetical_grouping(&self, pass: &mut Pass<'_, '_>) {
        let index = pass.index;
        for (idx, block) in index.iter().enumerate() {
            if block.kind != BlockKind::Parenthetical || pass.placement.is_settled(idx) {
                continue;
            }
            let Some(dialogue_idx) = block.next else {
                continue;
            };
            let Some(dialogue) = index.get(dialogue_idx) else {
                continue;
            };
            if dialogue.kind != BlockKind::Dialogue
                || pass.placement.start(dialogue_idx, dialogue) == pass.placement.end(idx, block)
            {
                continue;
            }

            let character = block.prev.filter(|&c| {
                index.get(c).is_some_and(|cue| {
                    cue.kind == BlockKind::Character
                        && !pass.placement.is_settled(c)
                        && pass.placement.end(c, cue) == pass.placement.start(idx, block)
                })
            });
            let character_lacks_room = character
                .and_then(|c| index.get(c))
                .is_some_and(|cue| self.lacks_dialogue_room(pass, cue));

            let conflict = GroupingConflict {
                index,
                parenthetical: idx,
                dialogue: dialogue_idx,
                character,
                character_lacks_room,
            };
            if let Some(anchor) = self.tie_break.choose(&conflict) {
                pass.push(anchor, Rule::ParentheticalGrouping);
            }
        }
    }

    fn dialogue_continuation(&self, pass: &mut Pass<'_, '_>, geometry: &impl GeometryPort) {
        let estimator = LineEstimator::new(&self.config.font, self.config.dialogue_width);

        let index = pass.index;
        for (idx, block) in index.iter().enumerate() {
            if block.kind != BlockKind::Dialogue
                || !block.spans_pages()
                || pass.placement.is_shifted(idx)
            {
                continue;
            }

            let cue = block
                .speaker
                .and_then(|s| index.get(s))
                .map(|speaker| cue_name(speaker.text));
            let mut last_split = None;

            for page in block.start_page..block.end_page {
                let Some(band) = pass.bands.get(page) else {
                    break;
                };
                let Some((more_at, contd_at)) =
                    split_at(block, band.bottom, geometry, &estimator)
                else {
                    log::debug!("dialogue {:?} has no split point on page {}", block.id, page);
                    continue;
                };
                if last_split == Some(more_at) {
                    continue;
                }
                last_split = Some(more_at);

                pass.actions.push(CorrectiveAction::MoreMarker { at_pos: more_at });
                match cue {
                    Some(cue) => pass.actions.push(CorrectiveAction::ContdMarker {
                        at_pos: contd_at,
                        cue: cue.to_string(),
                    }),
                    None => log::debug!("dialogue {:?} has no speaker to continue", block.id),
                }
            }
        }
    }

    fn lacks_dialogue_room(&self, pass: &Pass<'_, '_>, block: &Block<'_>) -> bool {
        pass.room_below(block)
            .is_some_and(|room| room < self.config.min_dialogue_height)
    }
}

/// Absolute `(more, contd)` positions where `block` crosses `y`
fn split_at(
    block: &Block<'_>,
    y: f32,
    geometry: &impl GeometryPort,
    estimator: &LineEstimator<'_>,
) -> Option<(usize, usize)> {
    if let Some(pos) = geometry.offset_at(block.id, y) {
        let pos = pos.clamp(block.range.start, block.range.end);
        return Some((pos, pos));
    }

    let split = estimator.split(block.text, block.rect.top, block.rect.bottom, y)?;
    let units = |byte: usize| block.text.get(..byte).map(utf16_len);
    Some((
        block.range.start + units(split.last_on_page)?,
        block.range.start + units(split.first_on_next)?,
    ))
}

/// Character cue without surrounding whitespace or an existing `(CONT'D)`
pub fn cue_name(text: &str) -> &str {
    let trimmed = text.trim();
    let upper = trimmed.to_ascii_uppercase();
    for suffix in ["(CONT'D)", "(CONT\u{2019}D)", "(CONTD)"] {
        if upper.ends_with(suffix) {
            return trimmed[..trimmed.len() - suffix.len()].trim_end();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BlockId, Document};
    use crate::layout::{PageHeaders, RectTable};

    fn bands(pages: usize) -> PageBands {
        PageBands::resolve(&PageHeaders::uniform(pages, 100.0), 100.0).unwrap()
    }

    fn evaluate(config: &ReflowConfig, doc: &Document, pages: usize, rects: &RectTable) -> Vec<CorrectiveAction> {
        let bands = bands(pages);
        let index = BlockIndex::collect(doc, &bands, rects);
        RuleEngine::new(config).evaluate(&index, &bands, rects)
    }

    fn pushes(actions: &[CorrectiveAction]) -> Vec<(usize, Rule)> {
        actions
            .iter()
            .filter_map(|a| match a {
                CorrectiveAction::PushToNextPage { anchor, rule, .. } => Some((*anchor, *rule)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_band_emits_nothing() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([(BlockKind::Transition, "CUT TO:")]);
        let rects = RectTable::new().with(1, 0.0, 12.0);
        assert!(evaluate(&config, &doc, 1, &rects).is_empty());
    }

    #[test]
    fn test_transition_at_top() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Action, "He runs."),
            (BlockKind::Transition, "CUT TO:"),
        ]);
        let rects = RectTable::new().with(1, 70.0, 94.0).with(2, 104.0, 116.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(pushes(&actions), vec![(1, Rule::TransitionAtTop)]);
        match &actions[0] {
            CorrectiveAction::PushToNextPage {
                anchor_pos, amount, ..
            } => {
                assert_eq!(*anchor_pos, 9);
                // Page two's bottom minus the transition's top
                assert_eq!(*amount, 96.0);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_transition_below_tolerance_is_left_alone() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([(BlockKind::Transition, "CUT TO:")]);
        let rects = RectTable::new().with(1, 107.0, 119.0);
        assert!(evaluate(&config, &doc, 2, &rects).is_empty());
    }

    #[test]
    fn test_scene_heading_orphan() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::SceneHeading, "EXT. ROOF - NIGHT"),
            (BlockKind::Action, "Wind."),
        ]);
        let rects = RectTable::new().with(1, 78.0, 90.0).with(2, 100.0, 112.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(pushes(&actions), vec![(0, Rule::SceneHeadingOrphan)]);
    }

    #[test]
    fn test_scene_heading_with_company_stays() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::SceneHeading, "EXT. ROOF - NIGHT"),
            (BlockKind::Action, "Wind."),
        ]);
        let rects = RectTable::new().with(1, 70.0, 82.0).with(2, 82.0, 94.0);
        assert!(evaluate(&config, &doc, 2, &rects).is_empty());
    }

    #[test]
    fn test_character_without_room() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Dialogue, "Hi."),
        ]);
        let rects = RectTable::new().with(1, 78.0, 90.0).with(2, 100.0, 112.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(pushes(&actions), vec![(0, Rule::CharacterOrphan)]);
    }

    #[test]
    fn test_character_before_action_is_not_an_orphan() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Action, "Silence."),
        ]);
        let rects = RectTable::new().with(1, 86.0, 98.0).with(2, 100.0, 112.0);
        assert!(evaluate(&config, &doc, 2, &rects).is_empty());
    }

    #[test]
    fn test_parenthetical_pushed_alone_when_cue_has_room() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Parenthetical, "(whispering)"),
            (BlockKind::Dialogue, "Over here."),
        ]);
        let rects = RectTable::new()
            .with(1, 64.0, 76.0)
            .with(2, 76.0, 88.0)
            .with(3, 100.0, 112.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(actions.len(), 1);
        assert_eq!(pushes(&actions), vec![(1, Rule::ParentheticalGrouping)]);
    }

    #[test]
    fn test_stranded_cue_pushed_once_for_group() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Parenthetical, "(whispering)"),
            (BlockKind::Dialogue, "Over here."),
        ]);
        let rects = RectTable::new()
            .with(1, 76.0, 86.0)
            .with(2, 86.0, 98.0)
            .with(3, 100.0, 112.0);

        // Rule 3 moves the cue and the parenthetical rides along
        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(pushes(&actions), vec![(0, Rule::CharacterOrphan)]);

        // With rule 3 off, the grouping tie-break still picks the cue
        let mut config = ReflowConfig::default();
        config.rules.character_orphan = false;
        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(pushes(&actions), vec![(0, Rule::ParentheticalGrouping)]);
    }

    #[test]
    fn test_custom_tie_break() {
        struct Never;
        impl TieBreak for Never {
            fn choose(&self, _: &GroupingConflict<'_, '_>) -> Option<usize> {
                None
            }
        }

        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Parenthetical, "(whispering)"),
            (BlockKind::Dialogue, "Over here."),
        ]);
        let rects = RectTable::new()
            .with(1, 64.0, 76.0)
            .with(2, 76.0, 88.0)
            .with(3, 100.0, 112.0);
        let bands = bands(2);
        let index = BlockIndex::collect(&doc, &bands, &rects);

        let actions = RuleEngine::with_tie_break(&config, Never).evaluate(&index, &bands, &rects);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_dialogue_continuation_markers() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Dialogue, "I never meant for any of this to happen, you have to believe me."),
        ]);
        let rects = RectTable::new().with(1, 64.0, 76.0).with(2, 76.0, 124.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(actions.len(), 2);
        let CorrectiveAction::MoreMarker { at_pos: more } = actions[0] else {
            panic!("expected MORE first, got {:?}", actions[0]);
        };
        let CorrectiveAction::ContdMarker { at_pos: contd, ref cue } = actions[1] else {
            panic!("expected CONT'D second, got {:?}", actions[1]);
        };
        assert_eq!(cue, "JANE");
        assert!(more > 5 && more <= contd);
        assert!(contd > 4);
    }

    #[test]
    fn test_host_split_offset_wins() {
        struct HostGeometry(RectTable);
        impl GeometryPort for HostGeometry {
            fn rect_of(&self, id: BlockId) -> Option<crate::layout::BlockRect> {
                self.0.rect_of(id)
            }
            fn offset_at(&self, _id: BlockId, _y: f32) -> Option<usize> {
                Some(12)
            }
        }

        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Dialogue, "First half. Second half."),
        ]);
        let geometry = HostGeometry(RectTable::new().with(1, 64.0, 76.0).with(2, 76.0, 124.0));
        let bands = bands(2);
        let index = BlockIndex::collect(&doc, &bands, &geometry);
        let actions = RuleEngine::new(&config).evaluate(&index, &bands, &geometry);

        assert_eq!(
            actions,
            vec![
                CorrectiveAction::MoreMarker { at_pos: 12 },
                CorrectiveAction::ContdMarker {
                    at_pos: 12,
                    cue: "JANE".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_dialogue_across_three_pages() {
        let config = ReflowConfig::default();
        let long = "word ".repeat(200);
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Dialogue, long.trim_end()),
        ]);
        let rects = RectTable::new().with(1, 50.0, 62.0).with(2, 62.0, 260.0);

        let actions = evaluate(&config, &doc, 3, &rects);
        let more = actions
            .iter()
            .filter(|a| matches!(a, CorrectiveAction::MoreMarker { .. }))
            .count();
        let contd = actions
            .iter()
            .filter(|a| matches!(a, CorrectiveAction::ContdMarker { .. }))
            .count();
        assert_eq!((more, contd), (2, 2));
    }

    #[test]
    fn test_dialogue_without_speaker_gets_more_only() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Action, "Static."),
            (BlockKind::Dialogue, "Voice from nowhere keeps talking and talking on."),
        ]);
        let rects = RectTable::new().with(1, 40.0, 52.0).with(2, 76.0, 124.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], CorrectiveAction::MoreMarker { .. }));
    }

    #[test]
    fn test_shifted_dialogue_is_not_split() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Dialogue, "Drive faster, they are right behind us now."),
        ]);
        // The stranded cue drags the dialogue start along with it
        let rects = RectTable::new().with(1, 76.0, 88.0).with(2, 88.0, 130.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(pushes(&actions), vec![(0, Rule::CharacterOrphan)]);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_no_duplicate_anchors() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Character, "JANE"),
            (BlockKind::Parenthetical, "(beat)"),
            (BlockKind::Dialogue, "Yes."),
            (BlockKind::Transition, "CUT TO:"),
        ]);
        let rects = RectTable::new()
            .with(1, 80.0, 92.0)
            .with(2, 92.0, 98.0)
            .with(3, 100.0, 112.0)
            .with(4, 200.0, 212.0);

        let actions = evaluate(&config, &doc, 3, &rects);
        let mut anchors: Vec<_> = actions
            .iter()
            .filter(|a| a.is_push())
            .map(|a| a.position())
            .collect();
        let total = anchors.len();
        anchors.dedup();
        assert_eq!(anchors.len(), total);
        assert_eq!(total, 2);
    }

    #[test]
    fn test_transition_opening_the_document_stays() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Transition, "FADE IN:"),
            (BlockKind::SceneHeading, "EXT. FIELD - DAWN"),
            (BlockKind::Action, "Mist."),
        ]);
        let rects = RectTable::new()
            .with(1, 0.0, 12.0)
            .with(2, 24.0, 36.0)
            .with(3, 42.0, 54.0);
        assert!(evaluate(&config, &doc, 2, &rects).is_empty());
    }

    #[test]
    fn test_transition_sharing_its_page_stays() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Action, "Beat."),
            (BlockKind::Transition, "CUT TO:"),
        ]);
        let rects = RectTable::new().with(1, 100.0, 102.0).with(2, 102.0, 114.0);
        assert!(evaluate(&config, &doc, 2, &rects).is_empty());
    }

    #[test]
    fn test_held_push_is_reemitted() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Action, "He runs."),
            (BlockKind::SceneHeading, "EXT. STREET - NIGHT"),
            (BlockKind::Action, "Sirens."),
        ]);
        let before = RectTable::new()
            .with(1, 0.0, 60.0)
            .with(2, 78.0, 90.0)
            .with(3, 100.0, 130.0);
        let first = evaluate(&config, &doc, 3, &before);
        assert_eq!(
            first,
            vec![CorrectiveAction::PushToNextPage {
                anchor_pos: 9,
                anchor: 1,
                block: BlockId(2),
                rule: Rule::SceneHeadingOrphan,
                amount: 22.0,
                lead: 18.0,
            }]
        );

        // The host rendered the spacer: the heading opens page two
        let after = RectTable::new()
            .with(1, 0.0, 60.0)
            .with(2, 100.0, 112.0)
            .with(3, 118.0, 148.0);
        let bands = bands(3);
        let index = BlockIndex::collect(&doc, &bands, &after);
        let held = HeldPushes::capture(&first);
        assert_eq!(held.len(), 1);

        let second = RuleEngine::new(&config).evaluate_holding(&index, &bands, &after, &held);
        assert_eq!(second, first);

        // Without the held push the relaid page looks clean
        assert!(RuleEngine::new(&config).evaluate(&index, &bands, &after).is_empty());
    }

    #[test]
    fn test_held_push_released_when_room_returns() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Action, "He runs."),
            (BlockKind::SceneHeading, "EXT. STREET - NIGHT"),
            (BlockKind::Action, "Sirens."),
        ]);
        let mut held = HeldPushes::new();
        held.pushes.insert(
            BlockId(2),
            HeldPush {
                rule: Rule::SceneHeadingOrphan,
                lead: 18.0,
            },
        );

        // The action above shrank; the heading would now fit with company
        let rects = RectTable::new()
            .with(1, 0.0, 20.0)
            .with(2, 100.0, 112.0)
            .with(3, 118.0, 148.0);
        let bands = bands(3);
        let index = BlockIndex::collect(&doc, &bands, &rects);

        let actions = RuleEngine::new(&config).evaluate_holding(&index, &bands, &rects, &held);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_held_parenthetical_keeps_cue_in_place() {
        let config = ReflowConfig::default();
        let doc = Document::from_blocks([
            (BlockKind::Action, "She turns."),
            (BlockKind::Character, "JANE"),
            (BlockKind::Parenthetical, "(quietly)"),
            (BlockKind::Dialogue, "Not here."),
        ]);
        let mut held = HeldPushes::new();
        held.pushes.insert(
            BlockId(3),
            HeldPush {
                rule: Rule::ParentheticalGrouping,
                lead: 0.0,
            },
        );

        // Parenthetical already moved; the cue stays behind with room to spare
        let rects = RectTable::new()
            .with(1, 0.0, 60.0)
            .with(2, 60.0, 72.0)
            .with(3, 100.0, 112.0)
            .with(4, 112.0, 136.0);
        let bands = bands(3);
        let index = BlockIndex::collect(&doc, &bands, &rects);

        let actions = RuleEngine::new(&config).evaluate_holding(&index, &bands, &rects, &held);
        assert_eq!(pushes(&actions), vec![(2, Rule::ParentheticalGrouping)]);
    }

    #[test]
    fn test_split_positions_count_utf16_units() {
        let config = ReflowConfig {
            font: crate::layout::FontMetrics::monospace(12.0, 10.0),
            dialogue_width: 100.0,
            ..ReflowConfig::default()
        };
        let doc = Document::from_blocks([
            (BlockKind::Character, "JOS\u{c9}"),
            (BlockKind::Dialogue, "na\u{ef}ve caf\u{e9} ok"),
        ]);
        // Two estimated lines, "naïve " and "café ok"; only the first fits
        let rects = RectTable::new().with(1, 60.0, 72.0).with(2, 72.0, 124.0);

        let actions = evaluate(&config, &doc, 2, &rects);
        assert_eq!(
            actions,
            vec![
                CorrectiveAction::MoreMarker { at_pos: 10 },
                CorrectiveAction::ContdMarker {
                    at_pos: 11,
                    cue: "JOS\u{c9}".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_cue_name() {
        assert_eq!(cue_name("  JANE "), "JANE");
        assert_eq!(cue_name("JANE (CONT'D)"), "JANE");
        assert_eq!(cue_name("jane (cont\u{2019}d)"), "jane");
        assert_eq!(cue_name("JANE (V.O.)"), "JANE (V.O.)");
    }
}
