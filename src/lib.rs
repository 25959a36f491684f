//! Screenplay reflow: pagination-aware layout corrections for a paged editor
//!
//! This crate provides the engine behind screenplay pagination with:
//! - Page band resolution from header positions
//! - A read-only block index with page assignment and dialogue speakers
//! - Five screenplay rules (transitions, orphans, grouping, continuations)
//! - Immutable decoration sets committed by pointer swap
//! - Frame-aligned recompute scheduling
//!
//! The engine never edits the document. Its only output is a
//! [`DecorationSet`] the host renders as view-only spacers and markers.

pub mod config;
pub mod document;
pub mod error;
pub mod layout;
pub mod render;
pub mod rules;
pub mod schedule;
pub mod wasm;

use std::rc::Rc;

// Re-export WASM types for direct use
pub use wasm::WasmReflowEngine;

// Re-export primary types
pub use config::{ReflowConfig, RuleToggles};
pub use document::{BlockId, BlockKind, Document, Node};
pub use error::{GeometryUnstable, ReflowError, Violation};
pub use layout::{
    BlockIndex, BlockRect, FontMetrics, GeometryPort, PageBand, PageBands, PageHeaders, RectTable,
};
pub use render::{Decoration, DecorationKind, DecorationSet, PassCounters, PassTelemetry, Side};
pub use rules::{CorrectiveAction, HeldPushes, MinimalMovement, RuleEngine, TieBreak};
pub use schedule::{FrameOutcome, RecomputeScheduler, RequestOutcome, SchedulerState, Trigger};

use render::DecorationBuilder;

/// The reflow engine: config, scheduler and the current decoration set
pub struct ReflowEngine<T: TieBreak = MinimalMovement> {
    config: ReflowConfig,
    tie_break: T,
    scheduler: RecomputeScheduler,
    current: Rc<DecorationSet>,
    /// Pushes behind `current`, re-checked by the next pass
    held: HeldPushes,
    generation: u64,
    counters: PassCounters,
    telemetry: Option<PassTelemetry>,
}

impl ReflowEngine {
    /// Create an engine with the default tie-break
    pub fn new(config: ReflowConfig) -> Self {
        Self::with_tie_break(config, MinimalMovement)
    }
}

impl Default for ReflowEngine {
    fn default() -> Self {
        Self::new(ReflowConfig::default())
    }
}

impl<T: TieBreak> ReflowEngine<T> {
    pub fn with_tie_break(config: ReflowConfig, tie_break: T) -> Self {
        let scheduler = RecomputeScheduler::new(config.max_unstable_retries);
        Self {
            config,
            tie_break,
            scheduler,
            current: Rc::new(DecorationSet::empty()),
            held: HeldPushes::new(),
            generation: 0,
            counters: PassCounters::default(),
            telemetry: None,
        }
    }

    pub fn config(&self) -> &ReflowConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &RecomputeScheduler {
        &self.scheduler
    }

    /// Number of committed passes
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The committed decoration set
    pub fn decorations(&self) -> Rc<DecorationSet> {
        Rc::clone(&self.current)
    }

    /// Counters of the last committed pass
    pub fn counters(&self) -> PassCounters {
        self.counters
    }

    /// Tables of the last committed pass; only kept when telemetry is on
    pub fn telemetry(&self) -> Option<&PassTelemetry> {
        self.telemetry.as_ref()
    }

    /// Record a change; the answer tells the host whether to request a frame
    pub fn notify(&mut self, trigger: Trigger) -> RequestOutcome {
        self.scheduler.request(trigger)
    }

    /// Animation-frame callback: runs the pass if one was scheduled
    pub fn frame(
        &mut self,
        document: &Document,
        headers: &PageHeaders,
        page_height: f32,
        geometry: &impl GeometryPort,
    ) -> FrameOutcome {
        if !self.scheduler.begin_frame() {
            return FrameOutcome::Skipped;
        }
        let result = self
            .run_pass(document, headers, page_height, geometry)
            .map(|_| ());
        self.scheduler.finish_frame(result)
    }

    /// Run one full pass now and commit its decoration set.
    ///
    /// On unstable geometry nothing is committed and the previous set stays
    /// current. Pushes of the current set are held while the page they moved
    /// their anchor off still cannot take it, so a layout that already shows
    /// the spacers yields the same set again.
    pub fn run_pass(
        &mut self,
        document: &Document,
        headers: &PageHeaders,
        page_height: f32,
        geometry: &impl GeometryPort,
    ) -> Result<Rc<DecorationSet>, GeometryUnstable> {
        let bands = PageBands::resolve(headers, page_height).map_err(|err| {
            log::debug!("pass aborted: {}", err);
            err
        })?;

        let index = BlockIndex::collect(document, &bands, geometry);
        let mut violations: Vec<Violation> = index
            .unresolved()
            .iter()
            .map(|&block| Violation::UnresolvedBlockPosition { block })
            .collect();

        let actions = RuleEngine::with_tie_break(&self.config, &self.tie_break)
            .evaluate_holding(&index, &bands, geometry, &self.held);

        let generation = self.generation + 1;
        let set = DecorationBuilder::new(&self.config).build(
            &actions,
            generation,
            document.version(),
            &mut violations,
        );

        let counters = PassCounters::tally(&actions, &violations);
        log::trace!(
            "pass {}: {} bands, {} blocks, {:?}",
            generation,
            bands.len(),
            index.len(),
            counters
        );

        self.telemetry = self
            .config
            .telemetry
            .then(|| PassTelemetry::capture(generation, &bands, &index, counters, &violations));
        self.counters = counters;
        self.generation = generation;
        self.held = HeldPushes::capture(&actions);
        self.current = Rc::new(set);

        Ok(Rc::clone(&self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> Document {
        Document::from_blocks([
            (BlockKind::Action, "She waits."),
            (BlockKind::Transition, "CUT TO:"),
        ])
    }

    fn rects() -> RectTable {
        // Transition lands at the very top of page two
        RectTable::new().with(1, 40.0, 80.0).with(2, 100.0, 112.0)
    }

    #[test]
    fn test_run_pass_commits() {
        let mut engine = ReflowEngine::default();
        let before = engine.decorations();
        let set = engine
            .run_pass(&script(), &PageHeaders::uniform(2, 100.0), 100.0, &rects())
            .unwrap();

        assert_eq!(engine.generation(), 1);
        assert_eq!(set.generation(), 1);
        assert!(before.is_empty());
        assert!(Rc::ptr_eq(&set, &engine.decorations()));
        assert_eq!(set.len(), 1);
        assert!(set.as_slice()[0].is_spacer());
        assert_eq!(engine.counters().pushed_blocks, 1);
        assert!(engine.telemetry().is_none());
    }

    #[test]
    fn test_push_held_once_rendered() {
        let mut engine = ReflowEngine::default();
        let headers = PageHeaders::uniform(3, 100.0);
        let first = engine.run_pass(&script(), &headers, 100.0, &rects()).unwrap();
        assert_eq!(
            first.as_slice()[0].kind,
            DecorationKind::Spacer { height: 98.0 }
        );

        // Spacer rendered: the transition opens page three
        let relaid = RectTable::new().with(1, 40.0, 80.0).with(2, 200.0, 212.0);
        let second = engine.run_pass(&script(), &headers, 100.0, &relaid).unwrap();
        assert_eq!(second, first);
        assert_eq!(engine.counters().pushed_blocks, 1);
        assert_eq!(engine.generation(), 2);
    }

    #[test]
    fn test_unstable_pass_keeps_previous_set() {
        let mut engine = ReflowEngine::default();
        let first = engine
            .run_pass(&script(), &PageHeaders::uniform(2, 100.0), 100.0, &rects())
            .unwrap();

        let headers = PageHeaders::new(vec![0.0, 100.0], 3);
        let err = engine.run_pass(&script(), &headers, 100.0, &rects());
        assert!(matches!(
            err,
            Err(GeometryUnstable::HeaderCountMismatch { .. })
        ));
        assert!(Rc::ptr_eq(&first, &engine.decorations()));
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn test_frame_follows_scheduler() {
        let mut engine = ReflowEngine::default();
        let headers = PageHeaders::uniform(2, 100.0);

        assert_eq!(
            engine.frame(&script(), &headers, 100.0, &rects()),
            FrameOutcome::Skipped
        );
        assert_eq!(
            engine.notify(Trigger::DocumentChanged),
            RequestOutcome::RequestFrame
        );
        assert_eq!(
            engine.notify(Trigger::ContainerResized),
            RequestOutcome::Absorbed
        );
        assert_eq!(
            engine.frame(&script(), &headers, 100.0, &rects()),
            FrameOutcome::Done
        );
        assert_eq!(engine.generation(), 1);
        assert_eq!(engine.scheduler().state(), SchedulerState::Idle);
    }

    #[test]
    fn test_unstable_frames_retry() {
        let mut engine = ReflowEngine::default();
        let bad = PageHeaders::new(vec![0.0], 2);
        engine.notify(Trigger::PaginationMutated);

        assert_eq!(
            engine.frame(&script(), &bad, 100.0, &rects()),
            FrameOutcome::RequestFrame
        );
        assert_eq!(
            engine.frame(&script(), &PageHeaders::uniform(2, 100.0), 100.0, &rects()),
            FrameOutcome::Done
        );
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn test_telemetry_collected_when_enabled() {
        let config = ReflowConfig {
            telemetry: true,
            ..ReflowConfig::default()
        };
        let mut engine = ReflowEngine::new(config);
        engine
            .run_pass(&script(), &PageHeaders::uniform(2, 100.0), 100.0, &rects())
            .unwrap();

        let telemetry = engine.telemetry().unwrap();
        assert_eq!(telemetry.generation, 1);
        assert_eq!(telemetry.bands.len(), 2);
        assert_eq!(telemetry.blocks.len(), 2);
        assert_eq!(telemetry.counters.pushed_blocks, 1);
    }

    #[test]
    fn test_unresolved_blocks_reported() {
        let mut engine = ReflowEngine::default();
        let doc = Document::from_blocks([(BlockKind::Action, "Lost.")]);
        engine
            .run_pass(&doc, &PageHeaders::uniform(2, 100.0), 100.0, &RectTable::new())
            .unwrap();
        assert_eq!(engine.counters().unresolved_blocks, 1);
        assert!(engine.decorations().is_empty());
    }
}
