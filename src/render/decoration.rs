//! Decorations: the engine's only output

use crate::config::ReflowConfig;
use crate::error::Violation;
use crate::rules::CorrectiveAction;
use serde::Serialize;

/// Which side of its position a decoration attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Rendered before content at the position
    Before,
    /// Rendered after content ending at the position
    After,
}

/// What the host renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DecorationKind {
    /// Block-level, view-only vertical space
    Spacer { height: f32 },
    /// `(MORE)` at the bottom of a page
    MoreMarker { text: String },
    /// Repeated cue with a `(CONT'D)` extension at the top of a page
    ContdMarker { cue: String, suffix: String },
}

/// A single view annotation at a document position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoration {
    pub position: usize,
    pub side: Side,
    #[serde(flatten)]
    pub kind: DecorationKind,
}

impl Decoration {
    /// Text the marker displays; spacers have none
    pub fn text(&self) -> Option<String> {
        match &self.kind {
            DecorationKind::Spacer { .. } => None,
            DecorationKind::MoreMarker { text } => Some(text.clone()),
            DecorationKind::ContdMarker { cue, suffix } => Some(format!("{cue}{suffix}")),
        }
    }

    pub fn is_spacer(&self) -> bool {
        matches!(self.kind, DecorationKind::Spacer { .. })
    }
}

/// Complete, immutable decoration set for one pass.
///
/// Every pass builds a new set; there is no way to patch one in place.
/// Equality compares the decorations only: two passes that produce the same
/// output are equal whatever their generation or document version.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationSet {
    generation: u64,
    doc_version: u64,
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Pass counter of the engine that committed this set
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Host document version the set was computed against
    pub fn doc_version(&self) -> u64 {
        self.doc_version
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn as_slice(&self) -> &[Decoration] {
        &self.decorations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    /// Decorations anchored at `position`
    pub fn at(&self, position: usize) -> impl Iterator<Item = &Decoration> {
        let start = self.decorations.partition_point(|d| d.position < position);
        self.decorations[start..]
            .iter()
            .take_while(move |d| d.position == position)
    }

    /// Same decorations, ignoring generation and document version
    pub fn same_content(&self, other: &DecorationSet) -> bool {
        self.decorations == other.decorations
    }
}

impl PartialEq for DecorationSet {
    fn eq(&self, other: &Self) -> bool {
        self.same_content(other)
    }
}

/// Turns corrective actions into a decoration set
pub struct DecorationBuilder<'c> {
    config: &'c ReflowConfig,
}

impl<'c> DecorationBuilder<'c> {
    pub fn new(config: &'c ReflowConfig) -> Self {
        Self { config }
    }

    /// Build the set. Negative spacer heights are clamped to zero and
    /// reported as [`Violation::PushExhausted`].
    pub fn build(
        &self,
        actions: &[CorrectiveAction],
        generation: u64,
        doc_version: u64,
        violations: &mut Vec<Violation>,
    ) -> DecorationSet {
        let mut decorations: Vec<Decoration> = actions
            .iter()
            .map(|action| match action {
                CorrectiveAction::PushToNextPage {
                    anchor_pos, amount, ..
                } => {
                    let height = amount - self.config.safety_margin;
                    if height < 0.0 {
                        log::debug!("push at {} exhausted by {}", anchor_pos, -height);
                        violations.push(Violation::PushExhausted {
                            anchor: *anchor_pos,
                            deficit: -height,
                        });
                    }
                    Decoration {
                        position: *anchor_pos,
                        side: Side::Before,
                        kind: DecorationKind::Spacer {
                            height: height.max(0.0),
                        },
                    }
                }
                CorrectiveAction::MoreMarker { at_pos } => Decoration {
                    position: *at_pos,
                    side: Side::Before,
                    kind: DecorationKind::MoreMarker {
                        text: self.config.more_text.clone(),
                    },
                },
                CorrectiveAction::ContdMarker { at_pos, cue } => Decoration {
                    position: *at_pos,
                    side: Side::After,
                    kind: DecorationKind::ContdMarker {
                        cue: cue.clone(),
                        suffix: self.config.contd_suffix.clone(),
                    },
                },
            })
            .collect();

        decorations.sort_by_key(|d| (d.position, d.side));

        DecorationSet {
            generation,
            doc_version,
            decorations,
        }
    }
}
