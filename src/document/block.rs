//! Screenplay block kinds and identifiers

use serde::{Deserialize, Serialize};

/// Stable identifier the host assigns to every node of its document tree
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct BlockId(pub u64);

/// The six screenplay block types the reflow rules understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    SceneHeading,
    Action,
    Character,
    Parenthetical,
    Dialogue,
    Transition,
}

impl BlockKind {
    pub const ALL: [BlockKind; 6] = [
        BlockKind::SceneHeading,
        BlockKind::Action,
        BlockKind::Character,
        BlockKind::Parenthetical,
        BlockKind::Dialogue,
        BlockKind::Transition,
    ];

    /// Parse a host schema type name.
    ///
    /// Matching ignores ASCII case as well as `-`, `_` and spaces, so
    /// `sceneHeading`, `scene-heading` and `SCENE_HEADING` all resolve to the
    /// same kind. Unknown names yield `None`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "sceneheading" | "slugline" => Some(BlockKind::SceneHeading),
            "action" => Some(BlockKind::Action),
            "character" => Some(BlockKind::Character),
            "parenthetical" => Some(BlockKind::Parenthetical),
            "dialogue" => Some(BlockKind::Dialogue),
            "transition" => Some(BlockKind::Transition),
            _ => None,
        }
    }

    /// Canonical schema name
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockKind::SceneHeading => "sceneHeading",
            BlockKind::Action => "action",
            BlockKind::Character => "character",
            BlockKind::Parenthetical => "parenthetical",
            BlockKind::Dialogue => "dialogue",
            BlockKind::Transition => "transition",
        }
    }

    /// Character cue, parenthetical or dialogue line
    pub fn is_dialogue_part(&self) -> bool {
        matches!(
            self,
            BlockKind::Character | BlockKind::Parenthetical | BlockKind::Dialogue
        )
    }

    /// Whether this kind ends the current speaker's run
    pub fn ends_dialogue_run(&self) -> bool {
        !self.is_dialogue_part()
    }
}
