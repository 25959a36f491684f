//! Anchor selection for split character/parenthetical/dialogue groups

use crate::layout::BlockIndex;

/// A parenthetical separated from its dialogue by a page boundary
#[derive(Debug, Clone, Copy)]
pub struct GroupingConflict<'i, 'a> {
    pub index: &'i BlockIndex<'a>,
    pub parenthetical: usize,
    pub dialogue: usize,
    /// Preceding character cue on the parenthetical's page, if any
    pub character: Option<usize>,
    /// The cue itself lacks room for a dialogue line
    pub character_lacks_room: bool,
}

/// Decides which block to push when a parenthetical and its dialogue split.
///
/// Returning `None` leaves the group alone for this pass.
pub trait TieBreak {
    fn choose(&self, conflict: &GroupingConflict<'_, '_>) -> Option<usize>;
}

impl<T: TieBreak + ?Sized> TieBreak for &T {
    fn choose(&self, conflict: &GroupingConflict<'_, '_>) -> Option<usize> {
        (**self).choose(conflict)
    }
}

/// Move as few blocks as possible.
///
/// Pushing the parenthetical moves one block; pushing the cue moves two, so
/// the cue only wins when it is stranded anyway and one push fixes both.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalMovement;

impl TieBreak for MinimalMovement {
    fn choose(&self, conflict: &GroupingConflict<'_, '_>) -> Option<usize> {
        match conflict.character {
            Some(character) if conflict.character_lacks_room => Some(character),
            _ => Some(conflict.parenthetical),
        }
    }
}
