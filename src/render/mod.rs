//! Render output: decoration sets and pass telemetry

mod decoration;
mod telemetry;

pub use decoration::{Decoration, DecorationBuilder, DecorationKind, DecorationSet, Side};
pub use telemetry::{BlockAssignment, PassCounters, PassTelemetry};
