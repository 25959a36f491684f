//! Page geometry and block collection

mod bands;
mod collector;
mod font;
mod line_break;

pub use bands::{PageBand, PageBands, PageHeaders};
pub use collector::{Block, BlockIndex, BlockRect, GeometryPort, RectTable};
pub use font::FontMetrics;
pub use line_break::{LineEstimator, SplitPoint};
