//! # postmerge G-code
//!
//! Line-level G-code handling for postmerge: classifying post processor output,
//! splitting fragments into header, body and tail, injecting tool-change code,
//! renumbering, and optionally rewriting non-cutting feed moves as rapids.

pub mod error;
pub mod line;
pub mod merge;
pub mod rapid;
pub mod renumber;
pub mod splitter;
pub mod toolchange;

pub use error::HeuristicError;
pub use line::{Code, CodeSet, GcodeLine, Segment, Word};
pub use merge::{
    merge_fragments, FragmentMerger, MergeOptions, MergeStats, MergedProgram, ProgramRename,
};
pub use rapid::{Motion, RapidMoveRewriter, RapidMoveState, RapidOptions, FEED_HEIGHT_MARGIN};
pub use renumber::LineRenumberer;
pub use splitter::{split_fragment, EndMarkers, Region, SplitState};
pub use toolchange::ToolChange;
