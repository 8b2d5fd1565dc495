//! sidediff-core - render diff output as side-by-side columns
//!
//! Reads normal, context, unified and combined diff output, aligns each
//! hunk into rows and prints them in two or three fixed-width columns.
//! Long lines are folded without breaking ANSI escapes or wide glyphs.

pub mod color;
pub mod flatten;
pub mod fold;
pub mod hunk;
pub mod label_stack;
pub mod merge;
pub mod parse;
pub mod render;
pub mod session;

pub use color::{ColorError, ColorMap, Field, Side};
pub use flatten::{Cell, Counters, Row};
pub use fold::{AmbiguousWidth, Boundary, FoldError, Folded, Folder, Slice};
pub use hunk::{Hunk, Line, Origin, Range, RowGroup};
pub use label_stack::LabelStack;
pub use merge::MergeError;
pub use render::{FoldMode, Layout, MarkPosition, RenderError, Renderer};
pub use session::{Options, RunSummary, Session, SessionError};
