//! Merge a deterministic call-graph profile with line-profiler timings into
//! a pruned, depth-first call tree ready for single-pass rendering.
//!
//! ```text
//!   call-graph dump ─┐                                 ┌─▶ FunctionCallNode[] ──▶ CallRow[]
//!                    ├─▶ CallGraphIndex ──▶ build_tree ┤
//!   line-stats dump ─┘     (callee map,      (prune,   └─  (pre-order, colored,
//!                           root lookup)      depth cap)     line-stats text)
//! ```

pub mod index;
pub mod instrument;
pub mod line_text;
pub mod model;
pub mod node;
pub mod options;
pub mod parsers;
pub mod session;
pub mod tree;

pub use index::CallGraphIndex;
pub use node::FunctionCallNode;
pub use options::{RootMatch, ThresholdMode, TreeOptions};
pub use session::ProfileSession;
pub use tree::build_tree;
