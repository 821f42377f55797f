pub mod call_graph;
pub mod line_stats;

use thiserror::Error;

pub use call_graph::{CallGraphParseError, parse_call_graph};
pub use line_stats::{LineStatsParseError, parse_line_stats};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("call graph: {0}")]
    CallGraph(#[from] CallGraphParseError),
    #[error("line stats: {0}")]
    LineStats(#[from] LineStatsParseError),
}
