pub mod key;
pub mod line_stats;
pub mod stats;

pub use key::{EntryPoint, FunctionKey};
pub use line_stats::{LineStats, LineTiming};
pub use stats::{CallStats, FunctionRecord, RawCallGraph};
