use serde::Deserialize;
use thiserror::Error;

use crate::model::{FunctionKey, LineStats, LineTiming};

#[derive(Debug, Error)]
pub enum LineStatsParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("timer unit must be a positive finite number of seconds, got {0}")]
    InvalidUnit(f64),
    #[error("function {0} has more than one timing table")]
    DuplicateFunction(FunctionKey),
    #[error("line {line} of {function} has invalid time {value}")]
    InvalidTime {
        function: FunctionKey,
        line: u32,
        value: f64,
    },
}

/// Line profiler dump:
/// `{"unit": 1e-6, "timings": [{"function": [file, line, name], "lines": [[line, hits, time]]}]}`
#[derive(Debug, Deserialize)]
struct LineStatsDump {
    unit: f64,
    #[serde(default)]
    timings: Vec<TimingEntry>,
}

#[derive(Debug, Deserialize)]
struct TimingEntry {
    function: FunctionKey,
    lines: Vec<(u32, u64, f64)>,
}

/// Parse a line-stats dump. An empty `timings` list is valid and means no
/// function was line-profiled.
pub fn parse_line_stats(data: &[u8]) -> Result<LineStats, LineStatsParseError> {
    let dump: LineStatsDump = serde_json::from_slice(data)?;
    if !(dump.unit.is_finite() && dump.unit > 0.0) {
        return Err(LineStatsParseError::InvalidUnit(dump.unit));
    }

    let mut stats = LineStats::new(dump.unit);
    for entry in dump.timings {
        if stats.contains(&entry.function) {
            return Err(LineStatsParseError::DuplicateFunction(entry.function));
        }
        let mut lines = Vec::with_capacity(entry.lines.len());
        for (line, hits, time) in entry.lines {
            if !(time.is_finite() && time >= 0.0) {
                return Err(LineStatsParseError::InvalidTime {
                    function: entry.function,
                    line,
                    value: time,
                });
            }
            lines.push(LineTiming::new(line, hits, time));
        }
        stats.insert(entry.function, lines);
    }
    Ok(stats)
}
