//! Text report for one line-profiled function: a header with the total
//! time, then one row per source line of the function with its hits, time,
//! time per hit and share of the function's total.

use std::collections::HashMap;
use std::fmt::Write;

use thiserror::Error;

use crate::model::{FunctionKey, LineTiming};

#[derive(Debug, Error)]
pub enum LineStatsError {
    #[error("line timings could not be rendered: total time was zero")]
    ZeroTotalTime,
    #[error("line timings could not be rendered: line {line} has no hits")]
    ZeroHits { line: u32 },
    #[error("line timings could not be rendered: {0} has no source location")]
    NotSourceFunction(String),
    #[error("line timings could not be rendered: lines {first} to {last} span too many rows")]
    SpanTooLarge { first: u32, last: u32 },
}

/// Most placeholder rows listed when the source file cannot be read.
pub const MAX_PLACEHOLDER_LINES: u64 = 10_000;

/// Where report rows get their source text from.
pub trait SourceProvider {
    /// All lines of `file`, or `None` when it cannot be read.
    fn lines(&self, file: &str) -> Option<Vec<String>>;
}

/// Reads sources from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl SourceProvider for FsSource {
    fn lines(&self, file: &str) -> Option<Vec<String>> {
        let text = std::fs::read_to_string(file).ok()?;
        Some(text.lines().map(str::to_owned).collect())
    }
}

/// Sources held in memory, keyed by file path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: impl Into<String>, text: impl Into<String>) {
        self.files.insert(file.into(), text.into());
    }
}

impl SourceProvider for MemorySource {
    fn lines(&self, file: &str) -> Option<Vec<String>> {
        self.files
            .get(file)
            .map(|text| text.lines().map(str::to_owned).collect())
    }
}

const HEADER: [&str; 6] = ["Line #", "Hits", "Time", "Per Hit", "% Time", "Line Contents"];

fn row(cells: [&str; 6]) -> String {
    format!(
        "{:>6} {:>9} {:>12} {:>8} {:>8}  {}",
        cells[0], cells[1], cells[2], cells[3], cells[4], cells[5]
    )
}

/// Render the report for `key` from its per-line `timings`.
///
/// `unit` is seconds per tick. Per-line columns stay in ticks.
pub fn render_line_stats(
    key: &FunctionKey,
    timings: &[LineTiming],
    unit: f64,
    source: &dyn SourceProvider,
) -> Result<String, LineStatsError> {
    let FunctionKey::User { file, line: start, name } = key else {
        return Err(LineStatsError::NotSourceFunction(key.to_string()));
    };
    let start = *start;

    let total_time: f64 = timings.iter().map(|t| t.time).sum();
    if !timings.is_empty() && total_time == 0.0 {
        return Err(LineStatsError::ZeroTotalTime);
    }

    let mut cells: HashMap<u32, [String; 4]> = HashMap::with_capacity(timings.len());
    for t in timings {
        if t.hits == 0 {
            return Err(LineStatsError::ZeroHits { line: t.line });
        }
        cells.insert(
            t.line,
            [
                t.hits.to_string(),
                format!("{:5.1}", t.time),
                format!("{:8.1}", t.time / t.hits as f64),
                format!("{:5.1}", 100.0 * t.time / total_time),
            ],
        );
    }

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Total time: {} s", format_g(total_time * unit));

    let sublines: Vec<String> = match source.lines(file) {
        Some(lines) => {
            let _ = writeln!(out, "File: {file}");
            let _ = writeln!(out, "Function: {name} at line {start}");
            function_block(&lines, start)
        }
        None => {
            out.push('\n');
            let _ = writeln!(out, "Could not find file {file}");
            out.push_str("Are you sure you are running this program from the same directory\n");
            out.push_str("that you ran the profiler from?\n");
            out.push_str("Continuing without the function's contents.\n");
            let first = timings.iter().map(|t| t.line).min().unwrap_or(start).min(start);
            let last = timings.iter().map(|t| t.line).max().unwrap_or(start);
            let span = u64::from(last.saturating_sub(first)) + 1;
            if span > MAX_PLACEHOLDER_LINES {
                return Err(LineStatsError::SpanTooLarge { first, last });
            }
            vec![String::new(); span as usize]
        }
    };

    let header = row(HEADER);
    out.push('\n');
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"=".repeat(header.len()));
    out.push('\n');

    for (offset, text) in sublines.iter().enumerate() {
        let lineno = u64::from(start) + offset as u64;
        let lineno_text = lineno.to_string();
        let line_cells = u32::try_from(lineno).ok().and_then(|l| cells.get(&l));
        let cell = |i: usize| line_cells.map_or("", |c| c[i].as_str());
        out.push_str(&row([
            lineno_text.as_str(),
            cell(0),
            cell(1),
            cell(2),
            cell(3),
            text.trim_end_matches(['\n', '\r']),
        ]));
        out.push('\n');
    }
    out.push('\n');
    Ok(out)
}

/// The source block of a function starting at 1-based line `start`: the
/// first line (and any decorators) plus every following line that is
/// blank or indented deeper, without trailing blank lines.
fn function_block(lines: &[String], start: u32) -> Vec<String> {
    let Some(first_index) = (start as usize).checked_sub(1) else {
        return Vec::new();
    };
    let Some(first) = lines.get(first_index) else {
        return Vec::new();
    };

    let base = indentation(first);
    let mut in_decorators = first.trim_start().starts_with('@');
    let mut end = first_index + 1;
    while let Some(line) = lines.get(end) {
        if line.trim().is_empty() {
            end += 1;
            continue;
        }
        let indent = indentation(line);
        if indent > base {
            in_decorators = false;
        } else if in_decorators && indent == base {
            in_decorators = line.trim_start().starts_with('@');
        } else {
            break;
        }
        end += 1;
    }
    while end > first_index + 1 && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    lines[first_index..end].to_vec()
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// `%g`-style formatting: six significant digits, trailing zeros dropped,
/// scientific notation for very small or large magnitudes.
fn format_g(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let sci = format!("{value:.5e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if !(-4..6).contains(&exponent) {
        let mantissa = trim_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let decimals = (5 - exponent).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
