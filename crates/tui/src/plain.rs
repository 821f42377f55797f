use std::io::{self, Write};

use linetree_protocol::{CallRow, CallTreeView, format_seconds};

/// Write the tree as an indented text table, one row per line.
pub fn write_tree(out: &mut impl Write, view: &CallTreeView, line_stats: bool) -> io::Result<()> {
    if view.is_empty() {
        return writeln!(out, "no call tree: the entry point was not found in the profile");
    }
    writeln!(
        out,
        "{:>9} {:>9} {:>9} {:>9} {:>7}  function",
        "cum", "cum/call", "self", "self/call", "calls"
    )?;
    for row in &view.rows {
        writeln!(
            out,
            "{:>9} {:>9} {:>9} {:>9} {:>7}  {:indent$}{}",
            format_seconds(row.cumulative_time),
            format_seconds(row.cumulative_time_per_call),
            format_seconds(row.self_time),
            format_seconds(row.self_time_per_call),
            calls(row),
            "",
            row.plain_name,
            indent = 2 * row.depth as usize,
        )?;
        if line_stats && let Some(report) = &row.line_stats {
            for line in report.lines() {
                writeln!(out, "    | {line}")?;
            }
        }
    }
    Ok(())
}

/// `21/1` when some calls were recursive, otherwise the plain count.
fn calls(row: &CallRow) -> String {
    if row.call_count == row.primitive_calls {
        row.call_count.to_string()
    } else {
        format!("{}/{}", row.call_count, row.primitive_calls)
    }
}
