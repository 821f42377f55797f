use serde::{Deserialize, Serialize};

use crate::color::Hsv;
use crate::shared_str::SharedStr;

/// One rendered row of the profiling call tree.
///
/// Rows arrive as a depth-first pre-order list: every row is followed by
/// the contiguous run of its descendants. A renderer can therefore draw the
/// whole tree, including indentation and collapsible groups, in a single
/// linear pass without rebuilding any tree structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRow {
    /// Hierarchical id: `"0"` for the root, `"<parent>_<n>"` below it.
    pub id: SharedStr,
    /// Ids of every ancestor, root first.
    pub ancestor_ids: Vec<SharedStr>,
    /// Tree depth (0 = root).
    pub depth: u32,
    /// Indentation in pixels.
    pub indent: u32,
    pub color: Hsv,
    /// CSS background derived from `color`.
    pub background: String,
    /// HTML markup naming the function; every interpolated field is escaped.
    pub display_name: String,
    /// The same name as plain text.
    pub plain_name: String,
    pub call_count: u64,
    pub primitive_calls: u64,
    /// Seconds spent in the function itself.
    pub self_time: f64,
    pub self_time_per_call: f64,
    /// Seconds spent in the function and everything it called.
    pub cumulative_time: f64,
    pub cumulative_time_per_call: f64,
    /// Line profiler report, present only for line-profiled functions.
    pub line_stats: Option<String>,
    /// Whether any child row follows this one.
    pub has_subfuncs: bool,
}

/// The full row list handed to a renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallTreeView {
    pub rows: Vec<CallRow>,
}

impl CallTreeView {
    pub fn new(rows: Vec<CallRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// No root function was found, or nothing was profiled.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index one past the last descendant of the row at `index`.
    ///
    /// Relies on pre-order layout: descendants end at the first following
    /// row that is not deeper than `index`.
    pub fn subtree_end(&self, index: usize) -> usize {
        let Some(row) = self.rows.get(index) else {
            return index;
        };
        self.rows[index + 1..]
            .iter()
            .position(|r| r.depth <= row.depth)
            .map_or(self.rows.len(), |offset| index + 1 + offset)
    }

    /// Direct children of the row with the given id, in display order.
    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a CallRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.ancestor_ids.last().is_some_and(|p| p == id))
    }

    /// Rows left visible when every id in `collapsed` hides its descendants.
    pub fn visible<'a>(
        &'a self,
        collapsed: &'a std::collections::HashSet<SharedStr>,
    ) -> impl Iterator<Item = (usize, &'a CallRow)> + 'a {
        self.rows.iter().enumerate().filter(move |(_, r)| {
            !r.ancestor_ids
                .iter()
                .any(|a| collapsed.contains(a.as_str()))
        })
    }
}

/// Format a duration in seconds the way the panel shows timings.
pub fn format_seconds(value: f64) -> String {
    if value >= 1.0 {
        format!("{value:.2}s")
    } else if value >= 0.001 {
        format!("{:.1}ms", value * 1_000.0)
    } else {
        format!("{:.0}µs", value * 1_000_000.0)
    }
}
