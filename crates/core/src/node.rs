use std::cell::OnceCell;

use linetree_protocol::{CallRow, Hsv, SharedStr};
use tracing::warn;

use crate::index::CallGraphIndex;
use crate::line_text::render_line_stats;
use crate::model::{CallStats, FunctionKey};

/// Install-directory markers stripped from the front of library paths.
const LIBRARY_MARKERS: [&str; 2] = ["/site-packages/", "/dist-packages/"];

/// Pixels of indentation per tree level.
const INDENT_PER_LEVEL: u32 = 16;

/// One row of the call tree: a function as reached through one particular
/// chain of callers.
///
/// Timing identity is fixed at construction. The line-stats report is
/// rendered on first access and cached, and `has_subfuncs` is filled in by
/// the tree builder once it knows whether any child made the cut.
pub struct FunctionCallNode<'a> {
    index: &'a CallGraphIndex,
    key: FunctionKey,
    stats: CallStats,
    depth: u32,
    id: SharedStr,
    ancestor_ids: Vec<SharedStr>,
    color: Hsv,
    line_stats_text: OnceCell<Option<String>>,
    pub(crate) has_subfuncs: bool,
}

impl<'a> FunctionCallNode<'a> {
    /// A node for `key` with its whole-profile stats (zeroed when the index
    /// never saw it), id `"0"`, no ancestors and the root color.
    pub fn new(index: &'a CallGraphIndex, key: FunctionKey, depth: u32) -> Self {
        let stats = index.stats_of(&key).unwrap_or_default();
        Self {
            index,
            key,
            stats,
            depth,
            id: SharedStr::from("0"),
            ancestor_ids: Vec::new(),
            color: Hsv::default(),
            line_stats_text: OnceCell::new(),
            has_subfuncs: false,
        }
    }

    pub fn root(index: &'a CallGraphIndex, key: FunctionKey) -> Self {
        Self::new(index, key, 0)
    }

    pub fn with_stats(mut self, stats: CallStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_id(mut self, id: impl Into<SharedStr>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_ancestors(mut self, ancestor_ids: Vec<SharedStr>) -> Self {
        self.ancestor_ids = ancestor_ids;
        self
    }

    pub fn with_color(mut self, color: Hsv) -> Self {
        self.color = color;
        self
    }

    pub fn key(&self) -> &FunctionKey {
        &self.key
    }

    pub fn stats(&self) -> CallStats {
        self.stats
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn id(&self) -> &SharedStr {
        &self.id
    }

    pub fn ancestor_ids(&self) -> &[SharedStr] {
        &self.ancestor_ids
    }

    pub fn color(&self) -> Hsv {
        self.color
    }

    pub fn has_subfuncs(&self) -> bool {
        self.has_subfuncs
    }

    pub fn has_line_stats(&self) -> bool {
        self.index.has_line_stats(&self.key)
    }

    pub fn call_count(&self) -> u64 {
        self.stats.call_count
    }

    pub fn self_time(&self) -> f64 {
        self.stats.self_time
    }

    pub fn cumulative_time(&self) -> f64 {
        self.stats.cumulative_time
    }

    /// Self time per primitive call; 0 when no primitive calls were recorded.
    pub fn self_time_per_call(&self) -> f64 {
        per_call(self.stats.self_time, self.stats.primitive_calls)
    }

    /// Cumulative time per primitive call; 0 when no primitive calls were
    /// recorded.
    pub fn cumulative_time_per_call(&self) -> f64 {
        per_call(self.stats.cumulative_time, self.stats.primitive_calls)
    }

    pub fn indent(&self) -> u32 {
        INDENT_PER_LEVEL * self.depth
    }

    pub fn background(&self) -> String {
        self.color.css_background()
    }

    /// HTML naming this function, safe to embed as markup: every field taken
    /// from the profile is escaped.
    pub fn display_name(&self) -> String {
        match &self.key {
            FunctionKey::Builtin { name } => escape_html(&builtin_label(name)),
            FunctionKey::User { file, line, name } => {
                let (dir, file_name) = split_path(strip_library_prefix(file));
                let path = dir
                    .map(|d| format!(r#"<span class="path">{}/</span>"#, escape_html(d)))
                    .unwrap_or_default();
                format!(
                    r#"{path}<span class="file">{}</span> in <span class="func">{}</span>(<span class="lineno">{line}</span>)"#,
                    escape_html(file_name),
                    escape_html(name),
                )
            }
        }
    }

    /// The text of [`display_name`](Self::display_name) without markup.
    pub fn plain_name(&self) -> String {
        match &self.key {
            FunctionKey::Builtin { name } => builtin_label(name),
            FunctionKey::User { file, line, name } => {
                format!("{} in {name}({line})", strip_library_prefix(file))
            }
        }
    }

    /// Children in callee-map order, one level deeper.
    ///
    /// Hue fans out across siblings by position, shrinking with depth;
    /// saturation follows each child's share of this node's cumulative time.
    pub fn child_calls(&self) -> impl Iterator<Item = FunctionCallNode<'a>> + '_ {
        let callees = self.index.callees_of(&self.key);
        let count = callees.len() as f64;
        callees.iter().enumerate().map(move |(i, (key, stats))| {
            let position = (i + 1) as f64;
            let hue = self.color.h + (position / count) / f64::from(self.depth + 1);
            let saturation = if stats.cumulative_time == 0.0 || self.stats.cumulative_time == 0.0 {
                0.0
            } else {
                self.color.s * (stats.cumulative_time / self.stats.cumulative_time)
            };
            let mut ancestor_ids = Vec::with_capacity(self.ancestor_ids.len() + 1);
            ancestor_ids.extend(self.ancestor_ids.iter().cloned());
            ancestor_ids.push(self.id.clone());

            FunctionCallNode::new(self.index, key.clone(), self.depth + 1)
                .with_stats(*stats)
                .with_id(format!("{}_{}", self.id, i + 1))
                .with_ancestors(ancestor_ids)
                .with_color(Hsv::new(hue, saturation, 1.0))
        })
    }

    /// Line profiler report for this function, `None` when it was not
    /// line-profiled. Rendered once; later calls return the cached text.
    pub fn line_stats_text(&self) -> Option<&str> {
        self.line_stats_text
            .get_or_init(|| self.render_report())
            .as_deref()
    }

    fn render_report(&self) -> Option<String> {
        let line_stats = self.index.line_stats();
        let timings = line_stats.get(&self.key)?;
        match render_line_stats(&self.key, timings, line_stats.unit, self.index.source()) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(function = %self.key, %err, "line stats fell back to a notice");
                Some(err.to_string())
            }
        }
    }

    /// Snapshot this node as a serializable row.
    pub fn to_row(&self) -> CallRow {
        CallRow {
            id: self.id.clone(),
            ancestor_ids: self.ancestor_ids.clone(),
            depth: self.depth,
            indent: self.indent(),
            color: self.color,
            background: self.background(),
            display_name: self.display_name(),
            plain_name: self.plain_name(),
            call_count: self.stats.call_count,
            primitive_calls: self.stats.primitive_calls,
            self_time: self.self_time(),
            self_time_per_call: self.self_time_per_call(),
            cumulative_time: self.cumulative_time(),
            cumulative_time_per_call: self.cumulative_time_per_call(),
            line_stats: self.line_stats_text().map(str::to_owned),
            has_subfuncs: self.has_subfuncs,
        }
    }
}

impl std::fmt::Debug for FunctionCallNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCallNode")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("depth", &self.depth)
            .field("stats", &self.stats)
            .field("has_subfuncs", &self.has_subfuncs)
            .finish()
    }
}

fn per_call(time: f64, calls: u64) -> f64 {
    if calls == 0 { 0.0 } else { time / calls as f64 }
}

/// `<built-in method len>` reads as `{built-in method len}`.
fn builtin_label(name: &str) -> String {
    match name.strip_prefix('<').and_then(|n| n.strip_suffix('>')) {
        Some(inner) => format!("{{{inner}}}"),
        None => name.to_string(),
    }
}

fn strip_library_prefix(path: &str) -> &str {
    LIBRARY_MARKERS
        .iter()
        .find_map(|&marker| path.find(marker).map(|i| &path[i + marker.len()..]))
        .unwrap_or(path)
}

fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rfind(['/', '\\']) {
        Some(i) => (Some(&path[..i]), &path[i + 1..]),
        None => (None, path),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
