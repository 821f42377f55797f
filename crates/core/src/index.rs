use std::cell::OnceCell;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::line_text::{FsSource, SourceProvider};
use crate::model::{CallStats, EntryPoint, FunctionKey, FunctionRecord, LineStats, RawCallGraph};
use crate::options::RootMatch;

/// Read-only view over one profiling session's call graph.
///
/// The callee map (the inverse of every function's caller map) is derived
/// exactly once, here in the constructor. The root function is looked up
/// lazily and cached for the lifetime of the index: once a root has been
/// found, later lookups return it even when asked about another entry
/// point. Build a new index per profiled call.
pub struct CallGraphIndex {
    functions: Vec<FunctionRecord>,
    positions: HashMap<FunctionKey, usize>,
    callees: HashMap<FunctionKey, Vec<(FunctionKey, CallStats)>>,
    line_stats: LineStats,
    source: Box<dyn SourceProvider>,
    root: OnceCell<FunctionKey>,
}

impl CallGraphIndex {
    pub fn new(graph: RawCallGraph, line_stats: LineStats) -> Self {
        let mut functions = Vec::with_capacity(graph.functions.len());
        let mut positions = HashMap::with_capacity(graph.functions.len());
        for record in graph.functions {
            if positions.contains_key(&record.key) {
                warn!(function = %record.key, "duplicate call-graph entry ignored");
                continue;
            }
            positions.insert(record.key.clone(), functions.len());
            functions.push(record);
        }

        let mut callees: HashMap<FunctionKey, Vec<(FunctionKey, CallStats)>> = HashMap::new();
        for record in &functions {
            for (caller, stats) in &record.callers {
                callees
                    .entry(caller.clone())
                    .or_default()
                    .push((record.key.clone(), *stats));
            }
        }

        debug!(
            functions = functions.len(),
            callers = callees.len(),
            line_profiled = line_stats.len(),
            "indexed call graph"
        );

        Self {
            functions,
            positions,
            callees,
            line_stats,
            source: Box::new(FsSource),
            root: OnceCell::new(),
        }
    }

    /// Read source code for line reports from `source` instead of the
    /// filesystem.
    pub fn with_source(mut self, source: impl SourceProvider + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    /// Functions called directly by `key`, with the stats of each edge, in
    /// the profiler's record order.
    pub fn callees_of(&self, key: &FunctionKey) -> &[(FunctionKey, CallStats)] {
        self.callees.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Functions that called `key` directly.
    pub fn callers_of(&self, key: &FunctionKey) -> &[(FunctionKey, CallStats)] {
        self.record(key)
            .map(|r| r.callers.as_slice())
            .unwrap_or_default()
    }

    pub fn stats_of(&self, key: &FunctionKey) -> Option<CallStats> {
        self.record(key).map(|r| r.stats)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionKey> {
        self.functions.iter().map(|r| &r.key)
    }

    pub fn line_stats(&self) -> &LineStats {
        &self.line_stats
    }

    pub fn has_line_stats(&self, key: &FunctionKey) -> bool {
        self.line_stats.contains(key)
    }

    pub fn source(&self) -> &dyn SourceProvider {
        self.source.as_ref()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// The function the profiled call entered through.
    ///
    /// Scans functions in record order for the first one defined at
    /// `entry`; under [`RootMatch::Strict`] it must also have no callers.
    /// A hit is cached, misses are not.
    pub fn root_function(&self, entry: &EntryPoint, mode: RootMatch) -> Option<FunctionKey> {
        if let Some(root) = self.root.get() {
            return Some(root.clone());
        }

        let found = self
            .functions
            .iter()
            .find(|r| {
                entry.matches(&r.key)
                    && match mode {
                        RootMatch::Loose => true,
                        RootMatch::Strict => r.callers.is_empty(),
                    }
            })
            .map(|r| r.key.clone());

        match &found {
            Some(key) => {
                debug!(root = %key, "found root function");
                let _ = self.root.set(key.clone());
            }
            None => warn!(
                file = %entry.file,
                line = entry.line,
                ?mode,
                "no profiled function matches the entry point"
            ),
        }
        found
    }

    fn record(&self, key: &FunctionKey) -> Option<&FunctionRecord> {
        self.positions.get(key).map(|&i| &self.functions[i])
    }
}

impl std::fmt::Debug for CallGraphIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGraphIndex")
            .field("functions", &self.functions.len())
            .field("callers", &self.callees.len())
            .field("line_profiled", &self.line_stats.len())
            .field("root", &self.root.get())
            .finish()
    }
}
