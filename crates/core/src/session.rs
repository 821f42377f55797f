use linetree_protocol::CallTreeView;
use tracing::{debug, info, warn};

use crate::index::CallGraphIndex;
use crate::instrument::{
    CallArgs, CallGraphProfiler, CodeLocation, LineInstrumentation, ProfiledCallable,
    ProfilerError, ProfilerSetup, SetupHooks, collect_targets,
};
use crate::line_text::SourceProvider;
use crate::model::{EntryPoint, FunctionKey, LineStats};
use crate::node::FunctionCallNode;
use crate::options::TreeOptions;
use crate::parsers::{ParseError, parse_call_graph, parse_line_stats};
use crate::tree::build_tree;

/// Everything recorded for one profiled call, ready to be turned into a
/// call tree.
#[derive(Debug)]
pub struct ProfileSession {
    entry: Option<EntryPoint>,
    index: CallGraphIndex,
    options: TreeOptions,
}

impl ProfileSession {
    pub fn new(entry: Option<EntryPoint>, index: CallGraphIndex, options: TreeOptions) -> Self {
        Self {
            entry,
            index,
            options,
        }
    }

    /// Build a session from saved profiler dumps.
    ///
    /// Without an `entry`, the first non-built-in function nobody called is
    /// used as the root.
    pub fn from_dumps(
        call_graph: &[u8],
        line_stats: Option<&[u8]>,
        entry: Option<EntryPoint>,
        options: TreeOptions,
    ) -> Result<Self, ParseError> {
        let graph = parse_call_graph(call_graph)?;
        let line_stats = match line_stats {
            Some(data) => parse_line_stats(data)?,
            None => LineStats::default(),
        };
        info!(
            functions = graph.len(),
            line_profiled = line_stats.len(),
            "loaded profile dumps"
        );
        Ok(Self::new(entry, CallGraphIndex::new(graph, line_stats), options))
    }

    /// Profile one call of `target`.
    ///
    /// The line profiler is given `target` and its additional targets, then
    /// every setup hook, before `call` runs under both profilers. The line
    /// profiler is disabled again even when the call-graph profiler fails.
    pub fn profile_call<P, R>(
        target: &dyn ProfiledCallable,
        args: &CallArgs,
        hooks: &SetupHooks,
        call_profiler: &mut P,
        line_profiler: &mut dyn LineInstrumentation,
        options: TreeOptions,
        call: impl FnOnce() -> R,
    ) -> Result<(R, Self), ProfilerError>
    where
        P: CallGraphProfiler,
    {
        collect_targets(target, line_profiler);
        hooks.dispatch(&mut ProfilerSetup {
            profiler: &mut *line_profiler,
            target,
            args,
        });

        line_profiler.enable()?;
        let output = call_profiler.run_call(call);
        let disabled = line_profiler.disable();
        let output = output?;
        disabled?;

        let graph = call_profiler.create_stats()?;
        let line_stats = line_profiler.stats()?;
        debug!(
            functions = graph.len(),
            line_profiled = line_stats.len(),
            "profiled call finished"
        );

        let entry = target.code().as_ref().map(CodeLocation::entry_point);
        let index = CallGraphIndex::new(graph, line_stats);
        Ok((output, Self::new(entry, index, options)))
    }

    /// Read line-report source code from `source` instead of the filesystem.
    pub fn with_source(mut self, source: impl SourceProvider + 'static) -> Self {
        self.index = self.index.with_source(source);
        self
    }

    pub fn entry(&self) -> Option<&EntryPoint> {
        self.entry.as_ref()
    }

    pub fn index(&self) -> &CallGraphIndex {
        &self.index
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// The function the tree hangs from, if the profile contains it.
    pub fn root(&self) -> Option<FunctionKey> {
        match &self.entry {
            Some(entry) => self.index.root_function(entry, self.options.root_match),
            None => {
                let root = self
                    .index
                    .functions()
                    .find(|key| !key.is_builtin() && self.index.callers_of(key).is_empty())
                    .cloned();
                if root.is_none() {
                    warn!("no uncalled function to use as the root");
                }
                root
            }
        }
    }

    /// The pruned call tree in pre-order, empty when no root was found.
    pub fn call_tree(&self) -> Vec<FunctionCallNode<'_>> {
        let Some(key) = self.root() else {
            return Vec::new();
        };
        let root = FunctionCallNode::root(&self.index, key);
        let threshold = self.options.root_threshold(root.cumulative_time());
        build_tree(root, threshold, &self.options)
    }

    /// [`call_tree`](Self::call_tree) as serializable rows.
    pub fn rows(&self) -> CallTreeView {
        CallTreeView::new(self.call_tree().iter().map(FunctionCallNode::to_row).collect())
    }
}
