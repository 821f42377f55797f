//! Profiler plumbing around one profiled call: which functions the line
//! profiler instruments, the hooks that may add more, and the two profiler
//! capabilities a session drives.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use linetree_protocol::SharedStr;
use thiserror::Error;
use tracing::{debug, trace};

use crate::model::{EntryPoint, FunctionKey, LineStats, RawCallGraph};

#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("{profiler} profiler is already enabled")]
    AlreadyEnabled { profiler: &'static str },
    #[error("{profiler} profiler is not enabled")]
    NotEnabled { profiler: &'static str },
    #[error("stats requested before the profiled call finished")]
    StatsUnavailable,
    #[error("profiler backend failed: {0}")]
    Backend(String),
}

/// Where a function's code starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeLocation {
    pub file: SharedStr,
    pub line: u32,
    pub name: SharedStr,
}

impl CodeLocation {
    pub fn new(file: impl Into<SharedStr>, line: u32, name: impl Into<SharedStr>) -> Self {
        Self {
            file: file.into(),
            line,
            name: name.into(),
        }
    }

    pub fn entry_point(&self) -> EntryPoint {
        EntryPoint::new(self.file.clone(), self.line)
    }

    /// The key the profilers report this function under.
    pub fn key(&self) -> FunctionKey {
        FunctionKey::user(self.file.clone(), self.line, self.name.clone())
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.file, self.line, self.name)
    }
}

/// Something that can be handed to the line profiler.
///
/// Wrappers, closures and class-based handlers expose the functions they
/// delegate to through [`additional_targets`](Self::additional_targets) so
/// those get line timings too.
pub trait ProfiledCallable {
    /// `None` for callables without inspectable code (built-ins, partials).
    fn code(&self) -> Option<CodeLocation>;

    fn additional_targets(&self) -> Vec<&dyn ProfiledCallable> {
        Vec::new()
    }
}

/// A plain [`ProfiledCallable`] built from locations.
#[derive(Debug, Clone, Default)]
pub struct ProfileTarget {
    code: Option<CodeLocation>,
    targets: Vec<ProfileTarget>,
}

impl ProfileTarget {
    pub fn new(code: CodeLocation) -> Self {
        Self {
            code: Some(code),
            targets: Vec::new(),
        }
    }

    /// A callable with no code of its own, e.g. a built-in.
    pub fn opaque() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: ProfileTarget) -> Self {
        self.targets.push(target);
        self
    }
}

impl ProfiledCallable for ProfileTarget {
    fn code(&self) -> Option<CodeLocation> {
        self.code.clone()
    }

    fn additional_targets(&self) -> Vec<&dyn ProfiledCallable> {
        self.targets
            .iter()
            .map(|t| t as &dyn ProfiledCallable)
            .collect()
    }
}

/// Handle to a line profiler for the duration of one call.
pub trait LineInstrumentation {
    /// Instrument one more function. Adding the same function twice is
    /// harmless.
    fn add_function(&mut self, location: &CodeLocation);
    fn enable(&mut self) -> Result<(), ProfilerError>;
    fn disable(&mut self) -> Result<(), ProfilerError>;
    /// Per-line timings gathered while enabled.
    fn stats(&mut self) -> Result<LineStats, ProfilerError>;
}

/// A deterministic call-graph profiler.
pub trait CallGraphProfiler {
    /// Run `call` with profiling active and return its output.
    fn run_call<R>(&mut self, call: impl FnOnce() -> R) -> Result<R, ProfilerError>;
    /// Finalize and hand over the graph recorded by [`run_call`](Self::run_call).
    fn create_stats(&mut self) -> Result<RawCallGraph, ProfilerError>;
}

/// Instrument `entry` and every callable it transitively lists as an
/// additional target. Each location is added once; callables without code
/// are skipped along with their targets. Returns how many functions were
/// added.
pub fn collect_targets(entry: &dyn ProfiledCallable, profiler: &mut dyn LineInstrumentation) -> usize {
    let mut seen = HashSet::new();
    let mut stack = vec![entry];
    while let Some(target) = stack.pop() {
        let Some(code) = target.code() else {
            continue;
        };
        if !seen.insert(code.clone()) {
            continue;
        }
        trace!(function = %code, "instrumenting");
        profiler.add_function(&code);
        // Reverse so targets are added in the order they were listed.
        stack.extend(target.additional_targets().into_iter().rev());
    }
    debug!(functions = seen.len(), "line profiler targets collected");
    seen.len()
}

/// Arguments the profiled call receives, as shown to setup hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, String>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }
}

/// Event sent to setup hooks right before the profiled call starts.
pub struct ProfilerSetup<'a> {
    pub profiler: &'a mut dyn LineInstrumentation,
    pub target: &'a dyn ProfiledCallable,
    pub args: &'a CallArgs,
}

type SetupHook = Box<dyn Fn(&mut ProfilerSetup<'_>) + Send + Sync>;

/// Registry of hooks that may instrument extra functions before each
/// profiled call. Populate it at startup; it is only read afterwards.
#[derive(Default)]
pub struct SetupHooks {
    hooks: Vec<SetupHook>,
}

impl SetupHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: impl Fn(&mut ProfilerSetup<'_>) + Send + Sync + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Run every hook, in registration order.
    pub fn dispatch(&self, setup: &mut ProfilerSetup<'_>) {
        for hook in &self.hooks {
            hook(setup);
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl fmt::Debug for SetupHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
