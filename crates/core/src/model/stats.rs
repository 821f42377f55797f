use serde::{Deserialize, Serialize};

use super::key::FunctionKey;

/// Aggregated call counts and timings for one function, or for one
/// caller→callee edge. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CallStats {
    /// All calls, recursive ones included.
    pub call_count: u64,
    /// Calls that were not made recursively.
    pub primitive_calls: u64,
    /// Time spent in the function body itself.
    pub self_time: f64,
    /// Time spent in the function and its callees.
    pub cumulative_time: f64,
}

impl CallStats {
    pub fn new(call_count: u64, primitive_calls: u64, self_time: f64, cumulative_time: f64) -> Self {
        Self {
            call_count,
            primitive_calls,
            self_time,
            cumulative_time,
        }
    }
}

/// One function as reported by the call-graph profiler, with the callers
/// that invoked it and the stats attributable to each of them.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRecord {
    pub key: FunctionKey,
    pub stats: CallStats,
    pub callers: Vec<(FunctionKey, CallStats)>,
}

/// Raw call-graph profiler output for one profiled call.
///
/// Records keep the order the profiler produced them in; root lookup and
/// sibling ordering both follow it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCallGraph {
    pub functions: Vec<FunctionRecord>,
}

impl RawCallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a function and return it so callers can be attached.
    pub fn add_function(&mut self, key: FunctionKey, stats: CallStats) -> &mut FunctionRecord {
        let index = self.functions.len();
        self.functions.push(FunctionRecord {
            key,
            stats,
            callers: Vec::new(),
        });
        &mut self.functions[index]
    }

    /// Record that `caller` invoked `callee`. Returns false when `callee`
    /// has not been added yet.
    pub fn add_caller(&mut self, callee: &FunctionKey, caller: FunctionKey, stats: CallStats) -> bool {
        match self.functions.iter_mut().find(|f| &f.key == callee) {
            Some(record) => {
                record.callers.push((caller, stats));
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callers_attach_to_existing_functions() {
        let main = FunctionKey::user("app.py", 1, "main");
        let helper = FunctionKey::user("app.py", 10, "helper");
        let mut graph = RawCallGraph::new();
        graph.add_function(main.clone(), CallStats::new(1, 1, 0.1, 1.0));
        graph.add_function(helper.clone(), CallStats::new(2, 2, 0.9, 0.9));

        assert!(graph.add_caller(&helper, main.clone(), CallStats::new(2, 2, 0.9, 0.9)));
        assert!(!graph.add_caller(&FunctionKey::builtin("len"), main, CallStats::default()));
        assert_eq!(graph.functions[1].callers.len(), 1);
        assert_eq!(graph.len(), 2);
    }
}
