use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::model::{CallStats, FunctionKey, RawCallGraph};

#[derive(Debug, Error)]
pub enum CallGraphParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("function {0} is listed more than once")]
    DuplicateFunction(FunctionKey),
    #[error("caller {caller} is listed more than once for {function}")]
    DuplicateCaller {
        function: FunctionKey,
        caller: FunctionKey,
    },
    #[error("{field} of {function} must be a finite, non-negative number of seconds, got {value}")]
    InvalidTime {
        function: FunctionKey,
        field: &'static str,
        value: f64,
    },
}

/// Call-graph profiler dump:
/// `{"functions": [{"function": [file, line, name], <stats>, "callers": [...]}]}`
#[derive(Debug, Deserialize)]
struct CallGraphDump {
    functions: Vec<FunctionEntry>,
}

#[derive(Debug, Deserialize)]
struct FunctionEntry {
    function: FunctionKey,
    #[serde(flatten)]
    stats: StatsEntry,
    #[serde(default)]
    callers: Vec<CallerEntry>,
}

#[derive(Debug, Deserialize)]
struct CallerEntry {
    function: FunctionKey,
    #[serde(flatten)]
    stats: StatsEntry,
}

#[derive(Debug, Deserialize)]
struct StatsEntry {
    call_count: u64,
    primitive_calls: u64,
    self_time: f64,
    cumulative_time: f64,
}

impl StatsEntry {
    fn validate(self, function: &FunctionKey) -> Result<CallStats, CallGraphParseError> {
        for (field, value) in [
            ("self_time", self.self_time),
            ("cumulative_time", self.cumulative_time),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(CallGraphParseError::InvalidTime {
                    function: function.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(CallStats::new(
            self.call_count,
            self.primitive_calls,
            self.self_time,
            self.cumulative_time,
        ))
    }
}

/// Parse a call-graph dump, keeping function and caller order.
pub fn parse_call_graph(data: &[u8]) -> Result<RawCallGraph, CallGraphParseError> {
    let dump: CallGraphDump = serde_json::from_slice(data)?;

    let mut seen = HashSet::with_capacity(dump.functions.len());
    let mut graph = RawCallGraph::new();
    for entry in dump.functions {
        if !seen.insert(entry.function.clone()) {
            return Err(CallGraphParseError::DuplicateFunction(entry.function));
        }
        let stats = entry.stats.validate(&entry.function)?;

        let mut callers = Vec::with_capacity(entry.callers.len());
        let mut seen_callers = HashSet::with_capacity(entry.callers.len());
        for caller in entry.callers {
            if !seen_callers.insert(caller.function.clone()) {
                return Err(CallGraphParseError::DuplicateCaller {
                    function: entry.function,
                    caller: caller.function,
                });
            }
            let edge = caller.stats.validate(&entry.function)?;
            callers.push((caller.function, edge));
        }

        graph.add_function(entry.function, stats).callers = callers;
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_functions_and_callers_in_order() {
        let json = r#"{
            "functions": [
                {"function": ["app/views.py", 10, "index"],
                 "call_count": 1, "primitive_calls": 1,
                 "self_time": 0.001, "cumulative_time": 0.5,
                 "callers": []},
                {"function": ["~", 0, "<built-in method time.sleep>"],
                 "call_count": 2, "primitive_calls": 2,
                 "self_time": 0.4, "cumulative_time": 0.4,
                 "callers": [
                    {"function": ["app/views.py", 10, "index"],
                     "call_count": 1, "primitive_calls": 1,
                     "self_time": 0.3, "cumulative_time": 0.3},
                    {"function": ["app/util.py", 4, "nap"],
                     "call_count": 1, "primitive_calls": 1,
                     "self_time": 0.1, "cumulative_time": 0.1}
                 ]}
            ]
        }"#;
        let graph = parse_call_graph(json.as_bytes()).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.functions[0].key, FunctionKey::user("app/views.py", 10, "index"));
        assert!(graph.functions[1].key.is_builtin());
        assert_eq!(graph.functions[1].stats.call_count, 2);

        let callers: Vec<_> = graph.functions[1]
            .callers
            .iter()
            .map(|(k, s)| (k.name().to_string(), s.cumulative_time))
            .collect();
        assert_eq!(
            callers,
            vec![("index".to_string(), 0.3), ("nap".to_string(), 0.1)]
        );
    }

    #[test]
    fn callers_default_to_empty() {
        let json = r#"{"functions": [{"function": ["a.py", 1, "main"],
            "call_count": 1, "primitive_calls": 1, "self_time": 0, "cumulative_time": 0}]}"#;
        let graph = parse_call_graph(json.as_bytes()).unwrap();
        assert!(graph.functions[0].callers.is_empty());
    }

    #[test]
    fn rejects_duplicate_functions() {
        let entry = r#"{"function": ["a.py", 1, "main"],
            "call_count": 1, "primitive_calls": 1, "self_time": 0, "cumulative_time": 0}"#;
        let json = format!(r#"{{"functions": [{entry}, {entry}]}}"#);
        let err = parse_call_graph(json.as_bytes()).unwrap_err();
        assert!(matches!(err, CallGraphParseError::DuplicateFunction(_)));
    }

    #[test]
    fn rejects_duplicate_callers() {
        let caller = r#"{"function": ["a.py", 1, "main"],
            "call_count": 1, "primitive_calls": 1, "self_time": 0, "cumulative_time": 0}"#;
        let json = format!(
            r#"{{"functions": [{{"function": ["a.py", 5, "f"],
            "call_count": 2, "primitive_calls": 2, "self_time": 0, "cumulative_time": 0,
            "callers": [{caller}, {caller}]}}]}}"#
        );
        let err = parse_call_graph(json.as_bytes()).unwrap_err();
        assert!(matches!(err, CallGraphParseError::DuplicateCaller { .. }));
    }

    #[test]
    fn rejects_negative_times() {
        let json = r#"{"functions": [{"function": ["a.py", 1, "main"],
            "call_count": 1, "primitive_calls": 1, "self_time": -0.5, "cumulative_time": 0}]}"#;
        let err = parse_call_graph(json.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            CallGraphParseError::InvalidTime {
                field: "self_time",
                ..
            }
        ));
    }

    #[test]
    fn invalid_json_errors() {
        assert!(matches!(
            parse_call_graph(b"not json"),
            Err(CallGraphParseError::Json(_))
        ));
    }
}
