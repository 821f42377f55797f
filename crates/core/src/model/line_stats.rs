use std::collections::HashMap;

use super::key::FunctionKey;

/// Hits and accumulated time for one source line. `time` is in profiler
/// ticks; multiply by [`LineStats::unit`] for seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTiming {
    pub line: u32,
    pub hits: u64,
    pub time: f64,
}

impl LineTiming {
    pub fn new(line: u32, hits: u64, time: f64) -> Self {
        Self { line, hits, time }
    }
}

/// Line profiler output: a per-line histogram for every instrumented function.
#[derive(Debug, Clone, PartialEq)]
pub struct LineStats {
    /// Seconds per tick.
    pub unit: f64,
    timings: HashMap<FunctionKey, Vec<LineTiming>>,
}

impl LineStats {
    pub fn new(unit: f64) -> Self {
        Self {
            unit,
            timings: HashMap::new(),
        }
    }

    /// Replaces any histogram previously stored for `key`.
    pub fn insert(&mut self, key: FunctionKey, lines: Vec<LineTiming>) {
        self.timings.insert(key, lines);
    }

    pub fn get(&self, key: &FunctionKey) -> Option<&[LineTiming]> {
        self.timings.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &FunctionKey) -> bool {
        self.timings.contains_key(key)
    }

    /// Total ticks recorded for `key`, 0 when it was not line-profiled.
    pub fn total_time(&self, key: &FunctionKey) -> f64 {
        self.get(key)
            .map_or(0.0, |lines| lines.iter().map(|l| l.time).sum())
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionKey> {
        self.timings.keys()
    }

    pub fn len(&self) -> usize {
        self.timings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timings.is_empty()
    }
}

impl Default for LineStats {
    /// Empty stats in microsecond ticks, the line profiler's usual unit.
    fn default() -> Self {
        Self::new(1e-6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_totals() {
        let key = FunctionKey::user("app/views.py", 12, "index");
        let mut stats = LineStats::default();
        stats.insert(
            key.clone(),
            vec![LineTiming::new(13, 1, 20.0), LineTiming::new(14, 3, 60.0)],
        );

        assert!(stats.contains(&key));
        assert_eq!(stats.get(&key).map(<[LineTiming]>::len), Some(2));
        assert!((stats.total_time(&key) - 80.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_time(&FunctionKey::builtin("len")), 0.0);
        assert_eq!(stats.len(), 1);
    }
}
