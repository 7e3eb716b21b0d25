use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use log::{self, Level};
use serde::Serialize;

use crate::error::NodeError;
use crate::evaluation::function::NodeFunction;
use crate::evaluation::value::{Data, Returned};

pub struct ScopedTimer {
    label: Option<Cow<'static, str>>,
    level: Level,
    start: Option<Instant>,
}

impl ScopedTimer {
    pub fn with_level(label: impl Into<Cow<'static, str>>, level: Level) -> Self {
        Self {
            label: Some(label.into()),
            level,
            start: Some(Instant::now()),
        }
    }

    pub fn info(label: impl Into<Cow<'static, str>>) -> Self {
        Self::with_level(label, Level::Info)
    }

    pub fn debug_lazy<F>(label_gen: F) -> Self
    where
        F: FnOnce() -> String,
    {
        if log::log_enabled!(Level::Debug) {
            Self {
                label: Some(Cow::Owned(label_gen())),
                level: Level::Debug,
                start: Some(Instant::now()),
            }
        } else {
            Self {
                label: None,
                level: Level::Debug,
                start: None,
            }
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if let (Some(label), Some(start)) = (&self.label, self.start) {
            let duration = start.elapsed().as_millis();
            log::log!(self.level, "{} took {} ms", label, duration);
        }
    }
}

/// Wraps a node function, counting calls and accumulating their duration.
pub struct TimedFunction<'a> {
    inner: &'a mut dyn NodeFunction,
    calls: u64,
    elapsed: Duration,
}

impl<'a> TimedFunction<'a> {
    pub fn new(inner: &'a mut dyn NodeFunction) -> Self {
        Self {
            inner,
            calls: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl NodeFunction for TimedFunction<'_> {
    fn call(&mut self, args: &[Data]) -> Result<Returned, NodeError> {
        let start = Instant::now();
        let result = self.inner.call(args);
        self.elapsed += start.elapsed();
        self.calls += 1;
        result
    }

    fn start(&mut self) -> Result<(), NodeError> {
        self.inner.start()
    }

    fn stop(&mut self) -> Result<(), NodeError> {
        self.inner.stop()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingEntry {
    /// Node id or function name.
    pub key: String,
    pub label: String,
    pub calls: u64,
    pub elapsed_ms: f64,
    /// Share of the whole run.
    pub percent: f64,
}

/// Per-run timing diagnostics, keyed by node and by function.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingReport {
    pub total_ms: f64,
    pub by_node: Vec<TimingEntry>,
    pub by_function: Vec<TimingEntry>,
}

impl TimingReport {
    pub fn node(&self, key: &str) -> Option<&TimingEntry> {
        self.by_node.iter().find(|e| e.key == key)
    }

    pub fn function(&self, key: &str) -> Option<&TimingEntry> {
        self.by_function.iter().find(|e| e.key == key)
    }

    pub fn total_calls(&self) -> u64 {
        self.by_node.iter().map(|e| e.calls).sum()
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total: {:.3} ms", self.total_ms)?;
        for (title, entries) in [("nodes", &self.by_node), ("functions", &self.by_function)] {
            writeln!(f, "{}:", title)?;
            for e in entries {
                writeln!(
                    f,
                    "  {:<40} {:>8} calls {:>10.3} ms {:>6.1}%",
                    e.label, e.calls, e.elapsed_ms, e.percent
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Accumulated {
    label: String,
    calls: u64,
    elapsed: Duration,
}

/// Collects timings while a run is in progress.
pub struct TimingRecorder {
    started: Instant,
    node_order: Vec<String>,
    nodes: HashMap<String, Accumulated>,
    function_order: Vec<String>,
    functions: HashMap<String, Accumulated>,
}

impl TimingRecorder {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            node_order: Vec::new(),
            nodes: HashMap::new(),
            function_order: Vec::new(),
            functions: HashMap::new(),
        }
    }

    pub fn record_node(&mut self, key: &str, label: &str, calls: u64, elapsed: Duration) {
        accumulate(&mut self.node_order, &mut self.nodes, key, label, calls, elapsed);
    }

    pub fn record_function(&mut self, name: &str, calls: u64, elapsed: Duration) {
        accumulate(
            &mut self.function_order,
            &mut self.functions,
            name,
            name,
            calls,
            elapsed,
        );
    }

    pub fn finish(self) -> TimingReport {
        let total = self.started.elapsed();
        let total_ms = total.as_secs_f64() * 1000.0;
        TimingReport {
            total_ms,
            by_node: entries(self.node_order, self.nodes, total_ms),
            by_function: entries(self.function_order, self.functions, total_ms),
        }
    }
}

fn accumulate(
    order: &mut Vec<String>,
    map: &mut HashMap<String, Accumulated>,
    key: &str,
    label: &str,
    calls: u64,
    elapsed: Duration,
) {
    let entry = map.entry(key.to_string()).or_insert_with(|| {
        order.push(key.to_string());
        Accumulated {
            label: label.to_string(),
            ..Default::default()
        }
    });
    entry.calls += calls;
    entry.elapsed += elapsed;
}

fn entries(
    order: Vec<String>,
    mut map: HashMap<String, Accumulated>,
    total_ms: f64,
) -> Vec<TimingEntry> {
    order
        .into_iter()
        .filter_map(|key| {
            let acc = map.remove(&key)?;
            let elapsed_ms = acc.elapsed.as_secs_f64() * 1000.0;
            let percent = if total_ms > 0.0 {
                elapsed_ms / total_ms * 100.0
            } else {
                0.0
            };
            Some(TimingEntry {
                key,
                label: acc.label,
                calls: acc.calls,
                elapsed_ms,
                percent,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::function::PureFn;
    use crate::evaluation::value::Value;

    #[test]
    fn test_timed_function_counts_calls() {
        let mut inner = PureFn(|_: &[Data]| -> Result<Returned, NodeError> {
            Ok(Returned::one(Value::Int(1)))
        });
        let mut timed = TimedFunction::new(&mut inner);
        timed.call(&[]).unwrap();
        timed.call(&[]).unwrap();
        assert_eq!(timed.calls(), 2);
    }

    #[test]
    fn test_recorder_merges_repeated_keys() {
        let mut recorder = TimingRecorder::start();
        recorder.record_function("number.math/add", 2, Duration::from_millis(1));
        recorder.record_function("number.math/add", 3, Duration::from_millis(1));
        recorder.record_node("n1", "Add", 2, Duration::from_millis(1));
        let report = recorder.finish();

        assert_eq!(report.function("number.math/add").unwrap().calls, 5);
        assert_eq!(report.by_function.len(), 1);
        assert_eq!(report.total_calls(), 2);
        assert!(report.by_node[0].percent >= 0.0);
    }
}
