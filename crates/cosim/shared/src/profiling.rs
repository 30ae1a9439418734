//! Per-frame timing of named operations.
//!
//! Recording is best effort: a poisoned sample store is skipped, never reported,
//! so instrumentation cannot change the outcome of the code it measures.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tracing::trace;

use crate::config::ProfilingConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct TimingSample {
    pub label: String,
    pub frame: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimingSummary {
    pub count: usize,
    pub total: Duration,
    pub max: Duration,
}

impl TimingSummary {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        self.total / self.count as u32
    }
}

/// Running measurement started by [`TimeProfiler::start_watch`].
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Cheaply cloneable handle to a shared sample store.
#[derive(Debug, Clone)]
pub struct TimeProfiler {
    name: Arc<str>,
    category: Arc<str>,
    enabled: bool,
    max_samples: usize,
    samples: Arc<Mutex<VecDeque<TimingSample>>>,
}

impl TimeProfiler {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self::with_config(name, category, &ProfilingConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        category: impl Into<String>,
        config: &ProfilingConfig,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            category: Arc::from(category.into()),
            enabled: config.enabled,
            max_samples: config.max_samples,
            samples: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// A profiler that measures nothing.
    pub fn disabled() -> Self {
        Self::with_config(
            "disabled",
            "none",
            &ProfilingConfig {
                enabled: false,
                max_samples: 0,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn start_watch(&self) -> Stopwatch {
        Stopwatch {
            started: Instant::now(),
        }
    }

    pub fn stop_watch(&self, label: &str, stopwatch: Stopwatch, frame: u64) -> Duration {
        let duration = stopwatch.elapsed();
        self.record(label, frame, duration);
        duration
    }

    /// Runs `f` and records its duration under `label`.
    pub fn watch<R>(&self, label: &str, frame: u64, f: impl FnOnce() -> R) -> R {
        let stopwatch = self.start_watch();
        let result = f();
        self.stop_watch(label, stopwatch, frame);
        result
    }

    pub fn record(&self, label: &str, frame: u64, duration: Duration) {
        if !self.enabled || self.max_samples == 0 {
            return;
        }
        trace!(
            profiler = %self.name,
            category = %self.category,
            label,
            frame,
            micros = duration.as_micros() as u64,
            "timing sample"
        );

        let Ok(mut samples) = self.samples.lock() else {
            return;
        };
        if samples.len() >= self.max_samples {
            samples.pop_front();
        }
        samples.push_back(TimingSample {
            label: label.to_string(),
            frame,
            duration,
        });
    }

    pub fn samples(&self) -> Vec<TimingSample> {
        match self.samples.lock() {
            Ok(samples) => samples.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn drain(&self) -> Vec<TimingSample> {
        match self.samples.lock() {
            Ok(mut samples) => samples.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn summary(&self) -> BTreeMap<String, TimingSummary> {
        let mut out: BTreeMap<String, TimingSummary> = BTreeMap::new();
        for sample in self.samples() {
            let entry = out.entry(sample.label).or_default();
            entry.count += 1;
            entry.total += sample.duration;
            entry.max = entry.max.max(sample.duration);
        }
        out
    }
}
