use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

/// Accumulated time spent in one loop stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTiming {
    pub name: String,
    pub total: Duration,
    pub count: u64,
}

impl StageTiming {
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64)
        }
    }
}

/// Per-stage timings of an acquisition loop, in first-seen stage order.
#[derive(Debug, Default, Clone)]
pub struct LoopTimings {
    stages: Vec<StageTiming>,
    index: HashMap<String, usize>,
}

impl LoopTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, duration: Duration) {
        let name = name.into();
        let idx = match self.index.get(&name) {
            Some(&idx) => idx,
            None => {
                self.stages.push(StageTiming {
                    name: name.clone(),
                    total: Duration::ZERO,
                    count: 0,
                });
                self.index.insert(name, self.stages.len() - 1);
                self.stages.len() - 1
            }
        };
        let stage = &mut self.stages[idx];
        stage.total += duration;
        stage.count += 1;
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.total).sum()
    }

    pub fn get(&self, name: &str) -> Option<&StageTiming> {
        self.index.get(name).map(|&idx| &self.stages[idx])
    }

    pub fn stages(&self) -> &[StageTiming] {
        &self.stages
    }

    pub fn log_summary(&self) {
        let total = self.total_duration();
        for stage in &self.stages {
            let percentage = if total.as_secs_f64() > 0.0 {
                (stage.total.as_secs_f64() / total.as_secs_f64()) * 100.0
            } else {
                0.0
            };
            info!(
                "{:<8} {:>6} calls {:>10.3}ms total {:>8.3}ms mean ({:>5.1}%)",
                stage.name,
                stage.count,
                stage.total.as_secs_f64() * 1000.0,
                stage.mean().as_secs_f64() * 1000.0,
                percentage
            );
        }
    }
}

pub struct Timer {
    start: Instant,
    name: &'static str,
}

impl Timer {
    pub fn start(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    pub fn stop(self) -> (&'static str, Duration) {
        (self.name, self.start.elapsed())
    }
}
