//! telemetry/timers.rs
//! Stage timers for one envelope.
//!
//! Summary: one slot per `Stage`. A slot is `None` until the stage runs at
//! least once, so "took no measurable time" and "never ran" stay distinct.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Header,
    KeyDerivation,
    Encrypt,
    Decrypt,
    Parse,
    Validate,
    Timestamp,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Header,
        Stage::KeyDerivation,
        Stage::Encrypt,
        Stage::Decrypt,
        Stage::Parse,
        Stage::Validate,
        Stage::Timestamp,
    ];

    fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Header        => "header",
            Stage::KeyDerivation => "key_derivation",
            Stage::Encrypt       => "encrypt",
            Stage::Decrypt       => "decrypt",
            Stage::Parse         => "parse",
            Stage::Validate      => "validate",
            Stage::Timestamp     => "timestamp",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accumulated time per stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimes {
    slots: [Option<Duration>; 7],
}

impl StageTimes {
    pub fn add(&mut self, stage: Stage, dur: Duration) {
        let slot = &mut self.slots[stage.slot()];
        *slot = Some(slot.unwrap_or_default() + dur);
    }

    /// Zero for stages that never ran.
    pub fn get(&self, stage: Stage) -> Duration {
        self.slots[stage.slot()].unwrap_or_default()
    }

    pub fn get_ms(&self, stage: Stage) -> f64 {
        self.get(stage).as_secs_f64() * 1e3
    }

    pub fn get_us(&self, stage: Stage) -> f64 {
        self.get(stage).as_secs_f64() * 1e6
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.slots[stage.slot()].is_some()
    }

    pub fn total(&self) -> Duration {
        self.slots.iter().flatten().sum()
    }

    pub fn has_all(&self, expected: &[Stage]) -> bool {
        expected.iter().all(|s| self.ran(*s))
    }

    /// Stages that ran, in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, Duration)> + '_ {
        Stage::ALL
            .into_iter()
            .filter_map(move |s| self.slots[s.slot()].map(|d| (s, d)))
    }
}

impl<'a> IntoIterator for &'a StageTimes {
    type Item = (Stage, Duration);
    type IntoIter = Box<dyn Iterator<Item = (Stage, Duration)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Wall clock for one envelope plus its stage table.
#[derive(Clone, Debug)]
pub struct TelemetryTimer {
    pub start_time: Instant,
    pub end_time: Option<Instant>,
    pub stage_times: StageTimes,
}

impl Default for TelemetryTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryTimer {
    pub fn new() -> Self {
        Self { start_time: Instant::now(), end_time: None, stage_times: StageTimes::default() }
    }

    /// Freeze `elapsed`. Later calls keep the first end time.
    pub fn finish(&mut self) {
        self.end_time.get_or_insert_with(Instant::now);
    }

    pub fn add_stage_time(&mut self, stage: Stage, dur: Duration) {
        self.stage_times.add(stage, dur);
    }

    /// Run `f` and charge its duration to `stage`.
    pub fn time<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.stage_times.add(stage, started.elapsed());
        out
    }

    pub fn elapsed(&self) -> Duration {
        self.end_time.unwrap_or_else(Instant::now).duration_since(self.start_time)
    }
}
