//! telemetry/snapshot.rs
//! Immutable view of an envelope's counters and timers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::counters::EnvelopeCounters;
use crate::telemetry::timers::{Stage, StageTimes, TelemetryTimer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub counters: EnvelopeCounters,
    /// Envelope bytes over plaintext bytes (0 when no plaintext).
    pub expansion_ratio: f64,
    pub throughput_plaintext_bytes_per_sec: f64,
    pub elapsed: Duration,
    /// Writer terminated, or reader verified.
    pub finished: bool,
    pub stage_times: StageTimes,
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl TelemetrySnapshot {
    pub fn from(counters: &EnvelopeCounters, timer: &TelemetryTimer) -> Self {
        let elapsed = timer.elapsed();
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { counters.bytes_plaintext as f64 / secs } else { 0.0 };

        Self {
            counters: counters.clone(),
            expansion_ratio: ratio(counters.envelope_bytes(), counters.bytes_plaintext),
            throughput_plaintext_bytes_per_sec: throughput,
            elapsed,
            finished: timer.end_time.is_some(),
            stage_times: timer.stage_times.clone(),
        }
    }

    /// Sum over stages. Key derivation runs inside header setup (writer) and
    /// inside parsing (reader), so this can exceed `elapsed`.
    pub fn total_stage_time(&self) -> Duration {
        self.stage_times.total()
    }

    pub fn has_all_stages(&self, expected: &[Stage]) -> bool {
        self.stage_times.has_all(expected)
    }

    /// Share of the envelope that is not ciphertext.
    pub fn overhead_ratio(&self) -> f64 {
        ratio(self.counters.bytes_overhead, self.counters.envelope_bytes())
    }

    /// Internal invariants:
    /// - no single stage outlasts the envelope
    /// - a finished envelope carries at least as much ciphertext as plaintext
    pub fn sanity_check(&self) -> bool {
        let stages_fit = Stage::ALL.iter().all(|s| self.stage_times.get(*s) <= self.elapsed);
        let padded = !self.finished || self.counters.bytes_ciphertext >= self.counters.bytes_plaintext;
        stages_fit && padded
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
