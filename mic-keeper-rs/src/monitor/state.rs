//! Loop state and the correction policy.

use super::history::EventKind;
use crate::audio::AudioMethod;
use std::time::{Duration, Instant};

/// Mutable state of the monitoring loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopState {
    /// Whether monitoring is on
    pub running: bool,

    /// Backend chosen at startup
    pub audio_method: Option<AudioMethod>,

    /// Most recent successfully read volume
    pub last_volume: Option<u8>,

    /// Successful corrections since startup
    pub correction_count: u64,

    /// When the last correction event was emitted
    pub last_log_time: Option<Instant>,
}

/// When to correct and when a correction is worth an event.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionPolicy {
    /// Allowed distance from target, in percentage points
    pub tolerance: u8,

    /// Distance from the previous sample that counts as a change
    pub change_threshold: u8,

    /// Every n-th correction is reported as stable operation
    pub stable_every: u64,

    /// Report a correction if nothing was reported for this long
    pub quiet_period: Duration,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            tolerance: 2,
            change_threshold: 1,
            stable_every: 10,
            quiet_period: Duration::from_secs(60),
        }
    }
}

impl CorrectionPolicy {
    pub fn needs_correction(&self, current: u8, target: u8) -> bool {
        current.abs_diff(target) > self.tolerance
    }

    /// A first sample always counts as changed.
    pub fn volume_changed(&self, previous: Option<u8>, current: u8) -> bool {
        previous.map_or(true, |prev| prev.abs_diff(current) > self.change_threshold)
    }

    fn is_stable_mark(&self, count: u64) -> bool {
        self.stable_every > 0 && count % self.stable_every == 0
    }

    /// Decide whether correction number `count` gets an event.
    pub fn should_report(
        &self,
        count: u64,
        changed: bool,
        last_report: Option<Instant>,
        now: Instant,
    ) -> bool {
        count == 1
            || changed
            || self.is_stable_mark(count)
            || last_report.map_or(true, |at| now.saturating_duration_since(at) > self.quiet_period)
    }

    /// Event kind and message for a reported correction.
    pub fn describe(&self, count: u64, current: u8, target: u8) -> (EventKind, String) {
        if count != 1 && self.is_stable_mark(count) {
            (EventKind::Stable, format!("#{} corrections", count))
        } else {
            (EventKind::Correction, format!("{}% -> {}%", current, target))
        }
    }
}

/// What one monitoring cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The volume could not be read
    ReadFailed,

    /// Volume within tolerance, nothing written
    Stable { volume: u8, changed: bool },

    /// Volume written back to target
    Corrected {
        from: u8,
        to: u8,
        reported: Option<EventKind>,
    },

    /// Writing the target volume failed
    CorrectionFailed { volume: u8 },
}
