//! Keeper status derived from loop state.

use crate::audio::AudioMethod;

/// Overall status shown by the tray icon and status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeeperStatus {
    /// Monitoring is off
    Stopped,

    /// Monitoring with the real backend
    Active,

    /// Monitoring with the simulation backend
    Simulating,

    /// Running without a known backend
    Error,
}

impl KeeperStatus {
    /// Derive the status. Has no side effects.
    pub fn project(running: bool, method: Option<AudioMethod>) -> Self {
        match (running, method) {
            (false, _) => KeeperStatus::Stopped,
            (true, Some(AudioMethod::Cmdlets)) => KeeperStatus::Active,
            (true, Some(AudioMethod::Simulation)) => KeeperStatus::Simulating,
            (true, None) => KeeperStatus::Error,
        }
    }

    /// Glyph used in front of the start/stop menu entry.
    pub fn glyph(&self) -> &'static str {
        match self {
            KeeperStatus::Active => "🟢",
            KeeperStatus::Simulating => "🟡",
            KeeperStatus::Stopped | KeeperStatus::Error => "🔴",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KeeperStatus::Stopped => "Stopped",
            KeeperStatus::Active => "Active",
            KeeperStatus::Simulating => "Simulating",
            KeeperStatus::Error => "Error",
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self, KeeperStatus::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_regardless_of_method() {
        for method in [None, Some(AudioMethod::Cmdlets), Some(AudioMethod::Simulation)] {
            assert_eq!(KeeperStatus::project(false, method), KeeperStatus::Stopped);
        }
    }

    #[test]
    fn running_follows_backend() {
        assert_eq!(
            KeeperStatus::project(true, Some(AudioMethod::Cmdlets)),
            KeeperStatus::Active
        );
        assert_eq!(
            KeeperStatus::project(true, Some(AudioMethod::Simulation)),
            KeeperStatus::Simulating
        );
        assert_eq!(KeeperStatus::project(true, None), KeeperStatus::Error);
    }

    #[test]
    fn only_stopped_is_not_running() {
        assert!(!KeeperStatus::Stopped.is_running());
        assert!(KeeperStatus::Error.is_running());
    }
}
