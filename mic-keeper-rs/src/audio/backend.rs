//! Volume backend capability.
//!
//! Defines the interface the monitor uses to read and write the input volume,
//! the error type shared by all backends, and one-shot backend detection.

use super::cmdlets::CmdletsBackend;
use super::simulation::SimulatedBackend;
use std::time::Duration;
use thiserror::Error;

/// Device name meaning "whatever Windows currently uses for recording".
pub const DEFAULT_DEVICE: &str = "Default (Automatic)";

/// Which volume backend is in use for this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioMethod {
    /// The AudioDeviceCmdlets PowerShell module
    Cmdlets,

    /// Pseudo-random stand-in used when no real backend is present
    Simulation,
}

impl AudioMethod {
    /// Short name used in logs and the tray menu.
    pub fn name(&self) -> &'static str {
        match self {
            AudioMethod::Cmdlets => "AudioDeviceCmdlets",
            AudioMethod::Simulation => "Simulation",
        }
    }

    /// Longer description for the status report.
    pub fn description(&self) -> &'static str {
        match self {
            AudioMethod::Cmdlets => "AudioDeviceCmdlets (Best Quality)",
            AudioMethod::Simulation => "Simulation (Demo)",
        }
    }
}

impl std::fmt::Display for AudioMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Volume backend error types.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Volume backend not available: {0}")]
    Unavailable(String),

    #[error("Failed to read input volume: {0}")]
    ReadFailed(String),

    #[error("Failed to set input volume to {percent}%: {reason}")]
    WriteFailed { percent: u8, reason: String },

    #[error("Backend command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to run backend command: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Get/set access to a microphone's input volume, in whole percent.
pub trait VolumeBackend: Send {
    /// Which kind of backend this is.
    fn method(&self) -> AudioMethod;

    /// Read the current input volume of `device`.
    fn read(&mut self, device: &str) -> Result<u8, BackendError>;

    /// Set the input volume of `device` to `percent`.
    fn write(&mut self, device: &str, percent: u8) -> Result<(), BackendError>;

    /// Names of the recording devices the backend can address.
    fn list_devices(&mut self) -> Result<Vec<String>, BackendError> {
        Ok(Vec::new())
    }
}

/// Pick the backend for this process.
///
/// `probe` runs exactly once. The simulation starts out at `nominal_volume`.
pub fn detect_backend<P>(probe: P, nominal_volume: u8) -> Box<dyn VolumeBackend>
where
    P: FnOnce() -> bool,
{
    tracing::info!("Detecting available audio methods...");

    if probe() {
        tracing::info!("AudioDeviceCmdlets PowerShell module available");
        return Box::new(CmdletsBackend::new());
    }

    tracing::warn!("No real audio API available - using simulation");
    Box::new(SimulatedBackend::from_entropy(nominal_volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn unavailable_probe_selects_simulation() {
        let backend = detect_backend(|| false, 80);
        assert_eq!(backend.method(), AudioMethod::Simulation);
    }

    #[test]
    fn available_probe_selects_cmdlets() {
        let backend = detect_backend(|| true, 80);
        assert_eq!(backend.method(), AudioMethod::Cmdlets);
    }

    #[test]
    fn probe_runs_once() {
        let calls = Cell::new(0);
        let _ = detect_backend(
            || {
                calls.set(calls.get() + 1);
                false
            },
            100,
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn method_names() {
        assert_eq!(AudioMethod::Cmdlets.to_string(), "AudioDeviceCmdlets");
        assert_eq!(AudioMethod::Simulation.name(), "Simulation");
    }
}
