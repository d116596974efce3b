//! Audio module for reading and correcting the microphone input volume.
//!
//! This module provides the volume backend capability, the PowerShell
//! AudioDeviceCmdlets backend, and the simulation fallback.

pub mod backend;
pub mod cmdlets;
pub mod simulation;

pub use backend::{detect_backend, AudioMethod, BackendError, VolumeBackend, DEFAULT_DEVICE};
pub use cmdlets::CmdletsBackend;
pub use simulation::SimulatedBackend;
