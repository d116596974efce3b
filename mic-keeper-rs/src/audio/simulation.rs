//! Simulated volume backend.
//!
//! Used when no real backend is present. The input level sits at a nominal
//! value and occasionally drops, so the monitor has something to correct.

use super::backend::{AudioMethod, BackendError, VolumeBackend};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

/// Chance per read that the simulated level jumps.
pub const DRIFT_PROBABILITY: f64 = 0.1;

/// Levels a drift can land on, as percent of nominal.
const DRIFT_LEVELS: [u32; 4] = [80, 75, 90, 100];

/// Backend that fakes an input level near the last written value.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    rng: StdRng,
    nominal: u8,
    current: u8,
}

impl SimulatedBackend {
    /// Create a simulation with a fixed seed.
    pub fn new(nominal: u8, seed: u64) -> Self {
        Self::with_rng(nominal, StdRng::seed_from_u64(seed))
    }

    /// Create a simulation seeded from the operating system.
    pub fn from_entropy(nominal: u8) -> Self {
        Self::with_rng(nominal, StdRng::from_os_rng())
    }

    fn with_rng(nominal: u8, rng: StdRng) -> Self {
        Self {
            rng,
            nominal,
            current: nominal,
        }
    }

    /// Levels a read can currently return.
    pub fn possible_levels(&self) -> Vec<u8> {
        DRIFT_LEVELS
            .iter()
            .map(|pct| (self.nominal as u32 * pct / 100) as u8)
            .collect()
    }
}

impl VolumeBackend for SimulatedBackend {
    fn method(&self) -> AudioMethod {
        AudioMethod::Simulation
    }

    fn read(&mut self, _device: &str) -> Result<u8, BackendError> {
        if self.rng.random_bool(DRIFT_PROBABILITY) {
            let levels = self.possible_levels();
            if let Some(level) = levels.choose(&mut self.rng) {
                self.current = *level;
            }
        }
        Ok(self.current)
    }

    fn write(&mut self, _device: &str, percent: u8) -> Result<(), BackendError> {
        self.nominal = percent;
        self.current = percent;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_stay_on_drift_levels() {
        let mut sim = SimulatedBackend::new(100, 42);
        let allowed = sim.possible_levels();
        for _ in 0..500 {
            let v = sim.read("any").unwrap();
            assert!(allowed.contains(&v), "unexpected level {v}");
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimulatedBackend::new(90, 7);
        let mut b = SimulatedBackend::new(90, 7);
        let seq_a: Vec<u8> = (0..200).map(|_| a.read("").unwrap()).collect();
        let seq_b: Vec<u8> = (0..200).map(|_| b.read("").unwrap()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SimulatedBackend::new(100, 1);
        let mut b = SimulatedBackend::new(100, 2);
        let seq_a: Vec<u8> = (0..500).map(|_| a.read("").unwrap()).collect();
        let seq_b: Vec<u8> = (0..500).map(|_| b.read("").unwrap()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn drifts_eventually() {
        let mut sim = SimulatedBackend::new(100, 1);
        let drifted = (0..1000).any(|_| sim.read("").unwrap() != 100);
        assert!(drifted);
    }

    #[test]
    fn write_resets_level_and_nominal() {
        let mut sim = SimulatedBackend::new(100, 3);
        sim.write("", 60).unwrap();
        assert_eq!(sim.possible_levels(), vec![48, 45, 54, 60]);
        for _ in 0..200 {
            let v = sim.read("").unwrap();
            assert!([48, 45, 54, 60].contains(&v));
        }
    }
}
