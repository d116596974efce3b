//! Volume monitoring loop.
//!
//! A background thread samples the input volume every check interval and
//! writes the target back when it drifts. The foreground only toggles the
//! loop and reads snapshots of its state.

pub mod history;
pub mod state;
pub mod status;

pub use history::{EventHistory, EventKind, StatusEvent, HISTORY_CAPACITY};
pub use state::{CorrectionPolicy, CycleOutcome, LoopState};
pub use status::KeeperStatus;

use crate::audio::{AudioMethod, BackendError, VolumeBackend};
use crate::platform::settings::SharedSettings;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Longest `stop()` waits for the worker to finish.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// State shared between the monitor handle and its worker thread.
struct Shared {
    settings: SharedSettings,
    backend: Mutex<Box<dyn VolumeBackend>>,
    state: Mutex<LoopState>,
    history: Mutex<EventHistory>,
    policy: CorrectionPolicy,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Run a single sample/compare/correct cycle.
    fn poll_once(&self, now: Instant) -> CycleOutcome {
        let settings = self.settings.read().clone();
        let target = settings.target_volume;
        let mut backend = self.backend.lock();

        let current = match backend.read(&settings.device) {
            Ok(volume) => volume,
            Err(e) => {
                tracing::debug!("Skipping cycle: {}", e);
                return CycleOutcome::ReadFailed;
            }
        };

        let previous = self.state.lock().last_volume;
        let changed = self.policy.volume_changed(previous, current);

        let outcome = if self.policy.needs_correction(current, target) {
            match backend.write(&settings.device, target) {
                Ok(()) => {
                    let reported = self.record_correction(current, target, changed, now);
                    CycleOutcome::Corrected {
                        from: current,
                        to: target,
                        reported,
                    }
                }
                Err(e) => {
                    tracing::warn!("Could not correct volume: {}% ({})", current, e);
                    CycleOutcome::CorrectionFailed { volume: current }
                }
            }
        } else {
            if changed {
                tracing::info!("Volume is correct: {}%", current);
            }
            CycleOutcome::Stable {
                volume: current,
                changed,
            }
        };

        self.state.lock().last_volume = Some(current);
        outcome
    }

    fn record_correction(
        &self,
        current: u8,
        target: u8,
        changed: bool,
        now: Instant,
    ) -> Option<EventKind> {
        let mut state = self.state.lock();
        state.correction_count += 1;
        let count = state.correction_count;

        if !self
            .policy
            .should_report(count, changed, state.last_log_time, now)
        {
            return None;
        }
        state.last_log_time = Some(now);
        drop(state);

        let (kind, message) = self.policy.describe(count, current, target);
        match kind {
            EventKind::Stable => tracing::info!(
                "Correction #{}: {}% -> {}% (running stable)",
                count,
                current,
                target
            ),
            _ if count == 1 => tracing::info!("First correction: {}% -> {}%", current, target),
            _ => tracing::info!("Volume corrected: {}% -> {}%", current, target),
        }

        self.history.lock().record(kind, message);
        Some(kind)
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
}

/// Handle to the monitoring loop.
pub struct Monitor {
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl Monitor {
    /// Create a stopped monitor using the default correction policy.
    pub fn new(backend: Box<dyn VolumeBackend>, settings: SharedSettings) -> Self {
        Self::with_policy(backend, settings, CorrectionPolicy::default())
    }

    /// Create a stopped monitor with custom thresholds.
    pub fn with_policy(
        backend: Box<dyn VolumeBackend>,
        settings: SharedSettings,
        policy: CorrectionPolicy,
    ) -> Self {
        let state = LoopState {
            audio_method: Some(backend.method()),
            ..LoopState::default()
        };

        Self {
            shared: Arc::new(Shared {
                settings,
                backend: Mutex::new(backend),
                state: Mutex::new(state),
                history: Mutex::new(EventHistory::new()),
                policy,
            }),
            worker: None,
        }
    }

    /// Start the worker thread. Returns false if it was already running.
    pub fn start(&mut self) -> bool {
        {
            let mut state = self.shared.state.lock();
            if state.running {
                return false;
            }
            state.running = true;
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("volume-monitor".to_string())
            .spawn(move || run_worker(shared, stop_rx, done_tx));

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    handle,
                    stop_tx,
                    done_rx,
                });
            }
            Err(e) => {
                tracing::error!("Could not start monitoring thread: {}", e);
                self.shared.state.lock().running = false;
                return false;
            }
        }

        let settings = self.shared.settings.read().clone();
        tracing::info!("Monitoring started");
        self.record(
            EventKind::Start,
            format!(
                "Monitoring started ({}%, {})",
                settings.target_volume,
                settings.interval_label()
            ),
        );
        true
    }

    /// Stop the worker, waiting at most `JOIN_TIMEOUT` for it to exit.
    pub fn stop(&mut self) {
        self.shared.state.lock().running = false;

        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            match worker.done_rx.recv_timeout(JOIN_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        tracing::error!("Monitoring thread panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(
                        "Monitoring thread did not stop within {:?}, detaching",
                        JOIN_TIMEOUT
                    );
                }
            }
        }

        tracing::info!("Monitoring stopped");
        self.record(EventKind::Stop, "Monitoring stopped");
    }

    /// Start if stopped, stop if running.
    pub fn toggle(&mut self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Run one cycle on the calling thread.
    pub fn poll_once(&self, now: Instant) -> CycleOutcome {
        self.shared.poll_once(now)
    }

    /// Copy of the current loop state.
    pub fn snapshot(&self) -> LoopState {
        self.shared.state.lock().clone()
    }

    pub fn status(&self) -> KeeperStatus {
        let state = self.shared.state.lock();
        KeeperStatus::project(state.running, state.audio_method)
    }

    /// Backend chosen at construction.
    pub fn audio_method(&self) -> Option<AudioMethod> {
        self.shared.state.lock().audio_method
    }

    /// Add an event to the shared history.
    pub fn record(&self, kind: EventKind, message: impl Into<String>) {
        self.shared.history.lock().record(kind, message);
    }

    /// Recent events, newest first.
    pub fn recent_events(&self) -> Vec<StatusEvent> {
        self.shared.history.lock().to_vec()
    }

    /// Recording devices known to the backend.
    pub fn list_devices(&self) -> Result<Vec<String>, BackendError> {
        self.shared.backend.lock().list_devices()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

fn run_worker(shared: Arc<Shared>, stop_rx: Receiver<()>, done_tx: Sender<()>) {
    {
        let device = shared.settings.read().device.clone();
        let method = shared
            .state
            .lock()
            .audio_method
            .map(|m| m.name())
            .unwrap_or("unknown");
        tracing::info!(
            "Volume monitoring started (method: {}, device: {})",
            method,
            device
        );
    }

    while shared.is_running() {
        let cycle = panic::catch_unwind(AssertUnwindSafe(|| shared.poll_once(Instant::now())));
        if let Err(payload) = cycle {
            tracing::error!("Error in monitoring loop: {}", panic_message(payload.as_ref()));
        }

        let interval = shared.settings.read().interval();
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = done_tx.send(());
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{detect_backend, SimulatedBackend};
    use crate::platform::settings::Settings;
    use parking_lot::RwLock;
    use std::cell::Cell;
    use std::collections::VecDeque;

    /// Backend that replays scripted reads and records writes.
    #[derive(Clone, Default)]
    struct ScriptedBackend {
        reads: Arc<Mutex<VecDeque<Option<u8>>>>,
        writes: Arc<Mutex<Vec<(String, u8)>>>,
        read_calls: Arc<Mutex<usize>>,
        fail_writes: bool,
        panic_first_read: Arc<Mutex<bool>>,
    }

    impl ScriptedBackend {
        fn with_reads(reads: &[Option<u8>]) -> Self {
            let backend = Self::default();
            backend.reads.lock().extend(reads.iter().copied());
            backend
        }

        fn writes(&self) -> Vec<(String, u8)> {
            self.writes.lock().clone()
        }
    }

    impl VolumeBackend for ScriptedBackend {
        fn method(&self) -> AudioMethod {
            AudioMethod::Cmdlets
        }

        fn read(&mut self, _device: &str) -> Result<u8, BackendError> {
            *self.read_calls.lock() += 1;
            if std::mem::replace(&mut *self.panic_first_read.lock(), false) {
                panic!("scripted backend failure");
            }
            match self.reads.lock().pop_front() {
                Some(Some(v)) => Ok(v),
                Some(None) => Err(BackendError::ReadFailed("scripted".to_string())),
                None => Ok(100),
            }
        }

        fn write(&mut self, device: &str, percent: u8) -> Result<(), BackendError> {
            if self.fail_writes {
                return Err(BackendError::WriteFailed {
                    percent,
                    reason: "scripted".to_string(),
                });
            }
            self.writes.lock().push((device.to_string(), percent));
            Ok(())
        }
    }

    fn shared_settings(target_volume: u8, check_interval: f64) -> SharedSettings {
        Arc::new(RwLock::new(Settings {
            target_volume,
            check_interval,
            ..Settings::default()
        }))
    }

    fn monitor_with(backend: &ScriptedBackend, target: u8) -> Monitor {
        Monitor::new(Box::new(backend.clone()), shared_settings(target, 0.1))
    }

    #[test]
    fn drift_is_corrected_once_per_cycle() {
        let t0 = Instant::now();
        for target in [1u8, 50, 100] {
            let sample = if target > 50 { target - 3 } else { target + 3 };
            let backend = ScriptedBackend::with_reads(&[Some(sample)]);
            let monitor = monitor_with(&backend, target);

            let outcome = monitor.poll_once(t0);

            assert!(matches!(outcome, CycleOutcome::Corrected { to, .. } if to == target));
            assert_eq!(backend.writes().len(), 1);
            assert_eq!(backend.writes()[0].1, target);
        }
    }

    #[test]
    fn within_tolerance_writes_nothing() {
        let backend = ScriptedBackend::with_reads(&[Some(98), Some(99), Some(100), Some(100)]);
        let monitor = monitor_with(&backend, 100);
        let t0 = Instant::now();

        for i in 0..4 {
            let outcome = monitor.poll_once(t0 + Duration::from_secs(i));
            assert!(matches!(outcome, CycleOutcome::Stable { .. }));
        }

        assert!(backend.writes().is_empty());
        assert_eq!(monitor.snapshot().correction_count, 0);
        assert!(monitor.recent_events().is_empty());
    }

    #[test]
    fn failed_write_does_not_count() {
        let mut backend = ScriptedBackend::with_reads(&[Some(50)]);
        backend.fail_writes = true;
        let monitor = monitor_with(&backend, 100);

        let outcome = monitor.poll_once(Instant::now());

        assert_eq!(outcome, CycleOutcome::CorrectionFailed { volume: 50 });
        assert_eq!(monitor.snapshot().correction_count, 0);
        assert_eq!(monitor.snapshot().last_volume, Some(50));
        assert!(monitor.recent_events().is_empty());
    }

    #[test]
    fn failed_read_skips_cycle() {
        let backend = ScriptedBackend::with_reads(&[Some(90), None]);
        let monitor = monitor_with(&backend, 100);
        let t0 = Instant::now();

        monitor.poll_once(t0);
        let outcome = monitor.poll_once(t0 + Duration::from_secs(1));

        assert_eq!(outcome, CycleOutcome::ReadFailed);
        assert_eq!(backend.writes().len(), 1);
        assert_eq!(monitor.snapshot().last_volume, Some(90));
    }

    #[test]
    fn repeated_sample_is_not_reported_twice() {
        let backend = ScriptedBackend::with_reads(&[Some(95), Some(95), Some(97)]);
        let monitor = monitor_with(&backend, 100);
        let t0 = Instant::now();

        let reported: Vec<_> = (0..3)
            .map(|i| match monitor.poll_once(t0 + Duration::from_secs(i)) {
                CycleOutcome::Corrected { reported, .. } => reported,
                other => panic!("unexpected outcome {other:?}"),
            })
            .collect();

        assert_eq!(
            reported,
            [Some(EventKind::Correction), None, Some(EventKind::Correction)]
        );
        assert_eq!(backend.writes().len(), 3);
        assert_eq!(monitor.snapshot().correction_count, 3);

        let events = monitor.recent_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "97% -> 100%");
        assert_eq!(events[1].message, "95% -> 100%");
    }

    #[test]
    fn every_tenth_correction_is_stable() {
        let backend = ScriptedBackend::with_reads(&[Some(90); 10]);
        let monitor = monitor_with(&backend, 100);
        let t0 = Instant::now();

        for i in 0..10 {
            monitor.poll_once(t0 + Duration::from_secs(i));
        }

        let events = monitor.recent_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Stable);
        assert_eq!(events[0].message, "#10 corrections");
        assert_eq!(events[1].kind, EventKind::Correction);
    }

    #[test]
    fn quiet_period_forces_a_report() {
        let backend = ScriptedBackend::with_reads(&[Some(90), Some(90), Some(90)]);
        let monitor = monitor_with(&backend, 100);
        let t0 = Instant::now();

        monitor.poll_once(t0);
        monitor.poll_once(t0 + Duration::from_secs(30));
        monitor.poll_once(t0 + Duration::from_secs(91));

        assert_eq!(monitor.recent_events().len(), 2);
        assert_eq!(
            monitor.snapshot().last_log_time,
            Some(t0 + Duration::from_secs(91))
        );
    }

    #[test]
    fn settings_changes_apply_next_cycle() {
        let backend = ScriptedBackend::with_reads(&[Some(100), Some(100)]);
        let settings = shared_settings(100, 0.1);
        let monitor = Monitor::new(Box::new(backend.clone()), Arc::clone(&settings));
        let t0 = Instant::now();

        monitor.poll_once(t0);
        settings.write().target_volume = 70;
        monitor.poll_once(t0 + Duration::from_secs(1));

        assert_eq!(backend.writes(), vec![(Settings::default().device, 70)]);
    }

    #[test]
    fn history_is_capped() {
        let reads: Vec<_> = (0..12).map(|i| Some(if i % 2 == 0 { 50 } else { 60 })).collect();
        let backend = ScriptedBackend::with_reads(&reads);
        let monitor = monitor_with(&backend, 100);
        let t0 = Instant::now();

        for i in 0..12 {
            monitor.poll_once(t0 + Duration::from_secs(i));
        }

        assert_eq!(monitor.recent_events().len(), HISTORY_CAPACITY);
    }

    #[test]
    fn start_and_stop_emit_events() {
        let backend = ScriptedBackend::default();
        let mut monitor = monitor_with(&backend, 100);

        assert!(monitor.start());
        assert!(monitor.is_running());
        assert_eq!(monitor.status(), KeeperStatus::Active);

        monitor.stop();
        assert!(!monitor.is_running());
        assert_eq!(monitor.status(), KeeperStatus::Stopped);

        let kinds: Vec<_> = monitor.recent_events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [EventKind::Stop, EventKind::Start]);
        assert_eq!(
            monitor.recent_events()[1].message,
            "Monitoring started (100%, 0.1s)"
        );
    }

    #[test]
    fn start_is_idempotent() {
        let backend = ScriptedBackend::default();
        let mut monitor = monitor_with(&backend, 100);

        assert!(monitor.start());
        assert!(!monitor.start());
        monitor.stop();

        let starts = monitor
            .recent_events()
            .iter()
            .filter(|e| e.kind == EventKind::Start)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn stop_when_stopped_still_records() {
        let backend = ScriptedBackend::default();
        let mut monitor = monitor_with(&backend, 100);

        monitor.stop();

        assert_eq!(monitor.recent_events()[0].kind, EventKind::Stop);
    }

    #[test]
    fn worker_corrects_in_background() {
        let backend = ScriptedBackend::with_reads(&[Some(40)]);
        let mut monitor = monitor_with(&backend, 100);

        monitor.start();
        thread::sleep(Duration::from_millis(350));
        monitor.stop();

        assert_eq!(backend.writes()[0].1, 100);
        assert!(*backend.read_calls.lock() >= 2);
    }

    #[test]
    fn worker_survives_a_panicking_cycle() {
        let backend = ScriptedBackend::with_reads(&[Some(40)]);
        *backend.panic_first_read.lock() = true;
        let mut monitor = monitor_with(&backend, 100);

        monitor.start();
        thread::sleep(Duration::from_millis(400));
        assert!(monitor.is_running());
        monitor.stop();

        assert!(*backend.read_calls.lock() >= 2);
        assert_eq!(backend.writes().len(), 1);
    }

    /// Backend whose reads outlast the stop timeout.
    struct StalledBackend;

    impl VolumeBackend for StalledBackend {
        fn method(&self) -> AudioMethod {
            AudioMethod::Cmdlets
        }

        fn read(&mut self, _device: &str) -> Result<u8, BackendError> {
            thread::sleep(JOIN_TIMEOUT * 3);
            Ok(100)
        }

        fn write(&mut self, _device: &str, _percent: u8) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[test]
    fn stop_gives_up_on_a_stalled_worker() {
        let mut monitor = Monitor::new(Box::new(StalledBackend), shared_settings(100, 0.1));

        monitor.start();
        thread::sleep(Duration::from_millis(100));

        let began = Instant::now();
        monitor.stop();
        let waited = began.elapsed();

        assert!(waited >= JOIN_TIMEOUT);
        assert!(waited < JOIN_TIMEOUT + Duration::from_secs(1));
        assert!(!monitor.is_running());
        assert_eq!(monitor.recent_events()[0].kind, EventKind::Stop);
    }

    #[test]
    fn toggle_flips_running() {
        let backend = ScriptedBackend::default();
        let mut monitor = monitor_with(&backend, 100);

        monitor.toggle();
        assert!(monitor.is_running());
        monitor.toggle();
        assert!(!monitor.is_running());
    }

    #[test]
    fn unavailable_backend_stays_simulated() {
        let probes = Cell::new(0);
        let available = Cell::new(false);
        let backend = detect_backend(
            || {
                probes.set(probes.get() + 1);
                available.get()
            },
            100,
        );
        let monitor = Monitor::new(backend, shared_settings(100, 0.1));

        // The real backend showing up later changes nothing
        available.set(true);
        let t0 = Instant::now();
        for i in 0..20 {
            monitor.poll_once(t0 + Duration::from_secs(i));
        }

        assert_eq!(probes.get(), 1);
        assert_eq!(monitor.audio_method(), Some(AudioMethod::Simulation));
        assert_eq!(monitor.snapshot().audio_method, Some(AudioMethod::Simulation));
    }

    #[test]
    fn simulated_drift_is_pulled_back() {
        let backend = SimulatedBackend::new(100, 99);
        let mut monitor = Monitor::new(Box::new(backend), shared_settings(100, 0.1));
        monitor.start();
        let t0 = Instant::now();
        for i in 0..300 {
            monitor.poll_once(t0 + Duration::from_secs(i));
        }

        assert_eq!(monitor.status(), KeeperStatus::Simulating);
        let state = monitor.snapshot();
        assert!(state.correction_count > 0);
        monitor.stop();
    }
}
