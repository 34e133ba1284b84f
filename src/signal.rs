//! Pause/cancel signaling for a capture session.
//!
//! One `PauseSignal` is created per session and injected into every
//! layer that loops. It owns the single background thread allowed in
//! this crate: a listener that polls the global key state every 100 ms
//! and flips the pause flag when the interrupt key goes down. All
//! other work happens on the calling thread.
//!
//! `cancel` is monotonic: once set, nothing within the session clears
//! it. `pause` is set by the listener and cleared when the pause
//! dialog has been answered.

use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use device_query::{DeviceQuery, DeviceState, Keycode};

use crate::arbitrate::Arbitrator;

/// Interval between key-state polls, and the granularity of
/// [`PauseSignal::wait_or_pause`].
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long `stop_listener` waits for the thread to wind down before
/// detaching it.
const JOIN_DEADLINE: Duration = Duration::from_secs(1);

/// Source of the global "is the interrupt key down" state.
///
/// The production implementation reads the OS input state; tests
/// script it.
pub trait KeyWatcher {
    fn interrupt_pressed(&mut self) -> bool;
}

/// Watches the physical Escape key via `device_query`.
pub struct EscapeWatcher {
    device: DeviceState,
}

impl EscapeWatcher {
    pub fn new() -> Self {
        Self {
            device: DeviceState::new(),
        }
    }
}

impl Default for EscapeWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyWatcher for EscapeWatcher {
    fn interrupt_pressed(&mut self) -> bool {
        self.device.get_keys().contains(&Keycode::Escape)
    }
}

#[derive(Default)]
struct Flags {
    pause: AtomicBool,
    cancel: AtomicBool,
    running: AtomicBool,
    failed: AtomicBool,
}

/// Cooperative pause/cancel signal shared between the capture flow and
/// the key listener.
pub struct PauseSignal {
    flags: Arc<Flags>,
    extra_delay: Duration,
    listener: Option<JoinHandle<()>>,
}

impl PauseSignal {
    /// `extra_delay` is the settle wait applied after any modal dialog,
    /// because dialogs steal focus from the reader window.
    pub fn new(extra_delay: Duration) -> Self {
        Self {
            flags: Arc::new(Flags::default()),
            extra_delay,
            listener: None,
        }
    }

    /// Requests a pause. Idempotent while already set. Called from the
    /// listener thread; public so sessions can be paused programmatically.
    pub fn signal_pause(&self) {
        self.flags.pause.store(true, Ordering::SeqCst);
    }

    /// Sets the terminal cancel flag. Never cleared within a session.
    pub fn request_cancel(&self) {
        self.flags.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.cancel.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.flags.pause.load(Ordering::SeqCst)
    }

    /// Starts the background key listener. A second call while the
    /// listener is live is a no-op.
    ///
    /// The thread polls `watcher` every 100 ms, raises the pause flag on
    /// a press, and waits for the key to be released before re-arming so
    /// a held key cannot raise a second pause. If the watcher panics the
    /// session is marked failed and cancelled; the next
    /// [`check`](Self::check) or [`wait_or_pause`](Self::wait_or_pause)
    /// surfaces [`SignalError::ListenerFailed`].
    pub fn start_listener<W>(&mut self, watcher: W) -> Result<(), SignalError>
    where
        W: KeyWatcher + Send + 'static,
    {
        if self.listener.is_some() {
            return Ok(());
        }

        self.flags.running.store(true, Ordering::SeqCst);
        let flags = Arc::clone(&self.flags);
        let handle = thread::Builder::new()
            .name("pause-listener".into())
            .spawn(move || listener_loop(flags, watcher))?;
        self.listener = Some(handle);
        log::debug!("Pause listener started");
        Ok(())
    }

    /// Stops the listener and joins it, waiting at most one second.
    ///
    /// The poll loop exits within one interval of the running flag
    /// dropping, so the deadline is generous. A thread that still has
    /// not finished is detached with a warning rather than blocking
    /// session teardown.
    pub fn stop_listener(&mut self) {
        self.flags.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.listener.take() else {
            return;
        };

        let deadline = Instant::now() + JOIN_DEADLINE;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            log::debug!("Pause listener stopped");
        } else {
            log::warn!("Pause listener did not stop within {:?}, detaching", JOIN_DEADLINE);
        }
    }

    /// Zero-duration pause/cancel check.
    ///
    /// Returns `Ok(true)` when the session is (or just became)
    /// cancelled. A pending pause request is arbitrated before
    /// returning, exactly as in [`wait_or_pause`](Self::wait_or_pause).
    pub fn check(&self, arbitrator: &dyn Arbitrator) -> Result<bool, SignalError> {
        self.ensure_listener_ok()?;
        if self.is_cancelled() {
            return Ok(true);
        }
        if self.is_paused() {
            return self.handle_pause_request(arbitrator);
        }
        Ok(false)
    }

    /// Sleeps up to `duration`, polling for pause/cancel every 100 ms.
    ///
    /// Returns `Ok(true)` if cancellation occurred (either the cancel
    /// flag was already set or the user confirmed stopping at the pause
    /// dialog), `Ok(false)` if the wait ran its course or the user
    /// declined to stop. A declined pause ends the wait early after the
    /// post-dialog settle delay.
    pub fn wait_or_pause(
        &self,
        duration: Duration,
        arbitrator: &dyn Arbitrator,
    ) -> Result<bool, SignalError> {
        self.ensure_listener_ok()?;
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return Ok(true);
            }
            if self.is_paused() {
                return self.handle_pause_request(arbitrator);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// The settle wait that follows any modal dialog.
    pub fn absorb_focus(&self, arbitrator: &dyn Arbitrator) -> Result<bool, SignalError> {
        self.wait_or_pause(self.extra_delay, arbitrator)
    }

    /// Asks the user whether to stop the run.
    ///
    /// Confirming sets the terminal cancel flag. Declining clears the
    /// pause flag and absorbs the focus steal with one extra wait; a
    /// pause raised again during that wait is handled recursively.
    fn handle_pause_request(&self, arbitrator: &dyn Arbitrator) -> Result<bool, SignalError> {
        self.flags.pause.store(false, Ordering::SeqCst);

        if arbitrator.confirm_stop() {
            log::info!("User paused and cancelled the run");
            self.request_cancel();
            return Ok(true);
        }

        log::info!("User resumed the run");
        self.absorb_focus(arbitrator)
    }

    fn ensure_listener_ok(&self) -> Result<(), SignalError> {
        if self.flags.failed.load(Ordering::SeqCst) {
            return Err(SignalError::ListenerFailed);
        }
        Ok(())
    }
}

impl Drop for PauseSignal {
    fn drop(&mut self) {
        if self.listener.is_some() {
            self.stop_listener();
        }
    }
}

fn listener_loop<W: KeyWatcher>(flags: Arc<Flags>, mut watcher: W) {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        while flags.running.load(Ordering::SeqCst) && !flags.cancel.load(Ordering::SeqCst) {
            if watcher.interrupt_pressed() {
                flags.pause.store(true, Ordering::SeqCst);
                log::info!("Interrupt key detected, pause requested");
                // Hold until release so one press raises one pause.
                while watcher.interrupt_pressed() && flags.running.load(Ordering::SeqCst) {
                    thread::sleep(POLL_INTERVAL);
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }));

    if result.is_err() {
        log::error!("Pause listener crashed; treating session as cancelled");
        flags.failed.store(true, Ordering::SeqCst);
        flags.cancel.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("pause listener crashed; session is fatally cancelled")]
    ListenerFailed,

    #[error("failed to spawn pause listener thread: {0}")]
    Spawn(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrate::{BlankDecision, DuplicateDecision};
    use image::DynamicImage;

    struct StopAnswer(bool);

    impl Arbitrator for StopAnswer {
        fn resolve_blank(&self, _frame: &DynamicImage) -> BlankDecision {
            BlankDecision::Discard
        }
        fn resolve_duplicate(
            &self,
            _previous: &DynamicImage,
            _current: &DynamicImage,
        ) -> DuplicateDecision {
            DuplicateDecision::Discard
        }
        fn confirm_stop(&self) -> bool {
            self.0
        }
    }

    struct ScriptedWatcher {
        pressed: Arc<AtomicBool>,
    }

    impl KeyWatcher for ScriptedWatcher {
        fn interrupt_pressed(&mut self) -> bool {
            self.pressed.load(Ordering::SeqCst)
        }
    }

    struct PanickingWatcher;

    impl KeyWatcher for PanickingWatcher {
        fn interrupt_pressed(&mut self) -> bool {
            panic!("watcher blew up");
        }
    }

    #[test]
    fn cancel_is_terminal() {
        let signal = PauseSignal::new(Duration::ZERO);
        signal.request_cancel();
        assert!(signal.is_cancelled());
        assert!(signal.check(&StopAnswer(false)).unwrap());
        // Still cancelled after further checks and waits.
        assert!(signal
            .wait_or_pause(Duration::from_millis(10), &StopAnswer(false))
            .unwrap());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn wait_runs_full_duration_without_pause() {
        let signal = PauseSignal::new(Duration::ZERO);
        let start = Instant::now();
        let cancelled = signal
            .wait_or_pause(Duration::from_millis(120), &StopAnswer(true))
            .unwrap();
        assert!(!cancelled);
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[test]
    fn declined_pause_clears_flag_and_resumes() {
        let signal = PauseSignal::new(Duration::ZERO);
        signal.signal_pause();
        let cancelled = signal
            .wait_or_pause(Duration::from_millis(50), &StopAnswer(false))
            .unwrap();
        assert!(!cancelled);
        assert!(!signal.is_paused());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn confirmed_pause_cancels() {
        let signal = PauseSignal::new(Duration::ZERO);
        signal.signal_pause();
        let cancelled = signal
            .wait_or_pause(Duration::from_millis(50), &StopAnswer(true))
            .unwrap();
        assert!(cancelled);
        assert!(signal.is_cancelled());
    }

    #[test]
    fn zero_duration_check_sees_pause() {
        let signal = PauseSignal::new(Duration::ZERO);
        signal.signal_pause();
        assert!(signal.check(&StopAnswer(true)).unwrap());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn listener_raises_pause_and_stops_cleanly() {
        let mut signal = PauseSignal::new(Duration::ZERO);
        let pressed = Arc::new(AtomicBool::new(false));
        signal
            .start_listener(ScriptedWatcher {
                pressed: Arc::clone(&pressed),
            })
            .unwrap();

        pressed.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !signal.is_paused() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(signal.is_paused());

        pressed.store(false, Ordering::SeqCst);
        signal.stop_listener();
        assert!(signal.listener.is_none());
    }

    #[test]
    fn crashed_listener_fails_the_session() {
        let mut signal = PauseSignal::new(Duration::ZERO);
        signal.start_listener(PanickingWatcher).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !signal.flags.failed.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        assert!(signal.is_cancelled());
        assert!(matches!(
            signal.check(&StopAnswer(false)),
            Err(SignalError::ListenerFailed)
        ));
        signal.stop_listener();
    }

    #[test]
    fn start_listener_is_idempotent() {
        let mut signal = PauseSignal::new(Duration::ZERO);
        let pressed = Arc::new(AtomicBool::new(false));
        signal
            .start_listener(ScriptedWatcher {
                pressed: Arc::clone(&pressed),
            })
            .unwrap();
        signal
            .start_listener(ScriptedWatcher { pressed })
            .unwrap();
        signal.stop_listener();
    }
}
