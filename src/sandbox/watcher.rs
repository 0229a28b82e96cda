use crate::shared::Deadline;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const ARMED: u8 = 0;
const FIRED: u8 = 1;
const DISARMED: u8 = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One-shot abort flag shared by the watcher and the interpreter's interrupt
/// handler. Exactly one of `fire` or `disarm` wins.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    state: Arc<AtomicU8>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only for the call that actually fired the signal.
    pub fn fire(&self) -> bool {
        self.state
            .compare_exchange(ARMED, FIRED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Marks the script as finished. Returns false when the signal had already fired.
    pub fn disarm(&self) -> bool {
        match self
            .state
            .compare_exchange(ARMED, DISARMED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(current) => current != FIRED,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.state.load(Ordering::SeqCst) == FIRED
    }
}

/// Background thread that fires an [`InterruptSignal`] once the deadline
/// expires or is cancelled. Stops when dropped.
pub struct DeadlineWatcher {
    signal: InterruptSignal,
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DeadlineWatcher {
    pub fn spawn(deadline: Deadline, signal: InterruptSignal) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let watched = signal.clone();
        let handle = thread::Builder::new()
            .name("sandbox-deadline".to_string())
            .spawn(move || loop {
                let wait = deadline
                    .remaining()
                    .map(|remaining| remaining.min(POLL_INTERVAL))
                    .unwrap_or(POLL_INTERVAL);
                match stopped.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => {
                        if deadline.is_expired() {
                            watched.fire();
                            return;
                        }
                    }
                }
            })?;
        Ok(Self {
            signal,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Disarms the signal, then joins the thread. Returns false when the
    /// deadline fired first; a fire racing the join is ignored.
    pub fn finish(mut self) -> bool {
        let in_time = self.signal.disarm();
        self.shutdown();
        in_time
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeadlineWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn signal_fires_once() {
        let signal = InterruptSignal::new();
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());
        assert!(!signal.disarm());
    }

    #[test]
    fn disarmed_signal_ignores_late_fire() {
        let signal = InterruptSignal::new();
        assert!(signal.disarm());
        assert!(!signal.fire());
        assert!(!signal.is_fired());
    }

    #[test]
    fn watcher_fires_after_expiry() {
        let signal = InterruptSignal::new();
        let watcher = DeadlineWatcher::spawn(Deadline::after(Duration::from_millis(40)), signal.clone())
            .expect("spawn watcher");
        let started = Instant::now();
        while !signal.is_fired() && started.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        watcher.stop();
        assert!(signal.is_fired());
    }

    #[test]
    fn watcher_fires_on_cancel() {
        let deadline = Deadline::none();
        let signal = InterruptSignal::new();
        let watcher = DeadlineWatcher::spawn(deadline.clone(), signal.clone()).expect("spawn watcher");
        deadline.cancel();
        let started = Instant::now();
        while !signal.is_fired() && started.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        watcher.stop();
        assert!(signal.is_fired());
    }

    #[test]
    fn finish_disarms_before_joining() {
        let signal = InterruptSignal::new();
        let watcher = DeadlineWatcher::spawn(Deadline::after(Duration::from_secs(5)), signal.clone())
            .expect("spawn watcher");
        assert!(watcher.finish());
        assert!(!signal.fire());
        assert!(!signal.is_fired());
    }

    #[test]
    fn finish_reports_an_earlier_fire() {
        let signal = InterruptSignal::new();
        let watcher = DeadlineWatcher::spawn(Deadline::after(Duration::from_millis(10)), signal.clone())
            .expect("spawn watcher");
        let started = Instant::now();
        while !signal.is_fired() && started.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!watcher.finish());
    }

    #[test]
    fn stopped_watcher_never_fires() {
        let signal = InterruptSignal::new();
        let watcher = DeadlineWatcher::spawn(Deadline::after(Duration::from_millis(30)), signal.clone())
            .expect("spawn watcher");
        watcher.stop();
        thread::sleep(Duration::from_millis(60));
        assert!(!signal.is_fired());
    }
}
