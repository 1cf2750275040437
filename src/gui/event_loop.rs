//! Home-Thread Event Loop
//!
//! A minimal task queue pumped by the GUI thread. Hosts with their own event
//! loop call [`GuiLoop::process_events`] once per turn.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Longest sleep between checks for due timers
const MAX_IDLE_WAIT: Duration = Duration::from_millis(5);

struct Timer {
    due: Instant,
    task: Task,
}

struct Shared {
    home: ThreadId,
    timers: Mutex<Vec<Timer>>,
}

/// Event loop owned by the GUI thread
pub struct GuiLoop {
    shared: Arc<Shared>,
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl Default for GuiLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl GuiLoop {
    /// Create a loop whose home thread is the calling thread.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            shared: Arc::new(Shared {
                home: thread::current().id(),
                timers: Mutex::new(Vec::new()),
            }),
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> GuiHandle {
        GuiHandle {
            shared: self.shared.clone(),
            tx: self.tx.clone(),
        }
    }

    /// Run every queued task and due timer without blocking.
    /// Returns the number of tasks run.
    pub fn process_events(&self) -> usize {
        debug_assert_eq!(
            thread::current().id(),
            self.shared.home,
            "GuiLoop pumped off its home thread"
        );
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran + self.run_due_timers()
    }

    /// Pump events as they arrive until `timeout` elapses.
    pub fn process_events_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        loop {
            ran += self.process_events();
            let now = Instant::now();
            if now >= deadline {
                return ran;
            }
            let wait = (deadline - now).min(self.until_next_timer(now));
            match self.rx.recv_timeout(wait) {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return ran,
            }
        }
    }

    /// Pump events until `done` returns true or `timeout` elapses.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_events();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let wait = (deadline - now).min(self.until_next_timer(now));
            if let Ok(task) = self.rx.recv_timeout(wait) {
                task();
            }
        }
    }

    /// Number of timers waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.shared.timers.lock().len()
    }

    fn until_next_timer(&self, now: Instant) -> Duration {
        self.shared
            .timers
            .lock()
            .iter()
            .map(|t| t.due.saturating_duration_since(now))
            .min()
            .unwrap_or(MAX_IDLE_WAIT)
            .min(MAX_IDLE_WAIT)
    }

    fn run_due_timers(&self) -> usize {
        let now = Instant::now();
        let mut due = {
            let mut timers = self.shared.timers.lock();
            let (due, waiting): (Vec<Timer>, Vec<Timer>) =
                timers.drain(..).partition(|t| t.due <= now);
            *timers = waiting;
            due
        };
        due.sort_by_key(|t| t.due);
        let count = due.len();
        for timer in due {
            (timer.task)();
        }
        count
    }
}

/// Cloneable, thread-safe handle to a [`GuiLoop`]
#[derive(Clone)]
pub struct GuiHandle {
    shared: Arc<Shared>,
    tx: Sender<Task>,
}

impl GuiHandle {
    pub fn is_home_thread(&self) -> bool {
        thread::current().id() == self.shared.home
    }

    /// Queue a task for the next loop turn.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> crate::Result<()> {
        self.tx
            .send(Box::new(task))
            .map_err(|_| crate::Error::Gui("GUI loop has shut down".to_string()))
    }

    /// Start a timer on the home thread.
    ///
    /// On the home thread the timer is armed directly; elsewhere arming is
    /// posted so the timer list is only touched by its owner.
    pub fn start_timer(
        &self,
        delay: Duration,
        task: impl FnOnce() + Send + 'static,
    ) -> crate::Result<()> {
        if self.is_home_thread() {
            self.shared.timers.lock().push(Timer {
                due: Instant::now() + delay,
                task: Box::new(task),
            });
            Ok(())
        } else {
            debug!(delay_ms = delay.as_millis() as u64, "Posting timer start to GUI thread");
            let handle = self.clone();
            self.post(move || {
                if let Err(e) = handle.start_timer(delay, task) {
                    warn!("Failed to start timer: {}", e);
                }
            })
        }
    }

    /// Run `f` on the GUI thread and wait for its result.
    ///
    /// Runs inline when already on the GUI thread. Fails if the loop is gone
    /// or does not answer within `timeout`.
    pub fn call<R: Send + 'static>(
        &self,
        timeout: Duration,
        f: impl FnOnce() -> R + Send + 'static,
    ) -> crate::Result<R> {
        if self.is_home_thread() {
            return Ok(f());
        }
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.post(move || {
            let _ = reply_tx.send(f());
        })?;
        reply_rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => crate::Error::Gui(format!(
                "GUI thread did not respond within {} ms",
                timeout.as_millis()
            )),
            RecvTimeoutError::Disconnected => {
                crate::Error::Gui("GUI loop dropped the call".to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_post_from_other_thread() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        thread::spawn(move || {
            handle.post(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(gui.process_events(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_call_inline_on_home_thread() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        assert!(handle.is_home_thread());
        let value = handle.call(Duration::from_millis(10), || 21 * 2).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_call_round_trip() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        let home = thread::current().id();

        let worker = thread::spawn(move || {
            assert!(!handle.is_home_thread());
            handle
                .call(Duration::from_secs(2), move || thread::current().id() == home)
                .unwrap()
        });

        let mut result = None;
        let finished = gui.run_until(Duration::from_secs(2), || {
            if worker.is_finished() {
                result = Some(true);
            }
            result.is_some()
        });
        assert!(finished);
        assert!(worker.join().unwrap(), "call must run on the home thread");
    }

    #[test]
    fn test_call_times_out_when_loop_not_pumped() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        let err = thread::spawn(move || handle.call(Duration::from_millis(20), || ()).unwrap_err())
            .join()
            .unwrap();
        assert!(err.to_string().contains("did not respond"));
        drop(gui);
    }

    #[test]
    fn test_post_after_loop_dropped() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        drop(gui);
        assert!(handle.post(|| ()).is_err());
    }

    #[test]
    fn test_zero_delay_timer_fires_next_turn() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        handle
            .start_timer(Duration::ZERO, move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(gui.pending_timers(), 1);

        gui.process_events();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(gui.pending_timers(), 0);
    }

    #[test]
    fn test_timer_started_off_thread_is_posted() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        thread::spawn(move || {
            handle
                .start_timer(Duration::ZERO, move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        })
        .join()
        .unwrap();

        // First task arms the timer, the timer fires in the same pump
        gui.process_events();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delayed_timer_waits() {
        let gui = GuiLoop::new();
        let handle = gui.handle();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        handle
            .start_timer(Duration::from_millis(30), move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        gui.process_events();
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        gui.process_events_for(Duration::from_millis(80));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
