use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::machine::Timer;

/// Message posted back to the controller when a scheduled task elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerElapsed {
    pub timer: Timer,
    pub generation: u64,
}

struct Scheduled {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Cancellable scheduled tasks, one slot per [`Timer`]
///
/// Scheduling a slot replaces whatever was pending in it. A task that already
/// fired before being replaced is recognised by its stale generation and
/// dropped in [`Timers::accept`].
pub struct Timers {
    tx: mpsc::UnboundedSender<TimerElapsed>,
    slots: HashMap<Timer, Scheduled>,
    next_generation: u64,
}

impl Timers {
    pub fn new(tx: mpsc::UnboundedSender<TimerElapsed>) -> Self {
        Self {
            tx,
            slots: HashMap::new(),
            next_generation: 0,
        }
    }

    pub fn schedule(&mut self, timer: Timer, after: Duration) {
        self.cancel(timer);

        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // Receiver gone means the controller shut down
            let _ = tx.send(TimerElapsed { timer, generation });
        });

        debug!("Scheduled {:?} in {:?} (gen {})", timer, after, generation);
        self.slots.insert(timer, Scheduled { generation, handle });
    }

    pub fn cancel(&mut self, timer: Timer) {
        if let Some(scheduled) = self.slots.remove(&timer) {
            scheduled.handle.abort();
            debug!("Cancelled {:?} (gen {})", timer, scheduled.generation);
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, scheduled) in self.slots.drain() {
            scheduled.handle.abort();
        }
    }

    pub fn is_pending(&self, timer: Timer) -> bool {
        self.slots.contains_key(&timer)
    }

    /// Returns true if `elapsed` belongs to the task currently in its slot,
    /// clearing the slot
    pub fn accept(&mut self, elapsed: TimerElapsed) -> bool {
        match self.slots.get(&elapsed.timer) {
            Some(scheduled) if scheduled.generation == elapsed.generation => {
                self.slots.remove(&elapsed.timer);
                true
            }
            _ => {
                debug!(
                    "Ignoring stale {:?} (gen {})",
                    elapsed.timer, elapsed.generation
                );
                false
            }
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);

        timers.schedule(Timer::Debounce, Duration::from_millis(1500));
        assert!(timers.is_pending(Timer::Debounce));

        let elapsed = rx.recv().await.unwrap();
        assert_eq!(elapsed.timer, Timer::Debounce);
        assert!(timers.accept(elapsed));
        assert!(!timers.is_pending(Timer::Debounce));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);

        timers.schedule(Timer::Restart, Duration::from_millis(500));
        timers.schedule(Timer::Restart, Duration::from_millis(1000));

        let started = tokio::time::Instant::now();
        let elapsed = rx.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(timers.accept(elapsed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);

        timers.schedule(Timer::Restart, Duration::from_millis(500));
        timers.cancel(Timer::Restart);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stale_generation_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = Timers::new(tx);
        let stale = TimerElapsed {
            timer: Timer::Debounce,
            generation: 42,
        };
        assert!(!timers.accept(stale));
    }
}
