//! Elapsed-time ticker for an active recording

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::domain::session::CaptureState;

/// Ticker period
pub const TICK: StdDuration = StdDuration::from_secs(1);

/// Owned handle to the ticking task. Dropping it stops the ticks.
#[derive(Debug)]
pub struct ElapsedTimer {
    handle: JoinHandle<()>,
}

impl ElapsedTimer {
    /// Add one to `elapsed` every [`TICK`] while the session is recording.
    ///
    /// The task ends on its own as soon as the session leaves `Recording`.
    pub fn spawn(elapsed: Arc<AtomicU64>, mut state: watch::Receiver<CaptureState>) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *state.borrow() != CaptureState::Recording {
                            break;
                        }
                        elapsed.fetch_add(1, Ordering::SeqCst);
                    }
                    changed = state.changed() => {
                        if changed.is_err() || *state.borrow_and_update() != CaptureState::Recording {
                            break;
                        }
                    }
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ElapsedTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_while_recording() {
        let elapsed = Arc::new(AtomicU64::new(0));
        let (_tx, rx) = watch::channel(CaptureState::Recording);
        let _timer = ElapsedTimer::spawn(Arc::clone(&elapsed), rx);

        tokio::time::sleep(StdDuration::from_millis(3_500)).await;
        assert_eq!(elapsed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_state_leaves_recording() {
        let elapsed = Arc::new(AtomicU64::new(0));
        let (tx, rx) = watch::channel(CaptureState::Recording);
        let timer = ElapsedTimer::spawn(Arc::clone(&elapsed), rx);

        tokio::time::sleep(StdDuration::from_millis(2_500)).await;
        tx.send_replace(CaptureState::Stopping);
        tokio::time::sleep(StdDuration::from_secs(3)).await;

        assert_eq!(elapsed.load(Ordering::SeqCst), 2);
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking() {
        let elapsed = Arc::new(AtomicU64::new(0));
        let (_tx, rx) = watch::channel(CaptureState::Recording);
        let timer = ElapsedTimer::spawn(Arc::clone(&elapsed), rx);

        tokio::time::sleep(StdDuration::from_millis(1_500)).await;
        timer.cancel();
        tokio::time::sleep(StdDuration::from_secs(5)).await;

        assert_eq!(elapsed.load(Ordering::SeqCst), 1);
    }
}
