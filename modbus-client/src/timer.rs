//! Idle disconnect timer
//!
//! At most one timer task is pending per client. Arming a new timer cancels
//! the previous one, and every arm or cancel bumps a generation number. A
//! task that has already woken up checks its generation before acting, so a
//! superseded timer never disconnects even if its abort arrives too late.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub(crate) struct IdleTimer {
    pending: Option<JoinHandle<()>>,
    generation: u64,
}

impl IdleTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` after `delay`, replacing any pending timer
    ///
    /// `on_fire` receives the generation it was armed with.
    pub(crate) fn arm<F, Fut>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation).await;
        }));
    }

    /// Cancel the pending timer, if any
    pub(crate) fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Claim the timer from inside its own task
    ///
    /// Returns `false` if the timer armed with `generation` was cancelled or
    /// replaced in the meantime. The handle is released without aborting,
    /// so the calling task keeps running.
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        if self.generation != generation || self.pending.is_none() {
            return false;
        }
        self.pending = None;
        true
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn counting(fired: &Arc<AtomicUsize>) -> impl FnOnce(u64) -> std::future::Ready<()> + Send + 'static {
        let fired = fired.clone();
        move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = IdleTimer::new();
        timer.arm(Duration::from_millis(100), counting(&fired));
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_rearm_supersede_pending_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = IdleTimer::new();

        timer.arm(Duration::from_millis(100), counting(&fired));
        timer.cancel();
        assert!(!timer.is_armed());

        timer.arm(Duration::from_millis(100), counting(&fired));
        tokio::time::sleep(Duration::from_millis(60)).await;
        timer.arm(Duration::from_millis(100), counting(&fired));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_checks_generation() {
        let seen = Arc::new(Mutex::new(None));
        let mut timer = IdleTimer::new();
        let slot = seen.clone();
        timer.arm(Duration::from_millis(10), move |generation| {
            *slot.lock().unwrap() = Some(generation);
            std::future::ready(())
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let generation = seen.lock().unwrap().unwrap();
        assert!(!timer.claim(generation.wrapping_add(1)));
        assert!(timer.claim(generation));
        assert!(!timer.claim(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_pending_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = IdleTimer::new();
        timer.arm(Duration::from_millis(10), counting(&fired));
        drop(timer);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
