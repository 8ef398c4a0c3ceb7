//! Owned, cancellable interval timer
//!
//! The controller holds one of these per periodic callback (duration tick,
//! chunk pull). Cancellation is tied to ownership: `cancel` aborts the
//! backing task, and dropping the timer aborts it too, so no exit path can
//! leave a stray tick running.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A periodic callback with guaranteed cancellation
#[derive(Debug)]
pub struct IntervalTimer {
    handle: JoinHandle<()>,
}

impl IntervalTimer {
    /// Spawn a timer firing `tick` every `period`, starting one period from
    /// now.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately; skip it
            // so elapsed time starts at zero.
            interval.tick().await;
            loop {
                interval.tick().await;
                tick().await;
            }
        });
        Self { handle }
    }

    /// Stop the timer. No tick callback runs after this returns.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period() {
        let count = Arc::new(AtomicU32::new(0));
        let tick_count = count.clone();
        let timer = IntervalTimer::spawn(Duration::from_secs(1), move || {
            let tick_count = tick_count.clone();
            async move {
                tick_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        drop(timer);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_cancel() {
        let count = Arc::new(AtomicU32::new(0));
        let tick_count = count.clone();
        let timer = IntervalTimer::spawn(Duration::from_secs(1), move || {
            let tick_count = tick_count.clone();
            async move {
                tick_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        timer.cancel();
        let frozen = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let count = Arc::new(AtomicU32::new(0));
        let tick_count = count.clone();
        {
            let _timer = IntervalTimer::spawn(Duration::from_secs(1), move || {
                let tick_count = tick_count.clone();
                async move {
                    tick_count.fetch_add(1, Ordering::SeqCst);
                }
            });
            tokio::time::sleep(Duration::from_millis(1500)).await;
        }

        let frozen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), frozen);
    }
}
