//! Cancellable recurring task used to poll task status.
//!
//! [`spawn_poller`] runs a tick callback once immediately and then on a fixed
//! interval, until the callback returns [`ControlFlow::Break`] or the returned
//! [`PollHandle`] is cancelled (explicitly or by dropping it).
//!
//! Ticks never overlap: each callback future is awaited before the next tick
//! is considered, and ticks that come due while a slow callback is still
//! running are skipped rather than queued. Each invocation receives a
//! monotonically increasing sequence number starting at 1.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Exclusive owner of a running poll task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the task. Any in-flight callback is dropped at its next await.
    pub fn cancel(&self) {
        self.token.cancel();
        self.task.abort();
    }

    /// `true` until the task is cancelled or has stopped on its own.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Spawn a poll loop on the current Tokio runtime.
///
/// Must be called from within a runtime.
pub fn spawn_poller<F, Fut>(interval: Duration, mut tick: F) -> PollHandle
where
    F: FnMut(u64) -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let token = CancellationToken::new();
    let task_token = token.clone();

    let task = tokio::spawn(async move {
        let mut next = Instant::now();
        let mut seq: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => break,
                _ = sleep_until(next) => {}
            }

            seq += 1;
            trace!(seq, "poll tick");
            let flow = tokio::select! {
                biased;
                _ = task_token.cancelled() => break,
                flow = tick(seq) => flow,
            };
            if flow.is_break() {
                break;
            }

            // Stay on the fixed grid; slots that passed during the callback are dropped.
            let now = Instant::now();
            next += interval;
            while next < now {
                next += interval;
            }
        }
        trace!(seq, "poll loop stopped");
    });

    PollHandle { token, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    const INTERVAL: Duration = Duration::from_millis(2000);

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_fixed_spacing() {
        let start = Instant::now();
        let times = Arc::new(std::sync::Mutex::new(Vec::new()));
        let t = times.clone();

        let handle = spawn_poller(INTERVAL, move |_seq| {
            let t = t.clone();
            async move {
                t.lock().unwrap().push(start.elapsed());
                ControlFlow::Continue(())
            }
        });

        sleep(Duration::from_millis(4500)).await;
        handle.cancel();

        let times = times.lock().unwrap().clone();
        assert_eq!(times.len(), 3, "got: {times:?}");
        for (at, expected_ms) in times.iter().zip([0u64, 2000, 4000]) {
            let expected = Duration::from_millis(expected_ms);
            assert!(
                *at >= expected && *at <= expected + Duration::from_millis(5),
                "tick at {at:?}, expected ~{expected:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_numbers_increase_from_one() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        let _handle = spawn_poller(INTERVAL, move |seq| {
            let s = s.clone();
            async move {
                s.lock().unwrap().push(seq);
                if seq == 4 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });

        sleep(Duration::from_secs(20)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn break_stops_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let handle = spawn_poller(INTERVAL, move |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Break(())
            }
        });

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_future_ticks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let handle = spawn_poller(INTERVAL, move |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        sleep(Duration::from_millis(100)).await;
        assert!(handle.is_active());
        handle.cancel();
        assert!(!handle.is_active());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let handle = spawn_poller(INTERVAL, move |_| {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });
        sleep(Duration::from_millis(100)).await;
        drop(handle);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_in_flight_callback() {
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let handle = spawn_poller(INTERVAL, move |_| {
            let f = f.clone();
            async move {
                sleep(Duration::from_secs(5)).await;
                f.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        sleep(Duration::from_secs(1)).await;
        handle.cancel();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_callbacks_never_overlap() {
        let in_flight = Arc::new(AtomicU64::new(0));
        let max_in_flight = Arc::new(AtomicU64::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let (i, m, c) = (in_flight.clone(), max_in_flight.clone(), calls.clone());

        let handle = spawn_poller(INTERVAL, move |_| {
            let (i, m, c) = (i.clone(), m.clone(), c.clone());
            async move {
                let now = i.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                c.fetch_add(1, Ordering::SeqCst);
                // Each check takes 5 s, longer than two intervals.
                sleep(Duration::from_secs(5)).await;
                i.fetch_sub(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        sleep(Duration::from_millis(20_500)).await;
        handle.cancel();

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        // Ticks due during a slow check are skipped, not queued: t=0, 6, 12, 18.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
