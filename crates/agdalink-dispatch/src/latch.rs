use tokio::sync::watch;

/// Counted barrier over in-flight response handlers.
///
/// Not a mutual-exclusion lock: it coordinates ordering — "has every
/// tracked handler settled?" — never memory access. Cloning shares the
/// counter.
#[derive(Debug, Clone)]
pub struct CompletionLatch {
    count: watch::Sender<usize>,
}

/// Tracks one unit of work. The count drops when the guard does, whatever
/// the outcome of the work — including an unwinding task.
#[derive(Debug)]
pub struct TrackGuard {
    count: watch::Sender<usize>,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self {
            count: watch::Sender::new(0),
        }
    }

    /// Register one unit of outstanding work.
    pub fn track(&self) -> TrackGuard {
        self.count.send_modify(|count| *count += 1);
        TrackGuard {
            count: self.count.clone(),
        }
    }

    /// Run a future while holding a track guard.
    pub async fn run_tracked<F: std::future::Future>(&self, fut: F) -> F::Output {
        let _guard = self.track();
        fut.await
    }

    /// Number of currently tracked units.
    pub fn in_flight(&self) -> usize {
        *self.count.borrow()
    }

    /// Resolves once no tracked work remains.
    ///
    /// Resolves without suspending when the count is already zero;
    /// otherwise every concurrent waiter is released on the transition to
    /// zero.
    pub async fn drained(&self) {
        let mut rx = self.count.subscribe();
        // wait_for tests the current value first, so a drained latch never
        // waits for an event. The sender lives in self, hence no error.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.count.send_modify(|count| *count -= 1);
    }
}
