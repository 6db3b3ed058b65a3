use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counter shared between tasks that wakes waiters once `threshold` is reached.
#[derive(Debug)]
pub struct SharedCounter {
    count: AtomicUsize,
    threshold: usize,
    notify: Notify,
}

impl SharedCounter {
    pub fn new(threshold: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            threshold,
            notify: Notify::new(),
        }
    }

    pub fn increment(&self) {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        if count == self.threshold {
            self.notify.notify_waiters();
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_reached(&self) -> bool {
        self.count() >= self.threshold
    }

    /// Resolve once the threshold has been reached.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so an increment in between is not missed.
            notified.as_mut().enable();

            if self.is_reached() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn zero_threshold_is_reached_immediately() {
        tokio_test::block_on(async move {
            let counter = SharedCounter::new(0);
            counter.wait().await;
            assert!(counter.is_reached());
        })
    }

    #[test]
    fn wait_until_threshold() {
        tokio_test::block_on(async move {
            let counter = Arc::new(SharedCounter::new(3));

            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        tokio::task::yield_now().await;
                        counter.increment();
                    })
                })
                .collect();

            counter.wait().await;
            assert_eq!(counter.count(), 3);

            for handle in handles {
                handle.await.unwrap();
            }
        })
    }

    #[test]
    fn not_reached_below_threshold() {
        let counter = SharedCounter::new(2);
        counter.increment();

        assert!(!counter.is_reached());
        assert_eq!(counter.count(), 1);
    }
}
