//! Bounds how many items of a batch are being prepared and compressed at once.
//!
//! Wraps Tokio's semaphore, which hands permits out in request order, so
//! items start in the order they were submitted to the batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::utils::{CompressorError, CompressorResult};

#[derive(Debug)]
pub struct PreparationLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    waiting: AtomicUsize,
}

impl PreparationLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        let max_permits = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_permits)),
            max_permits,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Waits for a permit. Earlier callers are served first.
    pub async fn acquire(&self) -> CompressorResult<PreparationPermit<'_>> {
        let waiting = Waiting::enter(&self.waiting);
        let permit = self.semaphore.clone().acquire_owned().await;
        drop(waiting);

        let permit = permit.map_err(|_| CompressorError::compression("Preparation limiter closed"))?;
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::Relaxed);

        Ok(PreparationPermit { _permit: permit, in_flight: &self.in_flight })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }
}

/// Counts a caller as waiting until dropped, including when the acquire is cancelled.
struct Waiting<'a>(&'a AtomicUsize);

impl<'a> Waiting<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Held for the whole life of one item's pipeline run.
#[derive(Debug)]
pub struct PreparationPermit<'a> {
    _permit: OwnedSemaphorePermit,
    in_flight: &'a AtomicUsize,
}

impl Drop for PreparationPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_max() {
        let limiter = PreparationLimiter::new(2);
        let a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert!(tokio::time::timeout(Duration::from_millis(20), limiter.acquire()).await.is_err());
        assert_eq!(limiter.waiting(), 0);

        drop(a);
        let _c = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(limiter.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn waiters_are_served_in_arrival_order() {
        let limiter = PreparationLimiter::new(1);
        let order = Mutex::new(Vec::new());

        let first = limiter.acquire().await.unwrap();
        let waiters = futures::future::join_all((0..4).map(|i| {
            let limiter = &limiter;
            let order = &order;
            async move {
                let _permit = limiter.acquire().await.unwrap();
                order.lock().push(i);
                tokio::task::yield_now().await;
            }
        }));
        let release = async {
            while limiter.waiting() < 4 {
                tokio::task::yield_now().await;
            }
            drop(first);
        };

        tokio::join!(waiters, release);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        assert_eq!(limiter.in_flight(), 0);
    }
}
