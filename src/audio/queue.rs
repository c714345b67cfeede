//! Bounded drop-oldest queue for captured PCM samples
//!
//! Single producer (the hardware capture callback) / single consumer
//! (the orchestrator). When the ring fills up the oldest unread sample
//! is evicted to admit the newest: for a reactive pipeline stale samples
//! are worse than gaps. The producer never blocks; the consumer suspends
//! on an async notify until samples arrive or the queue is closed.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::AudioError;

pub struct SampleQueue {
    ring: ArrayQueue<f32>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            ring: ArrayQueue::new(capacity),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }

    /// Push one sample, evicting the oldest on overflow. Never blocks.
    pub fn push(&self, sample: f32) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        if self.ring.force_push(sample).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
    }

    /// Push a whole capture buffer, waking the consumer once at the end.
    pub fn push_slice(&self, samples: &[f32]) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        let mut evicted = 0u64;
        for &sample in samples {
            if self.ring.force_push(sample).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.dropped.fetch_add(evicted, Ordering::Relaxed);
        }
        self.notify.notify_one();
    }

    /// Pop without waiting.
    pub fn try_pop(&self) -> Option<f32> {
        self.ring.pop()
    }

    /// Read exactly `count` samples in arrival order, suspending while
    /// the ring is empty. Fails with `QueueClosed` once the queue is
    /// closed and drained, so a pending read never hangs past shutdown.
    pub async fn read_samples(&self, count: usize) -> Result<Vec<f32>, AudioError> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            match self.ring.pop() {
                Some(sample) => out.push(sample),
                None => {
                    if self.closed.load(Ordering::Acquire) {
                        return Err(AudioError::QueueClosed);
                    }
                    self.notify.notified().await;
                }
            }
        }
        Ok(out)
    }

    /// Mark the queue closed and wake any pending reader.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Samples evicted by overflow since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_oldest_keeps_newest() {
        let queue = SampleQueue::new(8);
        for i in 0..9 {
            queue.push(i as f32);
        }
        assert_eq!(queue.dropped(), 1);

        // The first sample was evicted; the last eight survive in
        // original relative order.
        let drained: Vec<f32> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(drained, (1..9).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_read_samples_in_arrival_order() {
        let queue = SampleQueue::new(64);
        queue.push_slice(&[1.0, 2.0, 3.0, 4.0]);
        let samples = queue.read_samples(4).await.unwrap();
        assert_eq!(samples, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_read_waits_for_producer() {
        let queue = SampleQueue::new(64);
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.read_samples(3).await })
        };
        // Give the reader a chance to park first.
        tokio::task::yield_now().await;
        queue.push_slice(&[7.0, 8.0]);
        queue.push(9.0);

        let samples = reader.await.unwrap().unwrap();
        assert_eq!(samples, vec![7.0, 8.0, 9.0]);
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read() {
        let queue = SampleQueue::new(64);
        let reader = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.read_samples(10).await })
        };
        tokio::task::yield_now().await;
        queue.close();

        let result = reader.await.unwrap();
        assert!(matches!(result, Err(AudioError::QueueClosed)));
    }

    #[tokio::test]
    async fn test_close_drains_remaining_samples_first() {
        let queue = SampleQueue::new(64);
        queue.push_slice(&[1.0, 2.0]);
        queue.close();

        // Buffered samples are still readable after close...
        assert_eq!(queue.read_samples(2).await.unwrap(), vec![1.0, 2.0]);
        // ...but the next read fails instead of blocking forever.
        assert!(matches!(
            queue.read_samples(1).await,
            Err(AudioError::QueueClosed)
        ));
    }
}
