//! Latest-wins single-slot hand-off between a host callback thread and the consumer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Holds at most one pending value of `T`.
///
/// [`publish`](StreamBuffer::publish) replaces whatever is pending, and
/// [`take`](StreamBuffer::take) removes it, so a value is observed by the consumer at
/// most once and a slow consumer only ever sees the newest value. Both operations hold
/// the lock for a single swap; it is never held while a snapshot is built or read.
#[derive(Debug)]
pub struct StreamBuffer<T> {
    slot: Mutex<Option<T>>,
    published: AtomicU64,
    superseded: AtomicU64,
}

impl<T> Default for StreamBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StreamBuffer<T> {
    pub const fn new() -> Self {
        Self { slot: Mutex::new(None), published: AtomicU64::new(0), superseded: AtomicU64::new(0) }
    }

    /// Places `value` in the slot, dropping any value the consumer never took.
    ///
    /// Returns `true` when an untaken value was replaced.
    pub fn publish(&self, value: T) -> bool {
        let previous = self.lock().replace(value);
        self.published.fetch_add(1, Ordering::Relaxed);

        // Dropped outside the lock.
        let replaced = previous.is_some();
        if replaced {
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        replaced
    }

    /// Removes and returns the pending value, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Drops any pending value.
    pub fn clear(&self) {
        let _ = self.take();
    }

    /// Total number of values ever published.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of published values that were replaced before the consumer took them.
    pub fn superseded_count(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    // A panicking holder cannot leave the slot half-written: every critical section is
    // a single `Option` swap. Recover the guard instead of propagating the poison.
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn take_on_empty_buffer_is_none() {
        let buffer: StreamBuffer<u32> = StreamBuffer::new();
        assert_eq!(buffer.take(), None);
        assert!(!buffer.has_pending());
    }

    #[test]
    fn second_publish_supersedes_first() {
        let buffer = StreamBuffer::new();
        assert!(!buffer.publish("first"));
        assert!(buffer.publish("second"));

        assert_eq!(buffer.take(), Some("second"));
        assert_eq!(buffer.take(), None);
        assert_eq!(buffer.published_count(), 2);
        assert_eq!(buffer.superseded_count(), 1);
    }

    #[test]
    fn value_is_observed_at_most_once() {
        let buffer = StreamBuffer::new();
        buffer.publish(vec![1, 2, 3]);

        assert_eq!(buffer.take(), Some(vec![1, 2, 3]));
        assert_eq!(buffer.take(), None);

        buffer.publish(vec![4]);
        assert_eq!(buffer.take(), Some(vec![4]));
    }

    #[test]
    fn clear_discards_pending_value() {
        let buffer = StreamBuffer::new();
        buffer.publish(5u8);
        buffer.clear();
        assert_eq!(buffer.take(), None);
    }

    #[test]
    fn concurrent_publishers_leave_exactly_one_complete_value() {
        let buffer = Arc::new(StreamBuffer::new());
        let writers: Vec<_> = (0..4u32)
            .map(|writer| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    for i in 0..1000u32 {
                        // Each value is internally consistent: every element equals its tag.
                        let tag = writer * 10_000 + i;
                        buffer.publish(vec![tag; 16]);
                    }
                })
            })
            .collect();

        let mut observed = 0u64;
        while writers.iter().any(|w| !w.is_finished()) {
            if let Some(value) = buffer.take() {
                assert!(value.iter().all(|v| *v == value[0]), "torn value observed");
                observed += 1;
            }
        }
        for writer in writers {
            writer.join().expect("writer thread panicked");
        }
        if buffer.take().is_some() {
            observed += 1;
        }

        assert_eq!(buffer.published_count(), 4000);
        assert_eq!(observed + buffer.superseded_count(), 4000);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let buffer = Arc::new(StreamBuffer::new());
        buffer.publish(1u32);

        let poisoner = Arc::clone(&buffer);
        let _ = thread::spawn(move || {
            let _guard = poisoner.slot.lock().expect("first lock");
            panic!("poison the slot");
        })
        .join();

        assert_eq!(buffer.take(), Some(1));
        buffer.publish(2);
        assert_eq!(buffer.take(), Some(2));
    }
}
