//! Fan-out channel feeding epic input streams

use std::sync::{Mutex, PoisonError};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

/// Multicasts every item to all live receivers.
///
/// Receivers only see items pushed after they subscribed. Completing the
/// subject ends every receiver's stream; later subscribers get an already
/// finished stream.
pub(crate) struct Subject<T> {
    inner: Mutex<SubjectInner<T>>,
}

struct SubjectInner<T> {
    senders: Vec<UnboundedSender<T>>,
    completed: bool,
}

impl<T: Clone> Subject<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(SubjectInner {
                senders: Vec::new(),
                completed: false,
            }),
        }
    }

    pub(crate) fn subscribe(&self) -> UnboundedReceiver<T> {
        let (tx, rx) = unbounded();
        let mut inner = self.lock();
        if !inner.completed {
            inner.senders.push(tx);
        }
        rx
    }

    /// Push an item to every receiver, pruning the dropped ones.
    pub(crate) fn next(&self, item: &T) {
        // Sending wakes receivers, which may re-enter `subscribe`.
        let senders = self.lock().senders.clone();
        let mut dropped = false;
        for tx in &senders {
            if tx.unbounded_send(item.clone()).is_err() {
                dropped = true;
            }
        }
        if dropped {
            self.lock().senders.retain(|tx| !tx.is_closed());
        }
    }

    pub(crate) fn complete(&self) {
        let mut inner = self.lock();
        inner.completed = true;
        inner.senders.clear();
    }

    #[cfg(test)]
    pub(crate) fn receiver_count(&self) -> usize {
        self.lock().senders.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SubjectInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_multicast() {
        let subject = Subject::new();
        let mut a = subject.subscribe();
        let mut b = subject.subscribe();

        subject.next(&1);
        subject.next(&2);
        subject.complete();

        let a: Vec<i32> = futures::executor::block_on(async { (&mut a).collect().await });
        let b: Vec<i32> = futures::executor::block_on(async { (&mut b).collect().await });
        assert_eq!(a, vec![1, 2]);
        assert_eq!(b, vec![1, 2]);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_items() {
        let subject = Subject::new();
        subject.next(&1);
        let mut late = subject.subscribe();
        subject.next(&2);
        subject.complete();

        let items: Vec<i32> = futures::executor::block_on(async { (&mut late).collect().await });
        assert_eq!(items, vec![2]);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let subject = Subject::new();
        let rx = subject.subscribe();
        assert_eq!(subject.receiver_count(), 1);

        drop(rx);
        subject.next(&1);
        assert_eq!(subject.receiver_count(), 0);
    }

    #[test]
    fn test_subscribe_after_complete_ends_immediately() {
        let subject: Subject<i32> = Subject::new();
        subject.complete();
        let mut rx = subject.subscribe();
        assert_eq!(futures::executor::block_on(rx.next()), None);
    }
}
