use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Result of a blocking [`Queue::pop`].
#[derive(Debug)]
pub(crate) enum Pop<T> {
    Item(T),
    /// Closed normally and drained.
    Ended,
    /// Torn down; buffered items were discarded.
    Aborted,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
    aborted: bool,
}

/// Unbounded blocking queue shared between the demultiplexer thread and
/// consumers.
pub(crate) struct Queue<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Queue<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
                aborted: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Append an item. Returns `false` (dropping the item) once closed.
    pub(crate) fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.items.push_back(item);
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Take the next item, blocking while the queue is open and empty.
    pub(crate) fn pop(&self) -> Pop<T> {
        let mut state = self.state.lock();
        loop {
            if state.aborted {
                return Pop::Aborted;
            }
            if let Some(item) = state.items.pop_front() {
                return Pop::Item(item);
            }
            if state.closed {
                return Pop::Ended;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Stop accepting items; consumers drain what is buffered, then see `Ended`.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    /// Close and discard buffered items; consumers see `Aborted`.
    pub(crate) fn abort(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.aborted = true;
        state.items.clear();
        drop(state);
        self.ready.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn drains_before_reporting_end() {
        let queue = Queue::new();
        assert!(queue.push(1));
        assert!(queue.push(2));
        queue.close();
        assert!(!queue.push(3));

        assert!(matches!(queue.pop(), Pop::Item(1)));
        assert!(matches!(queue.pop(), Pop::Item(2)));
        assert!(matches!(queue.pop(), Pop::Ended));
        assert!(queue.is_closed());
    }

    #[test]
    fn abort_discards_items() {
        let queue = Queue::new();
        queue.push("lost");
        queue.abort();
        assert!(matches!(queue.pop(), Pop::Aborted));
    }

    #[test]
    fn pop_blocks_until_push() {
        let queue = Arc::new(Queue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || match queue.pop() {
                Pop::Item(value) => value,
                other => panic!("unexpected {other:?}"),
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.push(42u32);
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn close_wakes_waiting_consumer() {
        let queue: Arc<Queue<u8>> = Arc::new(Queue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || matches!(queue.pop(), Pop::Ended))
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(consumer.join().unwrap());
    }
}
