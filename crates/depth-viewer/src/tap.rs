//! Cross-thread tap delivery.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::time::Instant;

/// Capacity of the pending-tap ring. Taps are low-frequency relative to the
/// display rate, so a small fixed buffer is plenty.
const TAP_QUEUE_CAPACITY: usize = 16;

/// A single pointer tap, in physical surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapEvent {
    pub x: f32,
    pub y: f32,
    pub at: Instant,
}

impl TapEvent {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            at: Instant::now(),
        }
    }
}

/// Fixed-capacity, lossy, non-blocking queue carrying taps from the input
/// thread to the render thread.
///
/// Overflow drops the incoming event, never what is already queued, and
/// never blocks the producer. Backed by a bounded channel, so enqueue and
/// poll are safe from different threads.
pub struct TapQueue {
    tx: Sender<TapEvent>,
    rx: Receiver<TapEvent>,
}

impl TapQueue {
    pub fn new() -> Self {
        let (tx, rx) = bounded(TAP_QUEUE_CAPACITY);
        Self { tx, rx }
    }

    /// Offers a tap. Returns false when the queue is full and the tap was
    /// dropped.
    pub fn enqueue(&self, tap: TapEvent) -> bool {
        match self.tx.try_send(tap) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            // Both ends live as long as `self`.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Removes and returns the oldest pending tap, if any. Called from the
    /// render thread at most once per tick.
    pub fn poll(&self) -> Option<TapEvent> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_keeps_the_first_sixteen_in_fifo_order() {
        let queue = TapQueue::new();
        let mut accepted = 0;
        for i in 0..20 {
            if queue.enqueue(TapEvent::new(i as f32, 0.0)) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 16);

        for i in 0..16 {
            let tap = queue.poll().expect("queued tap");
            assert_eq!(tap.x, i as f32);
        }
        assert!(queue.poll().is_none());
    }

    #[test]
    fn poll_on_empty_is_none() {
        let queue = TapQueue::new();
        assert!(queue.poll().is_none());
    }

    #[test]
    fn enqueue_from_another_thread_is_delivered() {
        let queue = std::sync::Arc::new(TapQueue::new());
        let producer = queue.clone();
        std::thread::spawn(move || {
            producer.enqueue(TapEvent::new(3.0, 4.0));
        })
        .join()
        .unwrap();

        let tap = queue.poll().expect("tap from producer thread");
        assert_eq!((tap.x, tap.y), (3.0, 4.0));
    }
}
