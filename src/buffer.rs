//! # Interrupt receive channel
//!
//! Lock-free single-producer/single-consumer byte channel between the UART
//! receive interrupt and the polled protocol engine. The producer half is
//! moved into the interrupt handler, the consumer half into
//! [Driver](crate::driver::Driver).
//!
//! ```
//! use esp_at_driver::buffer::RxChannel;
//!
//! let mut channel: RxChannel<64> = RxChannel::new();
//! let (mut producer, mut consumer) = channel.split();
//!
//! producer.push(b'A');
//! assert_eq!(Some(b'A'), consumer.pop());
//! assert_eq!(None, consumer.pop());
//! ```
use heapless::spsc::{Consumer, Producer, Queue};

/// Byte channel of fixed capacity `N`. Usable capacity is `N - 1`.
///
/// Typical capacity for full-rate UART traffic is 1024.
pub struct RxChannel<const N: usize = 1024> {
    queue: Queue<u8, N>,
}

impl<const N: usize> RxChannel<N> {
    pub const fn new() -> Self {
        Self { queue: Queue::new() }
    }

    /// Splits the channel into its interrupt half and its engine half.
    pub fn split(&mut self) -> (RxProducer<'_, N>, RxConsumer<'_, N>) {
        let (producer, consumer) = self.queue.split();
        (
            RxProducer {
                inner: producer,
                dropped: 0,
            },
            RxConsumer { inner: consumer },
        )
    }
}

impl<const N: usize> Default for RxChannel<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt half. `push` never blocks, so it is safe to call with interrupts
/// disabled or from the receive ISR itself.
pub struct RxProducer<'a, const N: usize> {
    inner: Producer<'a, u8, N>,
    dropped: u32,
}

impl<const N: usize> RxProducer<'_, N> {
    /// Enqueues one received byte. If the channel is full the byte is
    /// dropped and the overflow counter is incremented.
    pub fn push(&mut self, byte: u8) {
        if self.inner.enqueue(byte).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
        }
    }

    /// Number of bytes dropped so far because the channel was full.
    ///
    /// A non-zero value means the engine is not polled often enough for the
    /// configured capacity.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Returns true if at least one more byte can be enqueued.
    pub fn ready(&self) -> bool {
        self.inner.ready()
    }
}

/// Engine half. Must only be polled from the single context that drives
/// [Driver](crate::driver::Driver).
pub struct RxConsumer<'a, const N: usize> {
    inner: Consumer<'a, u8, N>,
}

impl<const N: usize> RxConsumer<'_, N> {
    /// Dequeues the next received byte, if any.
    pub fn pop(&mut self) -> Option<u8> {
        self.inner.dequeue()
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards all buffered bytes.
    pub(crate) fn drain(&mut self) {
        while self.inner.dequeue().is_some() {}
    }
}
