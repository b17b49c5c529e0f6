//!
//! Publish/subscribe channel for state changes. Anything that wants to watch the simulator
//! (a front end, a logger, a test) calls [`EventBus::subscribe`] and drains the receiver at its
//! own pace; the simulator never waits on a listener.
//!

use crossbeam_channel as cbc;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A register was written
    Register { index: u8, value: u32 },
    /// The program counter moved to a new instruction
    Pc(u32),
    /// A byte of RAM was written. Only published when enabled on the memory.
    MemoryChanged { address: u32, value: u8 },
    /// New state of the LED bank
    Leds(u8),
    /// A byte transmitted through the UART
    SerialOutput(u8),
    /// The program reached the halt word
    Halted { steps: u64 },
}

/// Cloneable handle to the subscriber list. Every clone publishes to the same listeners.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<cbc::Sender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> cbc::Receiver<Event> {
        let (tx, rx) = cbc::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber. Subscribers whose receiver was dropped are
    /// forgotten.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|tx| tx.send(event).is_ok());
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_gets_every_event() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.clone().subscribe();

        bus.publish(Event::Leds(3));
        bus.publish(Event::Pc(8));

        assert_eq!(a.try_iter().collect::<Vec<_>>(), [Event::Leds(3), Event::Pc(8)]);
        assert_eq!(b.try_iter().collect::<Vec<_>>(), [Event::Leds(3), Event::Pc(8)]);
    }

    #[test]
    fn test_dropped_subscribers_are_forgotten() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);
        assert!(bus.has_subscribers());

        bus.publish(Event::SerialOutput(b'x'));
        assert!(!bus.has_subscribers());
    }
}
