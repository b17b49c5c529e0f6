use super::Device;
use crate::simulator::events::{Event, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;

/// Four red LEDs, driven by the low nibble of the byte at offset 0
#[derive(Debug, Clone)]
pub struct Leds {
    state: Arc<Mutex<u8>>,
    bus: EventBus,
}

impl Leds {
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Default::default(),
            bus,
        }
    }

    pub fn state(&self) -> u8 {
        *self.state.lock()
    }
}

impl Device for Leds {
    fn read(&mut self, offset: u32) -> u8 {
        self.peek(offset)
    }

    fn write(&mut self, offset: u32, value: u8) {
        if offset != 0 {
            return;
        }
        let value = value & 0xf;
        *self.state.lock() = value;
        self.bus.publish(Event::Leds(value));
    }

    fn writable(&self, _offset: u32) -> bool {
        true
    }

    fn peek(&self, offset: u32) -> u8 {
        match offset {
            0 => self.state(),
            _ => 0,
        }
    }

    fn reset(&mut self) {
        *self.state.lock() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_keeps_low_nibble() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut leds = Leds::new(bus);

        leds.write(0, 0xab);
        leds.write(1, 0xff);
        assert_eq!(leds.read(0), 0x0b);
        assert_eq!(leds.read(1), 0);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), [Event::Leds(0x0b)]);
    }
}
