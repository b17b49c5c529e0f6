use super::Device;
use crate::simulator::events::{Event, EventBus};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub const RX_DATA: u32 = 0;
pub const TX_DATA: u32 = 1;
pub const STATUS: u32 = 2;

pub const STATUS_RX_READY: u8 = 1 << 0;
pub const STATUS_TX_IDLE: u8 = 1 << 1;

#[derive(Debug, Default)]
struct UartState {
    rx: u8,
    rx_ready: bool,
    input: VecDeque<u8>,
}

impl UartState {
    /// Moves the next queued character into the receive register if it's free
    fn refill(&mut self) {
        if !self.rx_ready {
            if let Some(c) = self.input.pop_front() {
                self.rx = c;
                self.rx_ready = true;
            }
        }
    }

    fn status(&self) -> u8 {
        STATUS_TX_IDLE | if self.rx_ready { STATUS_RX_READY } else { 0 }
    }
}

/// Serial port. Received characters are queued by the host and delivered one at a time
/// through the receive register; transmitted characters go straight out as events.
///
/// | offset | read                    | write          |
/// |--------|-------------------------|----------------|
/// | 0      | received byte           | ignored        |
/// | 1      | 0                       | transmit       |
/// | 2      | status (rx-ready, idle) | ignored        |
/// | 3      | 0                       | ignored        |
#[derive(Debug, Clone)]
pub struct Uart {
    state: Arc<Mutex<UartState>>,
    bus: EventBus,
}

impl Uart {
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Default::default(),
            bus,
        }
    }

    pub fn feed(&self, c: u8) {
        self.state.lock().input.push_back(c);
    }

    /// Characters waiting behind the receive register
    pub fn pending(&self) -> usize {
        self.state.lock().input.len()
    }
}

impl Device for Uart {
    fn read(&mut self, offset: u32) -> u8 {
        let mut state = self.state.lock();
        state.refill();
        match offset {
            RX_DATA => {
                state.rx_ready = false;
                state.rx
            }
            STATUS => state.status(),
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u8) {
        self.state.lock().refill();
        if offset == TX_DATA {
            self.bus.publish(Event::SerialOutput(value));
        }
    }

    fn writable(&self, _offset: u32) -> bool {
        true
    }

    fn peek(&self, offset: u32) -> u8 {
        let state = self.state.lock();
        let next = (!state.rx_ready).then(|| state.input.front()).flatten();
        match offset {
            RX_DATA => next.copied().unwrap_or(state.rx),
            STATUS if next.is_some() => state.status() | STATUS_RX_READY,
            STATUS => state.status(),
            _ => 0,
        }
    }

    fn reset(&mut self) {
        *self.state.lock() = UartState::default();
    }
}
