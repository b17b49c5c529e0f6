use super::Device;
use parking_lot::Mutex;
use std::sync::Arc;

/// Number of slide switches on the board
pub const SWITCH_COUNT: u32 = 4;

/// Bank of slide switches, one bit each, read-only to the program. Positions are physical,
/// so they survive a reset.
#[derive(Debug, Clone, Default)]
pub struct Switches {
    state: Arc<Mutex<u32>>,
}

impl Switches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&self, index: u32) -> bool {
        if index >= SWITCH_COUNT {
            return false;
        }
        *self.state.lock() ^= 1 << index;
        true
    }

    pub fn state(&self) -> u32 {
        *self.state.lock()
    }
}

impl Device for Switches {
    fn read(&mut self, offset: u32) -> u8 {
        self.peek(offset)
    }

    fn write(&mut self, _offset: u32, _value: u8) {}

    fn writable(&self, _offset: u32) -> bool {
        false
    }

    fn peek(&self, offset: u32) -> u8 {
        (self.state() >> (8 * (offset & 3))) as u8
    }

    fn reset(&mut self) {}
}
