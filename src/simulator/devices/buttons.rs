use super::Device;
use parking_lot::Mutex;
use std::sync::Arc;

/// Number of push buttons on the board
pub const BUTTON_COUNT: u32 = 4;

/// Push buttons, one bit each, set while held down. Read-only to the program.
#[derive(Debug, Clone, Default)]
pub struct Buttons {
    state: Arc<Mutex<u32>>,
}

impl Buttons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, index: u32, pressed: bool) -> bool {
        if index >= BUTTON_COUNT {
            return false;
        }
        let mut state = self.state.lock();
        if pressed {
            *state |= 1 << index;
        } else {
            *state &= !(1 << index);
        }
        true
    }

    pub fn state(&self) -> u32 {
        *self.state.lock()
    }
}

impl Device for Buttons {
    fn read(&mut self, offset: u32) -> u8 {
        self.peek(offset)
    }

    fn write(&mut self, _offset: u32, _value: u8) {}

    fn writable(&self, _offset: u32) -> bool {
        false
    }

    fn peek(&self, offset: u32) -> u8 {
        match offset {
            0 => self.state() as u8,
            _ => 0,
        }
    }

    fn reset(&mut self) {}
}
