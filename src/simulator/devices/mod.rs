//!
//! Memory-mapped peripherals. Each device answers byte accesses at offsets relative to the
//! start of its block; [`Memory`](super::memory::Memory) takes care of address resolution and of
//! composing wider accesses.
//!
//! Device state lives behind `Arc<Mutex<_>>` so the host can poke at it from another thread
//! (pressing buttons from a UI, feeding keystrokes) through an [`IoPanel`] while the simulator
//! owns the device itself.
//!

pub mod buttons;
pub mod leds;
pub mod switches;
pub mod uart;

pub use buttons::Buttons;
pub use leds::Leds;
pub use switches::Switches;
pub use uart::Uart;

/// A peripheral that can be mapped into memory
pub trait Device: Send {
    /// Byte at `offset`. May have side effects (popping a received character, for example).
    fn read(&mut self, offset: u32) -> u8;

    /// Stores a byte at `offset`. Only called after [`Device::writable`] agreed.
    fn write(&mut self, offset: u32, value: u8);

    /// Whether a store to `offset` is accepted at all. Stores to a rejected offset fail with
    /// a read-only memory error and nothing is written.
    fn writable(&self, offset: u32) -> bool;

    /// Byte at `offset`, without side effects. Used for inspection.
    fn peek(&self, offset: u32) -> u8;

    /// Returns to the power-on state
    fn reset(&mut self);
}

/// Cloneable handle to the externally driven inputs of the standard devices
#[derive(Debug, Clone)]
pub struct IoPanel {
    switches: Switches,
    buttons: Buttons,
    uart: Uart,
}

impl IoPanel {
    pub(crate) fn new(switches: Switches, buttons: Buttons, uart: Uart) -> Self {
        Self {
            switches,
            buttons,
            uart,
        }
    }

    /// Flips switch `index`. Returns false if there's no such switch.
    pub fn toggle_switch(&self, index: u32) -> bool {
        self.switches.toggle(index)
    }

    pub fn switches(&self) -> u32 {
        self.switches.state()
    }

    pub fn press_button(&self, index: u32) -> bool {
        self.buttons.set(index, true)
    }

    pub fn release_button(&self, index: u32) -> bool {
        self.buttons.set(index, false)
    }

    pub fn buttons(&self) -> u32 {
        self.buttons.state()
    }

    /// Queues a character for the UART receiver
    pub fn feed_serial_input(&self, c: u8) {
        self.uart.feed(c)
    }

    pub fn feed_serial_str(&self, s: &str) {
        s.bytes().for_each(|c| self.uart.feed(c));
    }
}
