//! Standard memory map of the board

pub const RAM_START: u32 = 0x0000_0000;
pub const RAM_SIZE: u32 = 0x0010_0000;

pub const LEDS_START: u32 = 0xff20_0000;
pub const SWITCHES_START: u32 = 0xff20_0040;
pub const BUTTONS_START: u32 = 0xff20_0050;
pub const UART_START: u32 = 0xff20_1000;

/// Every device occupies a single word
pub const DEVICE_SIZE: u32 = 4;
