//!
//! niosim is an instructional simulator for a 32-bit Nios-style processor. It assembles
//! source text into a machine-code image and runs that image one instruction at a time,
//! with the board's LEDs, switches, buttons and serial port mapped into memory.
//!
//! A typical session:
//!
//! ```
//! use niosim::{parser, simulator::Simulator};
//!
//! let program = parser::assemble("movi r2, 40\naddi r2, r2, 2\n").unwrap();
//! let mut sim = Simulator::new();
//! sim.load(&program).unwrap();
//! sim.run().unwrap();
//! assert_eq!(sim.read_register(2), 42);
//! ```
//!
//! The simulator doesn't try to be cycle accurate. There are no interrupts, no privilege
//! levels and no MMU, and the all-zero word halts execution.
//!

pub mod config;
pub mod instruction;
pub mod parser;
pub mod simulator;
