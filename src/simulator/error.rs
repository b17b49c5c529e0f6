use crate::instruction::DecodeError;
use owo_colors::OwoColorize;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Register r{} is disabled", .0.bright_blue())]
pub struct RegisterError(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryErrorKind {
    /// No registered block contains the address
    Unmapped,
    /// The block at the address does not accept writes
    ReadOnly,
    /// A block was registered on top of another one
    Overlap,
    /// A program image does not fit in its block
    TooLarge,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{} at address {}", describe(.kind), format!("{:#010x}", .address).bright_yellow())]
pub struct MemoryError {
    pub address: u32,
    pub kind: MemoryErrorKind,
}

fn describe(kind: &MemoryErrorKind) -> &'static str {
    match kind {
        MemoryErrorKind::Unmapped => "Access to unmapped memory",
        MemoryErrorKind::ReadOnly => "Write to read-only device",
        MemoryErrorKind::Overlap => "Memory block overlaps another block",
        MemoryErrorKind::TooLarge => "Program image does not fit in memory",
    }
}

impl MemoryError {
    pub fn unmapped(address: u32) -> Self {
        Self {
            address,
            kind: MemoryErrorKind::Unmapped,
        }
    }

    pub fn read_only(address: u32) -> Self {
        Self {
            address,
            kind: MemoryErrorKind::ReadOnly,
        }
    }
}

/// Anything that can stop an instruction from completing
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Register(#[from] RegisterError),

    #[error("{0}")]
    Memory(#[from] MemoryError),

    #[error("Program counter set to misaligned address {}", format!("{:#010x}", .0).bright_yellow())]
    MisalignedPc(u32),

    #[error("Division by zero")]
    DivisionByZero,
}

/// A [`Fault`] together with the address of the instruction that raised it
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{} {}: {fault}", "fault at pc".bright_red().bold(), format!("{:#010x}", .pc).bright_blue())]
pub struct EmulatorError {
    pub pc: u32,
    #[source]
    pub fault: Fault,
}
