//!
//! Runs an assembled program instruction by instruction.
//!
//! The [`Simulator`] owns the registers, the memory (with its devices) and the program counter.
//! It fetches the word at PC, decodes it through the [`Catalog`], executes it and moves on to
//! the next word. The all-zero word halts. State changes are published on an [`EventBus`];
//! device inputs come in through an [`IoPanel`] that can be cloned into other threads.
//!

use crate::instruction::{Catalog, Context, Instruction, STACK_POINTER};
use crate::parser::Program;
use owo_colors::OwoColorize;

pub mod devices;
pub mod error;
pub mod events;
pub mod into_register;
pub mod memory;
pub mod registers;

pub use devices::IoPanel;
pub use error::{EmulatorError, Fault, MemoryError, RegisterError};
pub use events::{Event, EventBus};
use into_register::FromRegister;
use memory::*;
pub use registers::{RegisterFile, Tag};

/// Initial stack pointer: one past the last byte of program RAM
pub const STACK_TOP: u32 = RAM_START + RAM_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Nothing loaded yet
    Idle,
    /// A program is loaded and no instruction has run since
    Loaded,
    Running,
    Halted,
}

/// Why [`Simulator::run_with_limit`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Halted,
    LimitReached,
}

/// What [`Simulator::reset`] goes back to
#[derive(Debug, Clone)]
struct Snapshot {
    image: Vec<u8>,
    start: u32,
    entry: u32,
}

/// Simulates the processor and its board. Usually created with [`Simulator::new`], given a
/// program with [`load`](Simulator::load) and driven by [`step`](Simulator::step) or
/// [`run`](Simulator::run).
pub struct Simulator {
    registers: RegisterFile,
    pc: u32,
    state: SimState,
    steps: u64,

    catalog: Catalog,
    bus: EventBus,
    panel: IoPanel,
    snapshot: Option<Snapshot>,

    pub memory: Memory,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// A simulator with the standard board layout
    pub fn new() -> Self {
        let bus = EventBus::new();
        let (memory, panel) = Memory::standard(bus.clone());
        Self {
            registers: RegisterFile::new(),
            pc: 0,
            state: SimState::Idle,
            steps: 0,
            catalog: Catalog::new(),
            bus,
            panel,
            snapshot: None,
            memory,
        }
    }

    /// Loads `program` and points PC at its start
    pub fn load(&mut self, program: &Program) -> Result<(), EmulatorError> {
        self.load_with_entry(program, program.start())
    }

    /// Loads `program` and points PC at `entry`, e.g. an address from [`Program::global`]
    pub fn load_with_entry(&mut self, program: &Program, entry: u32) -> Result<(), EmulatorError> {
        if entry % 4 != 0 {
            return Err(EmulatorError {
                pc: entry,
                fault: Fault::MisalignedPc(entry),
            });
        }

        self.snapshot = Some(Snapshot {
            image: program.image().to_vec(),
            start: program.start(),
            entry,
        });
        self.restore()?;

        tracing::info!(
            entry,
            bytes = program.image().len(),
            "Program loaded"
        );
        Ok(())
    }

    /// Goes back to the state right after the last load. Without a loaded program, clears
    /// everything and returns to [`SimState::Idle`].
    pub fn reset(&mut self) -> Result<(), EmulatorError> {
        self.restore()?;
        tracing::debug!("Simulator reset");
        Ok(())
    }

    fn restore(&mut self) -> Result<(), EmulatorError> {
        self.registers.clear();
        self.memory.reset();
        self.steps = 0;

        let Some(snapshot) = &self.snapshot else {
            self.pc = 0;
            self.state = SimState::Idle;
            return Ok(());
        };

        self.memory
            .load_image(snapshot.start, &snapshot.image)
            .map_err(|e| EmulatorError {
                pc: snapshot.entry,
                fault: e.into(),
            })?;

        // a disabled stack pointer simply isn't initialised
        if self.registers.tag(STACK_POINTER) != Tag::Disabled {
            self.registers
                .set(STACK_POINTER, STACK_TOP)
                .map_err(|e| EmulatorError {
                    pc: snapshot.entry,
                    fault: e.into(),
                })?;
        }
        self.registers.reset_tags();

        self.pc = snapshot.entry;
        self.state = SimState::Loaded;
        Ok(())
    }

    /// Executes a single instruction. Returns `Ok(false)` once the program has halted.
    ///
    /// On failure the program counter, registers and memory are left as they were before the
    /// instruction.
    pub fn step(&mut self) -> Result<bool, EmulatorError> {
        if self.state == SimState::Halted {
            return Ok(false);
        }

        self.registers.reset_tags();

        let pc = self.pc;
        let fail = |fault: Fault| {
            tracing::warn!(pc, %fault, "Execution fault");
            EmulatorError { pc, fault }
        };

        let word = self.memory.read_word(pc).map_err(|e| fail(e.into()))?;
        if word == 0 {
            self.state = SimState::Halted;
            self.bus.publish(Event::Halted { steps: self.steps });
            tracing::info!(steps = self.steps, "Execution halted.");
            return Ok(false);
        }

        let instruction = self.catalog.decode(word).map_err(|e| fail(e.into()))?;
        tracing::trace!(pc, %instruction);

        if let Err(fault) = instruction.execute(self) {
            self.pc = pc;
            return Err(fail(fault));
        }

        self.pc = self.pc.wrapping_add(4);
        self.steps += 1;
        self.state = SimState::Running;
        self.bus.publish(Event::Pc(self.pc));
        Ok(true)
    }

    /// Steps until the program halts or faults
    pub fn run(&mut self) -> Result<(), EmulatorError> {
        while self.step()? {}
        Ok(())
    }

    /// Like [`run`](Simulator::run), but gives up after `limit` instructions
    pub fn run_with_limit(&mut self, limit: u64) -> Result<RunOutcome, EmulatorError> {
        if self.state == SimState::Halted {
            return Ok(RunOutcome::Halted);
        }
        for _ in 0..limit {
            if !self.step()? {
                return Ok(RunOutcome::Halted);
            }
        }
        tracing::debug!(limit, "Instruction limit reached");
        Ok(RunOutcome::LimitReached)
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    /// Instructions executed since the last load or reset
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    /// Value of a register, without marking it as read
    pub fn read_register(&self, i: u8) -> u32 {
        self.registers.peek(i)
    }

    /// Typed view of a register, e.g. `register::<i32>(2)`. Doesn't mark it as read.
    pub fn register<T: FromRegister>(&self, i: u8) -> T {
        T::from_register(self.registers.peek(i))
    }

    /// Memory contents at `address`, read without device side effects
    pub fn read_byte(&self, address: u32) -> Result<u8, MemoryError> {
        self.memory.peek_byte(address)
    }

    pub fn read_half(&self, address: u32) -> Result<u16, MemoryError> {
        self.memory.peek_half(address)
    }

    pub fn read_word(&self, address: u32) -> Result<u32, MemoryError> {
        self.memory.peek_word(address)
    }

    /// Decodes the word at `address`
    pub fn disassemble(&self, address: u32) -> Result<Instruction, Fault> {
        let word = self.memory.peek_word(address)?;
        Ok(self.catalog.decode(word)?)
    }

    pub fn subscribe(&self) -> crossbeam_channel::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// A handle to the board inputs that can be moved into another thread
    pub fn panel(&self) -> IoPanel {
        self.panel.clone()
    }

    pub fn toggle_switch(&self, index: u32) -> bool {
        self.panel.toggle_switch(index)
    }

    pub fn press_button(&self, index: u32) -> bool {
        self.panel.press_button(index)
    }

    pub fn release_button(&self, index: u32) -> bool {
        self.panel.release_button(index)
    }

    pub fn feed_serial_input(&self, c: u8) {
        self.panel.feed_serial_input(c)
    }

    pub fn print_state(&self) {
        eprintln!("{}", "Registers:".bright_blue());
        eprint!("{}", self.registers);
        eprintln!(
            "{} {:#010x}  {} {}",
            "pc:".bright_blue(),
            self.pc,
            "steps:".bright_blue(),
            self.steps
        );
    }
}

impl Context for Simulator {
    #[inline]
    fn pc(&self) -> u32 {
        self.pc
    }

    #[inline]
    fn set_pc(&mut self, pc: u32) -> Result<(), Fault> {
        if pc % 4 != 0 {
            return Err(Fault::MisalignedPc(pc));
        }
        self.pc = pc;
        Ok(())
    }

    #[inline]
    fn read_register(&mut self, index: u8) -> Result<u32, Fault> {
        Ok(self.registers.read(index)?)
    }

    #[inline]
    fn check_register(&self, index: u8) -> Result<(), Fault> {
        Ok(self.registers.check(index)?)
    }

    #[inline]
    fn write_register(&mut self, index: u8, value: u32) -> Result<(), Fault> {
        self.registers.write(index, value)?;
        self.bus.publish(Event::Register {
            index,
            value: self.registers.peek(index),
        });
        Ok(())
    }

    fn load_byte(&mut self, address: u32) -> Result<u8, Fault> {
        Ok(self.memory.read_byte(address)?)
    }

    fn load_half(&mut self, address: u32) -> Result<u16, Fault> {
        Ok(self.memory.read_half(address)?)
    }

    fn load_word(&mut self, address: u32) -> Result<u32, Fault> {
        Ok(self.memory.read_word(address)?)
    }

    fn store_byte(&mut self, address: u32, value: u8) -> Result<(), Fault> {
        Ok(self.memory.write_byte(address, value)?)
    }

    fn store_half(&mut self, address: u32, value: u16) -> Result<(), Fault> {
        Ok(self.memory.write_half(address, value)?)
    }

    fn store_word(&mut self, address: u32, value: u32) -> Result<(), Fault> {
        Ok(self.memory.write_word(address, value)?)
    }
}
