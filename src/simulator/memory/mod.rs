//!
//! Byte-addressable memory, assembled from blocks. A block is either plain RAM or a
//! memory-mapped [`Device`]; addresses outside every block are unmapped. Wider accesses are
//! composed from little-endian byte accesses.
//!

use super::devices::{Buttons, Device, IoPanel, Leds, Switches, Uart};
use super::error::{MemoryError, MemoryErrorKind};
use super::events::{Event, EventBus};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::ops::RangeInclusive;

pub mod consts;
pub use consts::*;

pub enum Backing {
    Ram(Vec<u8>),
    Device(Box<dyn Device>),
}

/// A contiguous range of addresses and whatever answers for it
pub struct Block {
    name: String,
    start: u32,
    len: u32,
    backing: Backing,
}

impl Block {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.start..=self.start + (self.len - 1)
    }

    pub fn is_device(&self) -> bool {
        matches!(self.backing, Backing::Device(_))
    }

    #[inline]
    fn contains(&self, address: u32) -> bool {
        address.wrapping_sub(self.start) < self.len
    }

    fn overlaps(&self, other: &Block) -> bool {
        self.contains(other.start) || other.contains(self.start)
    }

    fn peek(&self, offset: u32) -> u8 {
        match &self.backing {
            Backing::Ram(bytes) => bytes[offset as usize],
            Backing::Device(device) => device.peek(offset),
        }
    }

    /// Current contents, read without side effects
    pub fn contents(&self) -> Vec<u8> {
        match &self.backing {
            Backing::Ram(bytes) => bytes.clone(),
            Backing::Device(device) => (0..self.len).map(|i| device.peek(i)).collect(),
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("start", &format_args!("{:#010x}", self.start))
            .field("len", &format_args!("{:#x}", self.len))
            .field("device", &self.is_device())
            .finish()
    }
}

#[derive(Debug)]
pub struct Memory {
    blocks: Vec<Block>,
    bus: EventBus,

    /// Publish an [`Event::MemoryChanged`] for every byte of RAM written
    notify_writes: bool,
}

impl Memory {
    /// Memory with no blocks at all
    pub fn new(bus: EventBus) -> Self {
        Self {
            blocks: Vec::new(),
            bus,
            notify_writes: false,
        }
    }

    /// The board's layout: program RAM, LEDs, switches, buttons and a UART. Returns the panel
    /// that drives the inputs.
    pub fn standard(bus: EventBus) -> (Self, IoPanel) {
        let switches = Switches::new();
        let buttons = Buttons::new();
        let uart = Uart::new(bus.clone());
        let panel = IoPanel::new(switches.clone(), buttons.clone(), uart.clone());

        let mut memory = Self::new(bus.clone());
        memory.blocks = vec![
            Block {
                name: "ram".into(),
                start: RAM_START,
                len: RAM_SIZE,
                backing: Backing::Ram(vec![0; RAM_SIZE as usize]),
            },
            Self::device_block("leds", LEDS_START, Leds::new(bus)),
            Self::device_block("switches", SWITCHES_START, switches),
            Self::device_block("buttons", BUTTONS_START, buttons),
            Self::device_block("uart", UART_START, uart),
        ];

        (memory, panel)
    }

    fn device_block(name: &str, start: u32, device: impl Device + 'static) -> Block {
        Block {
            name: name.into(),
            start,
            len: DEVICE_SIZE,
            backing: Backing::Device(Box::new(device)),
        }
    }

    pub fn add_ram(&mut self, name: &str, start: u32, len: u32) -> Result<(), MemoryError> {
        self.add(Block {
            name: name.into(),
            start,
            len,
            backing: Backing::Ram(vec![0; len as usize]),
        })
    }

    pub fn add_device(
        &mut self,
        name: &str,
        start: u32,
        len: u32,
        device: impl Device + 'static,
    ) -> Result<(), MemoryError> {
        self.add(Block {
            name: name.into(),
            start,
            len,
            backing: Backing::Device(Box::new(device)),
        })
    }

    fn add(&mut self, block: Block) -> Result<(), MemoryError> {
        if block.len == 0 || block.start.checked_add(block.len - 1).is_none() {
            return Err(MemoryError {
                address: block.start,
                kind: MemoryErrorKind::TooLarge,
            });
        }

        if self.blocks.iter().any(|b| b.overlaps(&block)) {
            return Err(MemoryError {
                address: block.start,
                kind: MemoryErrorKind::Overlap,
            });
        }

        tracing::debug!(name = %block.name, start = block.start, len = block.len, "Mapped block");
        self.blocks.push(block);
        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn set_notify_writes(&mut self, notify: bool) {
        self.notify_writes = notify;
    }

    /// Block index and offset of `address`
    #[inline]
    fn locate(&self, address: u32) -> Result<(usize, u32), MemoryError> {
        self.blocks
            .iter()
            .position(|b| b.contains(address))
            .map(|i| (i, address - self.blocks[i].start))
            .ok_or(MemoryError::unmapped(address))
    }

    /// Checks that every byte in `address..address+n` is mapped
    fn check_mapped(&self, address: u32, n: u32) -> Result<(), MemoryError> {
        (0..n).try_for_each(|i| self.locate(address.wrapping_add(i)).map(|_| ()))
    }

    /// Checks that every byte in `address..address+n` is mapped and accepts stores
    fn check_writable(&self, address: u32, n: u32) -> Result<(), MemoryError> {
        (0..n).try_for_each(|i| {
            let address = address.wrapping_add(i);
            let (block, offset) = self.locate(address)?;
            match &self.blocks[block].backing {
                Backing::Device(device) if !device.writable(offset) => {
                    Err(MemoryError::read_only(address))
                }
                _ => Ok(()),
            }
        })
    }

    pub fn read_byte(&mut self, address: u32) -> Result<u8, MemoryError> {
        let (block, offset) = self.locate(address)?;
        Ok(match &mut self.blocks[block].backing {
            Backing::Ram(bytes) => bytes[offset as usize],
            Backing::Device(device) => device.read(offset),
        })
    }

    fn read_bytes<const N: usize>(&mut self, address: u32) -> Result<[u8; N], MemoryError> {
        // device reads have side effects, so don't start unless all of them will succeed
        self.check_mapped(address, N as u32)?;
        let mut buf = [0; N];
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_byte(address.wrapping_add(i as u32))?;
        }
        Ok(buf)
    }

    pub fn read_half(&mut self, address: u32) -> Result<u16, MemoryError> {
        self.read_bytes::<2>(address)
            .map(|b| LittleEndian::read_u16(&b))
    }

    pub fn read_word(&mut self, address: u32) -> Result<u32, MemoryError> {
        self.read_bytes::<4>(address)
            .map(|b| LittleEndian::read_u32(&b))
    }

    pub fn peek_byte(&self, address: u32) -> Result<u8, MemoryError> {
        let (block, offset) = self.locate(address)?;
        Ok(self.blocks[block].peek(offset))
    }

    fn peek_bytes<const N: usize>(&self, address: u32) -> Result<[u8; N], MemoryError> {
        let mut buf = [0; N];
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.peek_byte(address.wrapping_add(i as u32))?;
        }
        Ok(buf)
    }

    pub fn peek_half(&self, address: u32) -> Result<u16, MemoryError> {
        self.peek_bytes::<2>(address)
            .map(|b| LittleEndian::read_u16(&b))
    }

    pub fn peek_word(&self, address: u32) -> Result<u32, MemoryError> {
        self.peek_bytes::<4>(address)
            .map(|b| LittleEndian::read_u32(&b))
    }

    /// Stores a byte that is known to be writable
    fn store(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        let (block, offset) = self.locate(address)?;
        match &mut self.blocks[block].backing {
            Backing::Ram(bytes) => {
                bytes[offset as usize] = value;
                if self.notify_writes {
                    self.bus.publish(Event::MemoryChanged { address, value });
                }
            }
            Backing::Device(device) => device.write(offset, value),
        }
        Ok(())
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        self.check_writable(address, bytes.len() as u32)?;
        for (i, &byte) in bytes.iter().enumerate() {
            self.store(address.wrapping_add(i as u32), byte)?;
        }
        Ok(())
    }

    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        self.write_bytes(address, &[value])
    }

    pub fn write_half(&mut self, address: u32, value: u16) -> Result<(), MemoryError> {
        let mut buf = [0; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.write_bytes(address, &buf)
    }

    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        let mut buf = [0; 4];
        LittleEndian::write_u32(&mut buf, value);
        self.write_bytes(address, &buf)
    }

    /// Copies a program image into the RAM block containing `start`. The whole image has to
    /// fit in that one block.
    pub fn load_image(&mut self, start: u32, image: &[u8]) -> Result<(), MemoryError> {
        let (block, offset) = self.locate(start)?;
        let too_large = MemoryError {
            address: start,
            kind: MemoryErrorKind::TooLarge,
        };

        match &mut self.blocks[block].backing {
            Backing::Ram(bytes) => {
                let offset = offset as usize;
                let end = offset.checked_add(image.len()).ok_or(too_large)?;
                bytes
                    .get_mut(offset..end)
                    .ok_or(too_large)?
                    .copy_from_slice(image);
                Ok(())
            }
            Backing::Device(_) => Err(MemoryError::read_only(start)),
        }
    }

    /// Zeroes every RAM block and resets every device
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            match &mut block.backing {
                Backing::Ram(bytes) => bytes.fill(0),
                Backing::Device(device) => device.reset(),
            }
        }
    }
}
