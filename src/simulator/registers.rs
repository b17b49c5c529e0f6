use super::error::RegisterError;
use super::into_register::{FromRegister, IntoRegister};
use owo_colors::OwoColorize;
use std::fmt;

pub const REGISTER_COUNT: usize = 32;

/// What happened to a register during the current step
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    #[default]
    Untouched,
    Read,
    Written,
    /// Not available to programs. Any access fails.
    Disabled,
}

/// General-purpose registers. `r0` always reads zero and ignores writes.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    values: [u32; REGISTER_COUNT],
    tags: [Tag; REGISTER_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            values: [0; REGISTER_COUNT],
            tags: [Tag::Untouched; REGISTER_COUNT],
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn index(&self, i: u8) -> Result<usize, RegisterError> {
        match self.tags.get(i as usize) {
            None | Some(Tag::Disabled) => Err(RegisterError(i)),
            Some(_) => Ok(i as usize),
        }
    }

    /// Fails exactly when [`read`](Self::read) and [`write`](Self::write) would, without
    /// touching the tags
    pub fn check(&self, i: u8) -> Result<(), RegisterError> {
        self.index(i).map(|_| ())
    }

    pub fn read(&mut self, i: u8) -> Result<u32, RegisterError> {
        let i = self.index(i)?;
        if self.tags[i] != Tag::Written {
            self.tags[i] = Tag::Read;
        }
        Ok(self.values[i])
    }

    pub fn write(&mut self, i: u8, value: u32) -> Result<(), RegisterError> {
        let i = self.index(i)?;
        self.tags[i] = Tag::Written;
        if i != 0 {
            self.values[i] = value;
        }
        Ok(())
    }

    /// Typed read, e.g. `get::<i32>(2)`
    pub fn get<T: FromRegister>(&mut self, i: u8) -> Result<T, RegisterError> {
        self.read(i).map(T::from_register)
    }

    pub fn set<T: IntoRegister>(&mut self, i: u8, x: T) -> Result<(), RegisterError> {
        self.write(i, x.into_register())
    }

    /// Value of register `i` without tagging it. Disabled and out-of-range registers read 0.
    pub fn peek(&self, i: u8) -> u32 {
        self.values.get(i as usize).copied().unwrap_or(0)
    }

    pub fn tag(&self, i: u8) -> Tag {
        self.tags.get(i as usize).copied().unwrap_or(Tag::Disabled)
    }

    /// Forgets the reads and writes of the previous step
    pub fn reset_tags(&mut self) {
        for tag in &mut self.tags {
            if *tag != Tag::Disabled {
                *tag = Tag::Untouched;
            }
        }
    }

    /// Zeroes every register. Disabled registers stay disabled.
    pub fn clear(&mut self) {
        self.values = [0; REGISTER_COUNT];
        self.reset_tags();
    }

    pub fn disable(&mut self, i: u8) {
        if let Some(tag) = self.tags.get_mut(i as usize) {
            *tag = Tag::Disabled;
            self.values[i as usize] = 0;
        }
    }

    pub fn enable(&mut self, i: u8) {
        if let Some(tag) = self.tags.get_mut(i as usize) {
            if *tag == Tag::Disabled {
                *tag = Tag::Untouched;
            }
        }
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..REGISTER_COUNT {
            let name = format!("r{:02}", i);
            let value = format!("{:08x}", self.values[i]);
            match self.tags[i] {
                Tag::Written => write!(f, "{}: {} ", name.bright_blue(), value.bright_yellow())?,
                Tag::Disabled => write!(f, "{}: {} ", name.dimmed(), "--------".dimmed())?,
                _ => write!(f, "{}: {} ", name.bright_blue(), value)?,
            }
            if i % 4 == 3 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
