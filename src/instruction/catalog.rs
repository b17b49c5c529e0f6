use super::{Instruction, Opcode, Word};
use hashbrown::HashMap;
use thiserror::Error;

/// Bit layout of an instruction word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    I,
    R,
    J,
}

/// How an instruction's operands are written in source code (and rendered back)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `rC, rA, rB` for R-format, `rB, rA, imm` for I-format
    Default,
    /// `rA, rB, label`
    Branch,
    /// `label`
    BranchLabel,
    /// `rB, imm(rA)`
    Memory,
    /// `rA`
    Register,
    /// `rC, rA, imm5`
    ShiftImmediate,
    /// `rC`
    Destination,
    /// `label`, assembled into an absolute word address
    Target,
    NoOperand,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Word {0:#010x} is not a valid instruction")]
pub struct DecodeError(pub u32);

/// Immutable index over the instruction table, by mnemonic (for the assembler) and by
/// opcode key (for the decoder). Build it once and share it by reference.
#[derive(Debug, Clone)]
pub struct Catalog {
    by_mnemonic: HashMap<&'static str, Opcode>,
    by_key: HashMap<u32, Opcode>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        let mut by_mnemonic = HashMap::with_capacity(Opcode::ALL.len());
        let mut by_key = HashMap::with_capacity(Opcode::ALL.len());

        for &opcode in Opcode::ALL {
            let mut word = Word::default();
            word.set_op(opcode.op());
            if opcode.format() == Format::R {
                word.set_opx(opcode.opx());
            }

            by_mnemonic.insert(opcode.mnemonic(), opcode);
            by_key.insert(word.key(), opcode);
        }

        Self {
            by_mnemonic,
            by_key,
        }
    }

    /// Case-insensitive lookup by mnemonic
    pub fn lookup(&self, mnemonic: &str) -> Option<Opcode> {
        match self.by_mnemonic.get(mnemonic) {
            Some(&opcode) => Some(opcode),
            None => self
                .by_mnemonic
                .get(mnemonic.to_ascii_lowercase().as_str())
                .copied(),
        }
    }

    pub fn decode(&self, word: u32) -> Result<Instruction, DecodeError> {
        let w = Word::new(word);
        self.by_key
            .get(&w.key())
            .map(|&opcode| Instruction::from_word(opcode, w))
            .ok_or(DecodeError(word))
    }

    pub fn len(&self) -> usize {
        self.by_mnemonic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mnemonic.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{IType, RType};

    #[test]
    fn test_lookup() {
        let catalog = Catalog::new();
        assert_eq!(catalog.lookup("addi"), Some(Opcode::Addi));
        assert_eq!(catalog.lookup("ADDI"), Some(Opcode::Addi));
        assert_eq!(catalog.lookup("LdWiO"), Some(Opcode::Ldwio));
        assert_eq!(catalog.lookup("movia"), None);
        assert_eq!(catalog.len(), Opcode::ALL.len());
    }

    #[test]
    fn test_decode() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.decode(0x2147883a),
            Ok(Instruction::Add(RType { a: 4, b: 5, c: 3, imm5: 0 }))
        );
        assert_eq!(
            catalog.decode(0x00800144),
            Ok(Instruction::Addi(IType { a: 0, b: 2, imm: 5 }))
        );
    }

    #[test]
    fn test_decode_error() {
        let catalog = Catalog::new();
        // op 0x02 is unassigned
        assert_eq!(catalog.decode(0x0000_0002), Err(DecodeError(0x0000_0002)));
        // R-format with opx 0x00 is unassigned
        assert_eq!(catalog.decode(0x0000_003a), Err(DecodeError(0x0000_003a)));
    }

    #[test]
    fn test_every_entry_decodes_to_itself() {
        let catalog = Catalog::new();
        for &opcode in Opcode::ALL {
            let word = Instruction::from_word(opcode, Word::new(0xffff_ffc0)).encode();
            let decoded = catalog.decode(word).map(|i| i.opcode());
            assert_eq!(decoded, Ok(opcode), "{}", opcode);
        }
    }
}
