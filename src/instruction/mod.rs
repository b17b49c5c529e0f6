//!
//! The instruction set: one [`Instruction`] variant per mnemonic, each carrying the fields of
//! its format. The table at the bottom of this file is the single source of truth for
//! mnemonics, opcodes and syntax classes; [`Catalog`] indexes it for the assembler and the
//! decoder, and [`Instruction::execute`](execute) implements the semantics.
//!

pub mod catalog;
pub mod execute;
pub mod word;

pub use catalog::{Catalog, DecodeError, Format, Syntax};
pub use execute::Context;
pub use word::Word;

use std::fmt;

/// Primary opcode shared by every R-format instruction
pub const OPCODE_R: u32 = 0x3a;

/// Register index that `call`, `callr` and `ret` use implicitly
pub const RETURN_ADDRESS: u8 = 31;

/// Register index of the stack pointer, by convention
pub const STACK_POINTER: u8 = 27;

/// rB, rA, imm16
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IType {
    pub a: u8,
    pub b: u8,
    pub imm: u16,
}

impl IType {
    /// Immediate, sign-extended
    pub fn simm(&self) -> i32 {
        self.imm as i16 as i32
    }

    /// Immediate, zero-extended
    pub fn uimm(&self) -> u32 {
        self.imm as u32
    }
}

/// rC, rA, rB, imm5
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RType {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub imm5: u8,
}

/// imm26, a word index
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JType {
    pub imm: u32,
}

impl JType {
    /// Absolute byte address this instruction targets, within the 256MB segment of `pc`
    pub fn target(&self, pc: u32) -> u32 {
        (pc & 0xf000_0000) | (self.imm << 2)
    }
}

/// Slices a format's fields out of a word, and packs them back in
pub trait Fields: Sized {
    fn decode(word: Word) -> Self;
    fn encode(&self, word: &mut Word);
}

impl Fields for IType {
    fn decode(word: Word) -> Self {
        Self {
            a: word.a() as u8,
            b: word.b() as u8,
            imm: word.imm16() as u16,
        }
    }

    fn encode(&self, word: &mut Word) {
        word.set_a(self.a as u32);
        word.set_b(self.b as u32);
        word.set_imm16(self.imm as u32);
    }
}

impl Fields for RType {
    fn decode(word: Word) -> Self {
        Self {
            a: word.a() as u8,
            b: word.b() as u8,
            c: word.c() as u8,
            imm5: word.imm5() as u8,
        }
    }

    fn encode(&self, word: &mut Word) {
        word.set_a(self.a as u32);
        word.set_b(self.b as u32);
        word.set_c(self.c as u32);
        word.set_imm5(self.imm5 as u32);
    }
}

impl Fields for JType {
    fn decode(word: Word) -> Self {
        Self { imm: word.imm26() }
    }

    fn encode(&self, word: &mut Word) {
        word.set_imm26(self.imm);
    }
}

macro_rules! fields {
    (I) => {
        IType
    };
    (R) => {
        RType
    };
    (J) => {
        JType
    };
}

macro_rules! instruction_set {
    ($( $variant:ident: $mnemonic:literal, $format:ident, op: $op:expr, opx: $opx:expr, $syntax:ident; )*) => {
        /// Identifies an instruction without its operands
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $( $variant, )*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$variant, )* ];

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $mnemonic, )*
                }
            }

            pub fn format(self) -> Format {
                match self {
                    $( Opcode::$variant => Format::$format, )*
                }
            }

            pub fn op(self) -> u32 {
                match self {
                    $( Opcode::$variant => $op, )*
                }
            }

            /// Extended opcode, only meaningful for R-format instructions
            pub fn opx(self) -> u32 {
                match self {
                    $( Opcode::$variant => $opx, )*
                }
            }

            pub fn syntax(self) -> Syntax {
                match self {
                    $( Opcode::$variant => Syntax::$syntax, )*
                }
            }
        }

        /// Giant enum that represents a single decoded instruction and its operands
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Instruction {
            $( $variant(fields!($format)), )*
        }

        impl Instruction {
            pub fn opcode(&self) -> Opcode {
                match self {
                    $( Instruction::$variant(_) => Opcode::$variant, )*
                }
            }

            pub(crate) fn from_word(opcode: Opcode, word: Word) -> Self {
                match opcode {
                    $( Opcode::$variant => Instruction::$variant(Fields::decode(word)), )*
                }
            }

            /// Packs this instruction into its 32-bit machine word
            pub fn encode(&self) -> u32 {
                let opcode = self.opcode();
                let mut word = Word::default();
                word.set_op(opcode.op());
                if opcode.format() == Format::R {
                    word.set_opx(opcode.opx());
                }
                match self {
                    $( Instruction::$variant(f) => f.encode(&mut word), )*
                }
                word.raw()
            }
        }
    };
}

instruction_set! {
    // J-format
    Call:    "call",    J, op: 0x00, opx: 0, Target;
    Jmpi:    "jmpi",    J, op: 0x01, opx: 0, Target;

    // I-format -- arithmetic and logic
    Addi:    "addi",    I, op: 0x04, opx: 0, Default;
    Andi:    "andi",    I, op: 0x0c, opx: 0, Default;
    Ori:     "ori",     I, op: 0x14, opx: 0, Default;
    Xori:    "xori",    I, op: 0x1c, opx: 0, Default;
    Andhi:   "andhi",   I, op: 0x2c, opx: 0, Default;
    Orhi:    "orhi",    I, op: 0x34, opx: 0, Default;
    Xorhi:   "xorhi",   I, op: 0x3c, opx: 0, Default;
    Muli:    "muli",    I, op: 0x24, opx: 0, Default;

    // I-format -- comparisons
    Cmpeqi:  "cmpeqi",  I, op: 0x20, opx: 0, Default;
    Cmpnei:  "cmpnei",  I, op: 0x18, opx: 0, Default;
    Cmplti:  "cmplti",  I, op: 0x10, opx: 0, Default;
    Cmpgei:  "cmpgei",  I, op: 0x08, opx: 0, Default;
    Cmpltui: "cmpltui", I, op: 0x30, opx: 0, Default;
    Cmpgeui: "cmpgeui", I, op: 0x28, opx: 0, Default;

    // I-format -- loads and stores
    Ldb:     "ldb",     I, op: 0x07, opx: 0, Memory;
    Ldbu:    "ldbu",    I, op: 0x03, opx: 0, Memory;
    Ldh:     "ldh",     I, op: 0x0f, opx: 0, Memory;
    Ldhu:    "ldhu",    I, op: 0x0b, opx: 0, Memory;
    Ldw:     "ldw",     I, op: 0x17, opx: 0, Memory;
    Stb:     "stb",     I, op: 0x05, opx: 0, Memory;
    Sth:     "sth",     I, op: 0x0d, opx: 0, Memory;
    Stw:     "stw",     I, op: 0x15, opx: 0, Memory;
    Ldbio:   "ldbio",   I, op: 0x27, opx: 0, Memory;
    Ldbuio:  "ldbuio",  I, op: 0x23, opx: 0, Memory;
    Ldhio:   "ldhio",   I, op: 0x2f, opx: 0, Memory;
    Ldhuio:  "ldhuio",  I, op: 0x2b, opx: 0, Memory;
    Ldwio:   "ldwio",   I, op: 0x37, opx: 0, Memory;
    Stbio:   "stbio",   I, op: 0x25, opx: 0, Memory;
    Sthio:   "sthio",   I, op: 0x2d, opx: 0, Memory;
    Stwio:   "stwio",   I, op: 0x35, opx: 0, Memory;

    // I-format -- branches
    Br:      "br",      I, op: 0x06, opx: 0, BranchLabel;
    Beq:     "beq",     I, op: 0x26, opx: 0, Branch;
    Bne:     "bne",     I, op: 0x1e, opx: 0, Branch;
    Blt:     "blt",     I, op: 0x16, opx: 0, Branch;
    Bge:     "bge",     I, op: 0x0e, opx: 0, Branch;
    Bltu:    "bltu",    I, op: 0x36, opx: 0, Branch;
    Bgeu:    "bgeu",    I, op: 0x2e, opx: 0, Branch;

    // R-format -- arithmetic and logic
    Add:     "add",     R, op: OPCODE_R, opx: 0x31, Default;
    Sub:     "sub",     R, op: OPCODE_R, opx: 0x39, Default;
    And:     "and",     R, op: OPCODE_R, opx: 0x0e, Default;
    Or:      "or",      R, op: OPCODE_R, opx: 0x16, Default;
    Xor:     "xor",     R, op: OPCODE_R, opx: 0x1e, Default;
    Nor:     "nor",     R, op: OPCODE_R, opx: 0x06, Default;
    Mul:     "mul",     R, op: OPCODE_R, opx: 0x27, Default;
    Mulxss:  "mulxss",  R, op: OPCODE_R, opx: 0x1f, Default;
    Mulxsu:  "mulxsu",  R, op: OPCODE_R, opx: 0x17, Default;
    Mulxuu:  "mulxuu",  R, op: OPCODE_R, opx: 0x07, Default;
    Div:     "div",     R, op: OPCODE_R, opx: 0x25, Default;
    Divu:    "divu",    R, op: OPCODE_R, opx: 0x24, Default;

    // R-format -- comparisons
    Cmpeq:   "cmpeq",   R, op: OPCODE_R, opx: 0x20, Default;
    Cmpne:   "cmpne",   R, op: OPCODE_R, opx: 0x18, Default;
    Cmplt:   "cmplt",   R, op: OPCODE_R, opx: 0x10, Default;
    Cmpge:   "cmpge",   R, op: OPCODE_R, opx: 0x08, Default;
    Cmpltu:  "cmpltu",  R, op: OPCODE_R, opx: 0x30, Default;
    Cmpgeu:  "cmpgeu",  R, op: OPCODE_R, opx: 0x28, Default;

    // R-format -- shifts and rotates
    Sll:     "sll",     R, op: OPCODE_R, opx: 0x13, Default;
    Srl:     "srl",     R, op: OPCODE_R, opx: 0x1b, Default;
    Sra:     "sra",     R, op: OPCODE_R, opx: 0x3b, Default;
    Rol:     "rol",     R, op: OPCODE_R, opx: 0x03, Default;
    Ror:     "ror",     R, op: OPCODE_R, opx: 0x0b, Default;
    Slli:    "slli",    R, op: OPCODE_R, opx: 0x12, ShiftImmediate;
    Srli:    "srli",    R, op: OPCODE_R, opx: 0x1a, ShiftImmediate;
    Srai:    "srai",    R, op: OPCODE_R, opx: 0x3a, ShiftImmediate;
    Roli:    "roli",    R, op: OPCODE_R, opx: 0x02, ShiftImmediate;

    // R-format -- control flow
    Jmp:     "jmp",     R, op: OPCODE_R, opx: 0x0d, Register;
    Callr:   "callr",   R, op: OPCODE_R, opx: 0x1d, Register;
    Ret:     "ret",     R, op: OPCODE_R, opx: 0x05, NoOperand;
    Nextpc:  "nextpc",  R, op: OPCODE_R, opx: 0x1c, Destination;
}

impl Opcode {
    /// Whether the 16-bit immediate of an I-format instruction is sign-extended.
    /// Logical operations and unsigned comparisons zero-extend instead.
    pub fn signed_immediate(self) -> bool {
        use Opcode::*;
        !matches!(
            self,
            Andi | Ori | Xori | Andhi | Orhi | Xorhi | Cmpltui | Cmpgeui
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opcode = self.opcode();
        let word = Word::new(self.encode());
        let m = opcode.mnemonic();

        match opcode.format() {
            Format::I => {
                let i = IType::decode(word);
                let imm: i64 = if opcode.signed_immediate() {
                    i.simm() as i64
                } else {
                    i.uimm() as i64
                };
                match opcode.syntax() {
                    Syntax::Branch => write!(f, "{m} r{}, r{}, {imm}", i.a, i.b),
                    Syntax::BranchLabel => write!(f, "{m} {imm}"),
                    Syntax::Memory => write!(f, "{m} r{}, {imm}(r{})", i.b, i.a),
                    _ => write!(f, "{m} r{}, r{}, {imm}", i.b, i.a),
                }
            }
            Format::R => {
                let r = RType::decode(word);
                match opcode.syntax() {
                    Syntax::ShiftImmediate => write!(f, "{m} r{}, r{}, {}", r.c, r.a, r.imm5),
                    Syntax::Register => write!(f, "{m} r{}", r.a),
                    Syntax::Destination => write!(f, "{m} r{}", r.c),
                    Syntax::NoOperand => write!(f, "{m}"),
                    _ => write!(f, "{m} r{}, r{}, r{}", r.c, r.a, r.b),
                }
            }
            Format::J => {
                let j = JType::decode(word);
                write!(f, "{m} {:#x}", j.imm << 2)
            }
        }
    }
}
