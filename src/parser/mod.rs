//!
//! Assembles Nios-style source into a [`Program`] image the simulator can load.
//!
//! Assembly takes two passes. The first walks the source line by line: it substitutes
//! `.equ` constants, records labels and macros, expands macro invocations, and turns every
//! instruction into a pending instruction whose immediate is still plain text. Code labels
//! get their address right away; data labels wait until the data region is laid out. The
//! second pass (linking) places the data after the code, evaluates every pending
//! immediate against the finished symbol table and serializes the image.
//!
//! ```
//! let program = niosim::parser::assemble("addi r2, r0, 5\n").unwrap();
//! assert_eq!(program.len(), 1);
//! ```
//!

pub mod combinators;
mod data;
pub mod error;
pub mod expression;
pub mod macros;
pub mod register_names;

use crate::instruction::{Catalog, Format, Opcode, Syntax, Word, RETURN_ADDRESS};
use crate::simulator::memory::RAM_START;
use byteorder::{ByteOrder, LittleEndian};
use combinators::*;
use data::{DataItem, Variable};
pub use error::{CompileError, Contextualize, Error};
use error::{MacroError, ParserError};
pub use expression::{evaluate, Symbols};
use hashbrown::{HashMap, HashSet};
use macros::Macros;
use register_names::{RegMap, TryGetRegister};
use std::borrow::Cow;

/// How many macro expansions may be nested inside each other
pub const MAX_MACRO_DEPTH: usize = 16;

/// An assembled program: little-endian instruction words, a zero word, then the data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    image: Vec<u8>,
    start: u32,
    symbols: Symbols,
    /// `.global` names and the line that declared them
    globals: HashMap<String, usize>,
    /// Source line of each instruction, in address order
    lines: Vec<usize>,
}

impl Program {
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Address of the first instruction
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Address right after the reserved zero word, where data begins
    pub fn data_start(&self) -> u32 {
        self.start + self.lines.len() as u32 * 4 + 4
    }

    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    pub fn symbol(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    /// Address of a label declared with `.global`
    pub fn global(&self, name: &str) -> Result<u32, CompileError> {
        let Some(&line) = self.globals.get(name) else {
            return Err(ParserError::NotGlobal(name.to_owned()).at_line(0));
        };
        self.symbol(name)
            .ok_or_else(|| ParserError::UndefinedSymbol(name.to_owned()).at_line(line))
    }

    /// Address of the first instruction assembled from source line `line`
    pub fn address_of_line(&self, line: usize) -> Option<u32> {
        self.lines
            .iter()
            .position(|&l| l == line)
            .map(|i| self.start + i as u32 * 4)
    }

    /// Source line of the instruction at `address`
    pub fn line_of_address(&self, address: u32) -> Option<usize> {
        let offset = address.checked_sub(self.start)?;
        if offset % 4 != 0 {
            return None;
        }
        self.lines.get(offset as usize / 4).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Text,
    Data,
}

/// An instruction whose immediate may still name labels
#[derive(Debug, Clone)]
struct PendingInstruction {
    opcode: Opcode,
    a: u8,
    b: u8,
    c: u8,
    expr: Option<String>,
    line: usize,
    address: u32,
}

impl PendingInstruction {
    fn new(opcode: Opcode, line: usize, address: u32) -> Self {
        Self {
            opcode,
            a: 0,
            b: 0,
            c: 0,
            expr: None,
            line,
            address,
        }
    }

    /// Evaluates the immediate and packs the machine word. Immediates that don't fit their
    /// field are truncated.
    fn link(&self, symbols: &Symbols) -> Result<u32, CompileError> {
        let value = match &self.expr {
            Some(expr) => evaluate(expr, Some(symbols)).map_err(|e| e.at_line(self.line))?,
            None => 0,
        };

        let opcode = self.opcode;
        let mut word = Word::default();
        word.set_op(opcode.op());

        match opcode.format() {
            Format::I => {
                let imm = match opcode.syntax() {
                    Syntax::Branch | Syntax::BranchLabel => {
                        value.wrapping_sub(self.address as i64 + 4)
                    }
                    _ => value,
                };
                word.set_a(self.a as u32);
                word.set_b(self.b as u32);
                word.set_imm16(imm as u32 & 0xffff);
            }
            Format::R => {
                word.set_opx(opcode.opx());
                word.set_a(self.a as u32);
                word.set_b(self.b as u32);
                word.set_c(self.c as u32);
                word.set_imm5(value as u32 & 0x1f);
            }
            Format::J => {
                word.set_imm26((value as u32 >> 2) & 0x03ff_ffff);
            }
        }

        Ok(word.raw())
    }
}

/// A `.macro` whose body is still being read
struct Recording {
    name: String,
    params: Vec<String>,
    body: Vec<String>,
    line: usize,
}

/// Everything the first pass accumulates
struct ParserContext<'a> {
    catalog: &'a Catalog,
    regs: RegMap,
    macros: Macros,
    start: u32,

    section: Section,
    code: Vec<PendingInstruction>,
    variables: Vec<Variable>,
    /// Data labels waiting for the next data directive
    pending_labels: Vec<String>,
    defined: HashSet<String>,
    symbols: Symbols,
    constants: HashMap<String, String>,
    globals: HashMap<String, usize>,

    recording: Option<Recording>,
    ended: bool,
}

impl<'a> ParserContext<'a> {
    fn new(catalog: &'a Catalog, start: u32) -> Self {
        Self {
            catalog,
            regs: register_names::regs(),
            macros: Macros::new(),
            start,
            section: Section::Text,
            code: Vec::new(),
            variables: Vec::new(),
            pending_labels: Vec::new(),
            defined: HashSet::new(),
            symbols: Symbols::new(),
            constants: HashMap::new(),
            globals: HashMap::new(),
            recording: None,
            ended: false,
        }
    }

    fn substitute_constants(&self, text: &str) -> String {
        if self.constants.is_empty() {
            return text.to_owned();
        }
        replace_identifiers(text, |name| {
            self.constants
                .get(name)
                .map(|value| Cow::Borrowed(value.as_str()))
        })
    }

    fn physical_line(&mut self, raw: &str, line: usize) -> Result<(), CompileError> {
        let text = strip_comment(raw).trim();

        if self.recording.is_some() {
            if end_macro(text) {
                return self.finish_macro();
            }
            let body_line = self.substitute_constants(text);
            if let Some(recording) = &mut self.recording {
                recording.body.push(body_line);
            }
            return Ok(());
        }

        // the name of a constant being redefined must not be substituted
        if let Some(rest) = equ_directive(text) {
            return self.define_constant(rest, true).map_err(|e| e.at_line(line));
        }

        let text = self.substitute_constants(text);
        self.statement(&text, line, 0)
    }

    fn statement(&mut self, text: &str, line: usize, depth: usize) -> Result<(), CompileError> {
        let mut text = text;
        let mut labels = Vec::new();
        while let Ok((rest, name)) = label(text) {
            labels.push(name);
            text = rest;
        }

        // labels on the same line as a data directive name the data, whatever the section
        let text = text.trim();
        let names_data = data_directive(text).is_some();
        for name in labels {
            self.define_label(name, names_data).map_err(|e| e.at_line(line))?;
        }

        if text.is_empty() {
            return Ok(());
        }

        if text.starts_with('.') {
            return self.handle_directive(text, line);
        }

        let (operands, name) = mnemonic(text).map_err(|_| {
            ParserError::UnknownInstruction(text.to_owned()).at_line(line)
        })?;

        if self.section == Section::Data {
            return Err(ParserError::InstructionInData(name.to_owned())
                .with_tip("instructions go after a .text directive")
                .at_line(line));
        }

        if self.macros.exists(name) {
            if depth >= MAX_MACRO_DEPTH {
                return Err(MacroError::RecursionLimit(name.to_owned()).at_line(line));
            }
            let expansion = self
                .macros
                .expand(name, operands)
                .map_err(|e| e.at_line(line))?;
            for expanded in expansion {
                self.statement(&expanded, line, depth + 1)?;
            }
            return Ok(());
        }

        let Some(opcode) = self.catalog.lookup(name) else {
            return Err(ParserError::UnknownInstruction(name.to_owned()).at_line(line));
        };

        let instruction = self
            .instruction(opcode, operands, line)
            .map_err(|e| e.at_line(line))?;
        self.code.push(instruction);
        Ok(())
    }

    /// Code labels get the next instruction's address. Data labels wait for the next data
    /// directive, since data is only placed at link time.
    fn define_label(&mut self, name: &str, names_data: bool) -> Result<(), ParserError> {
        if !self.defined.insert(name.to_owned()) {
            return Err(ParserError::DuplicateLabel(name.to_owned()));
        }

        if names_data || self.section == Section::Data {
            self.pending_labels.push(name.to_owned());
        } else {
            let address = self.next_address();
            self.symbols.insert(name.to_owned(), address);
        }
        Ok(())
    }

    fn next_address(&self) -> u32 {
        self.start + self.code.len() as u32 * 4
    }

    /// `.equ NAME, VALUE` and `.set NAME, VALUE`. The value is stored as text.
    fn define_constant(&mut self, rest: &str, substitute: bool) -> Result<(), Error> {
        let pieces = split_operands(rest);
        let &[name, value] = &pieces[..] else {
            return Err(ParserError::MalformedEqu(rest.trim().to_owned()).into());
        };
        if !is_identifier(name) {
            return Err(ParserError::InvalidName(name.to_owned()).into());
        }
        if value.is_empty() {
            return Err(ParserError::MalformedEqu(rest.trim().to_owned()).into());
        }

        let value = if substitute {
            self.substitute_constants(value)
        } else {
            value.to_owned()
        };
        tracing::trace!(name, value = value.as_str(), "Constant defined");
        self.constants.insert(name.to_owned(), value);
        Ok(())
    }

    fn handle_directive(&mut self, text: &str, line: usize) -> Result<(), CompileError> {
        let (rest, name) = directive(text)
            .map_err(|_| ParserError::UnknownDirective(String::new()).at_line(line))?;
        let lowercase = name.to_ascii_lowercase();

        match lowercase.as_str() {
            "text" => self.section = Section::Text,
            "data" => self.section = Section::Data,
            "equ" | "set" => self.define_constant(rest, false).map_err(|e| e.at_line(line))?,
            "global" | "globl" => {
                for symbol in split_operands(rest) {
                    if !is_identifier(symbol) {
                        return Err(ParserError::InvalidName(symbol.to_owned()).at_line(line));
                    }
                    self.globals.insert(symbol.to_owned(), line);
                }
            }
            "macro" => {
                let (_, (name, params)) =
                    declare_macro(text).map_err(|_| MacroError::ExpectedName.at_line(line))?;
                self.recording = Some(Recording {
                    name: name.to_owned(),
                    params: params.into_iter().map(str::to_owned).collect(),
                    body: Vec::new(),
                    line,
                });
            }
            "endm" | "end_macro" => {
                return Err(ParserError::UnknownDirective(name.to_owned())
                    .with_tip("there is no .macro to close here")
                    .at_line(line));
            }
            "end" => self.ended = true,
            _ => {
                let ty: data::Type = lowercase.parse().map_err(|e: ParserError| e.at_line(line))?;
                let item = DataItem::parse(ty, rest).map_err(|e| e.at_line(line))?;
                self.variables.push(Variable {
                    labels: std::mem::take(&mut self.pending_labels),
                    item,
                    line,
                });
            }
        }
        Ok(())
    }

    fn finish_macro(&mut self) -> Result<(), CompileError> {
        let Some(recording) = self.recording.take() else {
            return Ok(());
        };
        self.macros
            .define(&recording.name, recording.params, recording.body)
            .map_err(|e| e.at_line(recording.line))
    }

    fn register(&self, operand: &str) -> Result<u8, ParserError> {
        self.regs.try_get(operand)
    }

    fn instruction(
        &self,
        opcode: Opcode,
        operands: &str,
        line: usize,
    ) -> Result<PendingInstruction, Error> {
        let ops = split_operands(operands);
        let mut p = PendingInstruction::new(opcode, line, self.next_address());

        let expected = match opcode.syntax() {
            Syntax::Default | Syntax::Branch | Syntax::ShiftImmediate => 3,
            Syntax::Memory => 2,
            Syntax::BranchLabel
            | Syntax::Register
            | Syntax::Destination
            | Syntax::Target => 1,
            Syntax::NoOperand => 0,
        };
        if ops.len() != expected {
            return Err(ParserError::OperandCount {
                mnemonic: opcode.mnemonic().to_owned(),
                expected,
                found: ops.len(),
            }
            .into());
        }

        let expr = |s: &str| -> Result<Option<String>, Error> {
            if s.is_empty() {
                return Err(error::ExpressionError::Empty.into());
            }
            Ok(Some(s.to_owned()))
        };

        match (opcode.syntax(), opcode.format()) {
            (Syntax::Default, Format::R) => {
                p.c = self.register(ops[0])?;
                p.a = self.register(ops[1])?;
                p.b = self.register(ops[2])?;
            }
            (Syntax::Default, _) => {
                p.b = self.register(ops[0])?;
                p.a = self.register(ops[1])?;
                p.expr = expr(ops[2])?;
            }
            (Syntax::Branch, _) => {
                p.a = self.register(ops[0])?;
                p.b = self.register(ops[1])?;
                p.expr = expr(ops[2])?;
            }
            (Syntax::BranchLabel, _) | (Syntax::Target, _) => {
                p.expr = expr(ops[0])?;
            }
            (Syntax::Memory, _) => {
                p.b = self.register(ops[0])?;
                let (offset, base) = memory_operand(ops[1])
                    .ok_or_else(|| ParserError::ExpectedMemoryOperand(ops[1].to_owned()))?;
                p.a = self.register(base)?;
                p.expr = Some(if offset.is_empty() { "0" } else { offset }.to_owned());
            }
            (Syntax::Register, _) => {
                p.a = self.register(ops[0])?;
                if opcode == Opcode::Callr {
                    p.c = RETURN_ADDRESS;
                }
            }
            (Syntax::ShiftImmediate, _) => {
                p.c = self.register(ops[0])?;
                p.a = self.register(ops[1])?;
                p.expr = expr(ops[2])?;
            }
            (Syntax::Destination, _) => {
                p.c = self.register(ops[0])?;
            }
            (Syntax::NoOperand, _) => {
                if opcode == Opcode::Ret {
                    p.a = RETURN_ADDRESS;
                }
            }
        }

        Ok(p)
    }

    /// Second pass
    fn link(self) -> Result<Program, CompileError> {
        let mut symbols = self.symbols;

        let code_size = self.code.len() as u32 * 4;
        let data_start = self.start + code_size + 4;

        let mut address = data_start;
        for variable in &self.variables {
            for label in &variable.labels {
                symbols.insert(label.clone(), address);
            }
            address = address
                .checked_add(variable.item.size(address))
                .ok_or_else(|| ParserError::DataOverflow.at_line(variable.line))?;
        }
        // labels at the very end of the data region
        for label in self.pending_labels {
            symbols.insert(label, address);
        }

        let mut image = vec![0u8; code_size as usize + 4];
        for (i, instruction) in self.code.iter().enumerate() {
            let word = instruction.link(&symbols)?;
            LittleEndian::write_u32(&mut image[i * 4..], word);
        }

        for variable in &self.variables {
            let address = self.start + image.len() as u32;
            variable
                .item
                .emit(&mut image, address, &symbols)
                .map_err(|e| e.at_line(variable.line))?;
        }

        tracing::debug!(
            instructions = self.code.len(),
            data_bytes = image.len() - code_size as usize - 4,
            symbols = symbols.len(),
            "Program assembled"
        );

        Ok(Program {
            image,
            start: self.start,
            symbols,
            globals: self.globals,
            lines: self.code.iter().map(|p| p.line).collect(),
        })
    }
}

/// If `text` starts with a data directive, returns its type
fn data_directive(text: &str) -> Option<data::Type> {
    let (_, name) = directive(text).ok()?;
    name.to_ascii_lowercase().parse().ok()
}

/// If `text` is an `.equ`/`.set` line, returns what follows the directive name
fn equ_directive(text: &str) -> Option<&str> {
    let (rest, name) = directive(text).ok()?;
    (name.eq_ignore_ascii_case("equ") || name.eq_ignore_ascii_case("set")).then_some(rest)
}

/// Turns source text into a [`Program`]. Holds nothing between calls but a reference to the
/// instruction catalog, so one assembler can be reused.
pub struct Assembler<'a> {
    catalog: &'a Catalog,
    start: u32,
}

impl<'a> Assembler<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            start: RAM_START,
        }
    }

    pub fn assemble(&self, source: &str) -> Result<Program, CompileError> {
        let mut ctx = ParserContext::new(self.catalog, self.start);

        for (i, raw) in source.lines().enumerate() {
            ctx.physical_line(raw, i + 1)?;
            if ctx.ended {
                break;
            }
        }

        if let Some(recording) = &ctx.recording {
            return Err(MacroError::Unterminated(recording.name.clone()).at_line(recording.line));
        }

        ctx.link()
    }
}

/// Assembles `source` with a fresh [`Catalog`]
pub fn assemble(source: &str) -> Result<Program, CompileError> {
    let catalog = Catalog::new();
    Assembler::new(&catalog).assemble(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{IType, Instruction, JType, RType};
    use error::ExpressionError;

    fn words(program: &Program) -> Vec<u32> {
        program
            .image()
            .chunks(4)
            .take(program.len())
            .map(LittleEndian::read_u32)
            .collect()
    }

    fn decode(program: &Program) -> Vec<Instruction> {
        let catalog = Catalog::new();
        words(program)
            .into_iter()
            .map(|w| catalog.decode(w).unwrap())
            .collect()
    }

    fn error_of(source: &str) -> CompileError {
        assemble(source).unwrap_err()
    }

    #[test]
    fn test_single_instruction() {
        let program = assemble("addi r2, r0, 5\n").unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(program.start(), 0);
        assert_eq!(program.image(), &[0x44, 0x01, 0x80, 0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn test_operand_order() {
        let program = assemble(
            "add r3, r4, r5
             ldw r2, 8(sp)
             stw r2, (r4)
             slli r2, r3, 33
             jmp r5
             callr r6
             ret
             nextpc r7",
        )
        .unwrap();

        assert_eq!(
            decode(&program),
            [
                Instruction::Add(RType { a: 4, b: 5, c: 3, imm5: 0 }),
                Instruction::Ldw(IType { a: 27, b: 2, imm: 8 }),
                Instruction::Stw(IType { a: 4, b: 2, imm: 0 }),
                Instruction::Slli(RType { a: 3, b: 0, c: 2, imm5: 1 }),
                Instruction::Jmp(RType { a: 5, ..Default::default() }),
                Instruction::Callr(RType { a: 6, c: 31, ..Default::default() }),
                Instruction::Ret(RType { a: 31, ..Default::default() }),
                Instruction::Nextpc(RType { c: 7, ..Default::default() }),
            ]
        );
    }

    #[test]
    fn test_forward_branch() {
        let program = assemble(
            "    br skip
                 addi r2, r0, 1
             skip:
                 addi r2, r0, 2",
        )
        .unwrap();

        assert_eq!(program.symbol("skip"), Some(8));
        // target - (address + 4)
        assert_eq!(decode(&program)[0], Instruction::Br(IType { a: 0, b: 0, imm: 4 }));
    }

    #[test]
    fn test_backward_branch_and_call() {
        let program = assemble(
            "loop: addi r2, r2, -1
                   bne r2, r0, loop
                   call loop
                   jmpi end
             end:",
        )
        .unwrap();

        let code = decode(&program);
        assert_eq!(code[1], Instruction::Bne(IType { a: 2, b: 0, imm: (-8i16) as u16 }));
        assert_eq!(code[2], Instruction::Call(JType { imm: 0 }));
        assert_eq!(code[3], Instruction::Jmpi(JType { imm: 4 }));
    }

    #[test]
    fn test_builtin_macro_matches_instruction() {
        let a = assemble("mov r3, r4").unwrap();
        let b = assemble("add r3, r4, r0").unwrap();
        assert_eq!(a.image(), b.image());

        let program = assemble(
            ".data
             value: .word 0x12345678
             .text
             movia r4, value",
        )
        .unwrap();
        let value = program.symbol("value").unwrap();
        assert_eq!(value, 12);
        assert_eq!(
            decode(&program),
            [
                Instruction::Orhi(IType { a: 0, b: 4, imm: 0 }),
                Instruction::Addi(IType { a: 4, b: 4, imm: 12 }),
            ]
        );
    }

    #[test]
    fn test_truncation() {
        let program = assemble("addi r2, r0, 0x12345\nslli r3, r3, 0x21").unwrap();
        assert_eq!(
            decode(&program),
            [
                Instruction::Addi(IType { a: 0, b: 2, imm: 0x2345 }),
                Instruction::Slli(RType { a: 3, b: 0, c: 3, imm5: 1 }),
            ]
        );
    }

    #[test]
    fn test_data_layout() {
        let program = assemble(
            ".data
             bytes: .byte 1, 2, 3
             .align 2
             words: .word bytes, end
             msg: .asciz \"hi\"
             end:
             .text
             ldw r2, %lo(words)(r0)",
        )
        .unwrap();

        assert_eq!(program.data_start(), 8);
        assert_eq!(program.symbol("bytes"), Some(8));
        assert_eq!(program.symbol("words"), Some(12));
        assert_eq!(program.symbol("msg"), Some(20));
        assert_eq!(program.symbol("end"), Some(23));
        assert_eq!(
            &program.image()[8..],
            &[1, 2, 3, 0, 8, 0, 0, 0, 23, 0, 0, 0, b'h', b'i', 0]
        );
    }

    #[test]
    fn test_data_directives_in_text() {
        let program = assemble(".word 5\nnop").unwrap();
        assert_eq!(program.len(), 1);
        assert_eq!(words(&program), words(&assemble("add r0, r0, r0").unwrap()));
        assert_eq!(&program.image()[4..], &[0, 0, 0, 0, 5, 0, 0, 0]);

        let program = assemble(
            "    ldw r2, %lo(x)(r0)
             x:  .word 7
             y:
                 addi r3, r0, 1",
        )
        .unwrap();
        assert_eq!(program.data_start(), 12);
        assert_eq!(program.symbol("x"), Some(12));
        assert_eq!(program.symbol("y"), Some(4), "a label alone on a line names code");
        assert_eq!(decode(&program)[0], Instruction::Ldw(IType { a: 0, b: 2, imm: 12 }));
        assert_eq!(&program.image()[12..], &[7, 0, 0, 0]);
    }

    #[test]
    fn test_data_past_the_address_space() {
        // 4096 blocks of 1MB end exactly one word past 2^32
        let source = format!(".data\n{}", ".skip 0x100000\n".repeat(4096));
        let e = error_of(&source);
        assert_eq!(e.line, 4097);
        assert_eq!(e.error, ParserError::DataOverflow.into());
    }

    #[test]
    fn test_constants() {
        let program = assemble(
            ".equ COUNT, 3
             .equ TWICE, COUNT * 2
             addi r2, r0, TWICE + 1
             .equ COUNT, 10
             addi r3, r0, COUNT",
        )
        .unwrap();

        assert_eq!(
            decode(&program),
            [
                Instruction::Addi(IType { a: 0, b: 2, imm: 7 }),
                Instruction::Addi(IType { a: 0, b: 3, imm: 10 }),
            ]
        );
    }

    #[test]
    fn test_user_macro() {
        let program = assemble(
            ".macro push reg
                 subi sp, sp, 4
                 stw \\reg, 0(sp)
             .endm
             push ra
             push r2",
        )
        .unwrap();

        assert_eq!(program.len(), 4);
        assert_eq!(program.line_of_address(0), Some(5));
        assert_eq!(program.line_of_address(8), Some(6));
        assert_eq!(program.address_of_line(6), Some(8));
        assert_eq!(program.address_of_line(1), None);
        assert_eq!(program.line_of_address(2), None);
    }

    #[test]
    fn test_comments_and_labels() {
        let program = assemble(
            "# header
             a: b: // two labels
             addi r2, r0, '#' # not a comment start",
        )
        .unwrap();
        assert_eq!(program.symbol("a"), Some(0));
        assert_eq!(program.symbol("b"), Some(0));
        assert_eq!(decode(&program)[0], Instruction::Addi(IType { a: 0, b: 2, imm: 35 }));
    }

    #[test]
    fn test_end_directive() {
        let program = assemble("nop\n.end\nthis is not assembly").unwrap();
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_globals() {
        let program = assemble(".global _start\n.global missing\nnop\n_start: nop\nother:").unwrap();
        assert_eq!(program.global("_start"), Ok(4));
        assert_eq!(
            program.global("other"),
            Err(ParserError::NotGlobal("other".into()).at_line(0))
        );
        assert_eq!(
            program.global("missing"),
            Err(ParserError::UndefinedSymbol("missing".into()).at_line(2))
        );
    }

    #[test]
    fn test_errors() {
        let e = error_of("nop\nfoo r1, r2");
        assert_eq!(e.line, 2);
        assert_eq!(e.error, ParserError::UnknownInstruction("foo".into()).into());

        let e = error_of("add r1, r2");
        assert!(matches!(
            e.kind(),
            Error::Parser(ParserError::OperandCount { expected: 3, found: 2, .. })
        ));

        let e = error_of("add r1, r2, r99");
        assert_eq!(e.error, ParserError::ExpectedRegister(Some("r99".into())).into());

        let e = error_of("\n\nbeq r1, r2, nowhere");
        assert_eq!(e.line, 3);
        assert_eq!(e.error, ExpressionError::UnknownSymbol("nowhere".into()).into());

        let e = error_of("x: nop\nx: nop");
        assert_eq!(e.error, ParserError::DuplicateLabel("x".into()).into());

        let e = error_of(".data\nadd r1, r2, r3");
        assert_eq!(*e.kind(), ParserError::InstructionInData("add".into()).into());

        let e = error_of(".bogus");
        assert_eq!(e.error, ParserError::UnknownDirective("bogus".into()).into());

        let e = error_of("ldw r2, 4");
        assert_eq!(e.error, ParserError::ExpectedMemoryOperand("4".into()).into());

        let e = error_of(".equ 5");
        assert_eq!(e.error, ParserError::MalformedEqu("5".into()).into());
    }

    #[test]
    fn test_macro_errors() {
        let e = error_of(".macro forever\nforever\n.endm\nforever");
        assert_eq!(e.line, 4);
        assert_eq!(e.error, MacroError::RecursionLimit("forever".into()).into());

        let e = error_of("\n.macro open x\nnop");
        assert_eq!(e.line, 2);
        assert_eq!(e.error, MacroError::Unterminated("open".into()).into());

        let e = error_of(".macro mov a, b\n.endm");
        assert_eq!(e.error, MacroError::Redefinition("mov".into()).into());

        let e = error_of("mov r1");
        assert!(matches!(e.error, Error::Macro(MacroError::ArgumentCount { .. })));
    }

    #[test]
    fn test_assembler_is_reusable() {
        let catalog = Catalog::new();
        let assembler = Assembler::new(&catalog);
        let a = assembler.assemble("x: br x").unwrap();
        let b = assembler.assemble("x: br x").unwrap();
        assert_eq!(a, b);
        assert_eq!(words(&a), [Instruction::Br(IType { a: 0, b: 0, imm: 0xfffc }).encode()]);
    }
}
