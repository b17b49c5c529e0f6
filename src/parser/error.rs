use core::fmt;
use owo_colors::OwoColorize;
use std::borrow::Cow;
use thiserror::Error;

fn some_or_eol<T: fmt::Display>(s: &Option<T>) -> Cow<'static, str> {
    match s {
        Some(s) => s.to_string().into(),
        None => Cow::Borrowed("<end of line>"),
    }
}

/// A malformed operand expression
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Empty expression")]
    Empty,

    #[error("Unknown symbol '{}'", .0.bright_yellow())]
    UnknownSymbol(String),

    #[error("Invalid number literal '{}'", .0.bright_yellow())]
    InvalidLiteral(String),

    #[error("Unexpected character '{}' in expression", .0.bright_yellow())]
    UnexpectedChar(char),

    #[error("Expected a value, but found '{}'", some_or_eol(.0).bright_yellow())]
    ExpectedOperand(Option<String>),

    #[error("Expected '{}', but found '{}'", .0.bright_blue(), some_or_eol(.1).bright_yellow())]
    ExpectedToken(&'static str, Option<String>),

    #[error("Unknown relocation '{}{}'", "%".bright_yellow(), .0.bright_yellow())]
    UnknownRelocation(String),

    #[error("Division by zero in expression")]
    DivisionByZero,
}

/// Something wrong with a macro definition or invocation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MacroError {
    #[error("Unknown macro '{}'", .0.bright_yellow())]
    Unknown(String),

    #[error(
        "Macro '{}' takes {} argument(s), but {} were given",
        name.bright_blue(),
        expected.bright_blue(),
        found.bright_yellow()
    )]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Macro '{}' is already defined", .0.bright_yellow())]
    Redefinition(String),

    #[error("The parameter '{}' in macro '{}' was declared more than once", param.bright_yellow(), name.bright_blue())]
    DuplicateParameter { name: String, param: String },

    #[error("Expected a macro name after {}", ".macro".bright_blue())]
    ExpectedName,

    #[error("Macro '{}' was not terminated by {}", .0.bright_yellow(), ".endm".bright_blue())]
    Unterminated(String),

    #[error("Macro '{}' expands too deeply (is it recursive?)", .0.bright_yellow())]
    RecursionLimit(String),
}

/// Any other kind of error the assembler may find
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParserError {
    #[error("Unknown instruction '{}'", .0.bright_yellow())]
    UnknownInstruction(String),

    #[error("Unknown directive '{}{}'", ".".bright_yellow(), .0.bright_yellow())]
    UnknownDirective(String),

    #[error("Expected a register name, but found '{}'", some_or_eol(.0).bright_yellow())]
    ExpectedRegister(Option<String>),

    #[error(
        "'{}' expects {} operand(s), but found {}",
        mnemonic.bright_blue(),
        expected.bright_blue(),
        found.bright_yellow()
    )]
    OperandCount {
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("Expected a memory operand like {}, but found '{}'", "offset(rA)".bright_blue(), .0.bright_yellow())]
    ExpectedMemoryOperand(String),

    #[error("Expected a string literal, but found '{}'", some_or_eol(.0).bright_yellow())]
    ExpectedString(Option<String>),

    #[error("Label '{}' is defined more than once", .0.bright_yellow())]
    DuplicateLabel(String),

    #[error("'{}' is not a valid name here. Names must be identifiers.", .0.bright_yellow())]
    InvalidName(String),

    #[error("{} should have a name and a value: {}", .0.bright_yellow(), ".equ <name>, <value>".bright_blue())]
    MalformedEqu(String),

    #[error("Instruction '{}' inside a data section", .0.bright_yellow())]
    InstructionInData(String),

    #[error("Data runs past the end of the address space")]
    DataOverflow,

    #[error("'{}' must be a constant", .0.bright_yellow())]
    InvalidSize(String),

    #[error("Symbol '{}' was not declared with {}", .0.bright_yellow(), ".global".bright_blue())]
    NotGlobal(String),

    #[error("Symbol '{}' is not defined", .0.bright_yellow())]
    UndefinedSymbol(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    Expression(#[from] ExpressionError),
    #[error("{0}")]
    Macro(#[from] MacroError),
    #[error("{0}")]
    Parser(#[from] ParserError),
    #[error("{err}\n   {}: {tip}", "[tip]".bright_yellow())]
    WithTip {
        err: Box<Error>,
        tip: Cow<'static, str>,
    },
}

/// An assembly error together with the source line it came from. Line numbers are 1-based;
/// errors that aren't tied to any line use line 0.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}\n   {} line {}", .error.bold(), "-->".bright_blue().bold(), .line.bright_yellow())]
pub struct CompileError {
    pub line: usize,
    pub error: Error,
}

impl CompileError {
    /// The error without its tip, if it has one
    pub fn kind(&self) -> &Error {
        match &self.error {
            Error::WithTip { err, .. } => err,
            err => err,
        }
    }
}

pub trait Contextualize {
    fn at_line(self, line: usize) -> CompileError;
    fn with_tip(self, tip: impl Into<Cow<'static, str>>) -> Error;
}

impl<E: Into<Error>> Contextualize for E {
    fn at_line(self, line: usize) -> CompileError {
        CompileError {
            line,
            error: self.into(),
        }
    }

    fn with_tip(self, tip: impl Into<Cow<'static, str>>) -> Error {
        Error::WithTip {
            err: Box::new(self.into()),
            tip: tip.into(),
        }
    }
}
