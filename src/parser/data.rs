use super::combinators::{quoted_string, split_operands};
use super::error::{Error, ExpressionError, ParserError};
use super::expression::{evaluate, Symbols};
use crate::simulator::memory::RAM_SIZE;

use byteorder::{ByteOrder, LittleEndian};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Byte,
    Half,
    Word,
    Ascii,
    Asciz,
    Skip,
    Align,
}

impl FromStr for Type {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Type::*;
        match s {
            "byte" => Ok(Byte),
            "hword" | "short" | "half" => Ok(Half),
            "word" => Ok(Word),
            "ascii" => Ok(Ascii),
            "asciz" | "string" => Ok(Asciz),
            "skip" | "space" => Ok(Skip),
            "align" => Ok(Align),
            _ => Err(ParserError::UnknownDirective(s.to_owned())),
        }
    }
}

/// The contents of one data directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    /// Expressions, evaluated at link time so they can name labels
    Values { width: u32, exprs: Vec<String> },
    Bytes(Vec<u8>),
    Skip { len: u32, fill: u8 },
    /// Pads to a multiple of 2^n
    Align(u32),
}

/// A data item and the labels that point at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub labels: Vec<String>,
    pub item: DataItem,
    pub line: usize,
}

/// Evaluates an expression that can't depend on labels
fn constant(text: &str) -> Result<i64, Error> {
    evaluate(text, None).map_err(|e| match e {
        ExpressionError::UnknownSymbol(_) => ParserError::InvalidSize(text.to_owned()).into(),
        e => e.into(),
    })
}

impl DataItem {
    /// Builds the item for `.<ty> <operands>`
    pub fn parse(ty: Type, operands: &str) -> Result<Self, Error> {
        let pieces = split_operands(operands);

        let width = match ty {
            Type::Byte => 1,
            Type::Half => 2,
            Type::Word => 4,
            Type::Ascii | Type::Asciz => return Self::parse_strings(&pieces, ty == Type::Asciz),
            Type::Skip => return Self::parse_skip(&pieces),
            Type::Align => return Self::parse_align(&pieces),
        };

        if pieces.is_empty() || pieces.iter().any(|p| p.is_empty()) {
            return Err(ExpressionError::Empty.into());
        }

        Ok(DataItem::Values {
            width,
            exprs: pieces.into_iter().map(str::to_owned).collect(),
        })
    }

    fn parse_strings(pieces: &[&str], terminate: bool) -> Result<Self, Error> {
        if pieces.is_empty() {
            return Err(ParserError::ExpectedString(None).into());
        }

        let mut bytes = Vec::new();
        for piece in pieces {
            match quoted_string(piece) {
                Ok((rest, s)) if rest.trim().is_empty() => {
                    bytes.extend_from_slice(s.as_bytes());
                    if terminate {
                        bytes.push(0);
                    }
                }
                _ => return Err(ParserError::ExpectedString(Some(piece.to_string())).into()),
            }
        }
        Ok(DataItem::Bytes(bytes))
    }

    fn parse_skip(pieces: &[&str]) -> Result<Self, Error> {
        let (len_text, fill) = match pieces {
            [len] => (*len, 0),
            [len, fill] => (*len, constant(fill)? as u8),
            _ => {
                return Err(ParserError::OperandCount {
                    mnemonic: ".skip".to_owned(),
                    expected: 1,
                    found: pieces.len(),
                }
                .into())
            }
        };

        let len = constant(len_text)?;
        if !(0..=RAM_SIZE as i64).contains(&len) {
            return Err(ParserError::InvalidSize(len_text.to_owned()).into());
        }
        Ok(DataItem::Skip {
            len: len as u32,
            fill,
        })
    }

    fn parse_align(pieces: &[&str]) -> Result<Self, Error> {
        let [n_text] = pieces else {
            return Err(ParserError::OperandCount {
                mnemonic: ".align".to_owned(),
                expected: 1,
                found: pieces.len(),
            }
            .into());
        };

        let n = constant(n_text)?;
        if !(0..32).contains(&n) || (1u64 << n) > RAM_SIZE as u64 {
            return Err(ParserError::InvalidSize(n_text.to_string()).into());
        }
        Ok(DataItem::Align(n as u32))
    }

    /// Bytes this item takes when placed at `address`
    pub fn size(&self, address: u32) -> u32 {
        match self {
            DataItem::Values { width, exprs } => width * exprs.len() as u32,
            DataItem::Bytes(bytes) => bytes.len() as u32,
            DataItem::Skip { len, .. } => *len,
            DataItem::Align(n) => {
                let multiple = 1u32 << n;
                (multiple - address % multiple) % multiple
            }
        }
    }

    /// Appends this item to `data`, which ends at `address`
    pub fn emit(
        &self,
        data: &mut Vec<u8>,
        address: u32,
        symbols: &Symbols,
    ) -> Result<(), ExpressionError> {
        match self {
            DataItem::Values { width, exprs } => {
                for expr in exprs {
                    // out-of-range values are truncated
                    let value = evaluate(expr, Some(symbols))? as u32;
                    let pos = data.len();
                    match width {
                        1 => data.push(value as u8),
                        2 => {
                            data.resize(pos + 2, 0);
                            LittleEndian::write_u16(&mut data[pos..], value as u16);
                        }
                        _ => {
                            data.resize(pos + 4, 0);
                            LittleEndian::write_u32(&mut data[pos..], value);
                        }
                    }
                }
            }
            DataItem::Bytes(bytes) => data.extend_from_slice(bytes),
            DataItem::Skip { len, fill } => data.resize(data.len() + *len as usize, *fill),
            DataItem::Align(_) => {
                let pad = self.size(address);
                data.resize(data.len() + pad as usize, 0);
            }
        }
        Ok(())
    }
}
