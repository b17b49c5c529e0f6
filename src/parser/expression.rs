//!
//! Evaluates operand expressions like `label + 4`, `%hiadj(buffer)` or `(1 << 12) | 0xff`.
//!
//! Operators, from the tightest binding tier to the loosest, all left-associative:
//!
//! | tier | operators             |
//! |------|-----------------------|
//! | 1    | `<<` `>>` `>>>`       |
//! | 2    | `&`                   |
//! | 3    | `\|` `^`              |
//! | 4    | `*` `/` `%`           |
//! | 5    | `+` `-`               |
//!
//! Unary `-`, `+` and `~` bind tighter than any of these. A parenthesised group may be prefixed
//! by a relocation: `%lo` (bits 0..16), `%hi` (bits 16..32) or `%hiadj` (like `%hi`, plus one if
//! bit 15 is set, to compensate for a following sign-extended `addi`). Arithmetic is done on
//! 64-bit integers and wraps on overflow.
//!

use super::error::ExpressionError;
use hashbrown::HashMap;

/// Label name to absolute address
pub type Symbols = HashMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(i64),
    Ident(String),
    LParen,
    RParen,
    Op(&'static str),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(x) => x.to_string(),
            Token::Ident(s) => s.clone(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Op(op) => (*op).into(),
        }
    }
}

// longest first, so `>>>` isn't read as `>>` `>`
const OPERATORS: &[&str] = &[
    ">>>", "<<", ">>", "&", "|", "^", "*", "/", "%", "+", "-", "~",
];

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.' || c == '$'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

fn parse_escape(c: char) -> Option<u8> {
    Some(match c {
        'n' => b'\n',
        't' => b'\t',
        'r' => b'\r',
        '0' => 0,
        '\\' => b'\\',
        '\'' => b'\'',
        '"' => b'"',
        _ => return None,
    })
}

fn parse_literal(text: &str) -> Result<i64, ExpressionError> {
    let invalid = || ExpressionError::InvalidLiteral(text.to_owned());
    let lower = text.to_ascii_lowercase();

    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else {
        (lower.as_str(), 10)
    };

    if digits.is_empty() {
        return Err(invalid());
    }

    // hex and binary literals may spell out all 64 bits
    match radix {
        10 => digits.parse::<i64>().map_err(|_| invalid()),
        _ => u64::from_str_radix(digits, radix)
            .map(|x| x as i64)
            .map_err(|_| invalid()),
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
        } else if c.is_ascii_digit() {
            let end = rest.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(rest.len());
            tokens.push(Token::Num(parse_literal(&rest[..end])?));
            rest = &rest[end..];
        } else if is_ident_start(c) {
            let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..end].to_owned()));
            rest = &rest[end..];
        } else if c == '\'' {
            let (value, len) = char_literal(rest)?;
            tokens.push(Token::Num(value));
            rest = &rest[len..];
        } else if c == '(' {
            tokens.push(Token::LParen);
            rest = &rest[1..];
        } else if c == ')' {
            tokens.push(Token::RParen);
            rest = &rest[1..];
        } else if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token::Op(*op));
            rest = &rest[op.len()..];
        } else {
            return Err(ExpressionError::UnexpectedChar(c));
        }
    }

    Ok(tokens)
}

/// Parses `'a'` or `'\n'` at the start of `s`. Returns the value and the literal's length.
fn char_literal(s: &str) -> Result<(i64, usize), ExpressionError> {
    let mut chars = s.char_indices().skip(1);
    let invalid = || {
        let end = s[1..].find('\'').map(|i| i + 2).unwrap_or(s.len());
        ExpressionError::InvalidLiteral(s[..end].to_owned())
    };

    let value = match chars.next() {
        Some((_, '\\')) => chars
            .next()
            .and_then(|(_, c)| parse_escape(c))
            .ok_or_else(invalid)? as i64,
        Some((_, c)) if c != '\'' => c as i64,
        _ => return Err(invalid()),
    };

    match chars.next() {
        Some((i, '\'')) => Ok((value, i + 1)),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
}

impl BinOp {
    fn from_op(op: &str) -> Option<Self> {
        use BinOp::*;
        Some(match op {
            "<<" => Shl,
            ">>" => Shr,
            ">>>" => Ushr,
            "&" => And,
            "|" => Or,
            "^" => Xor,
            "*" => Mul,
            "/" => Div,
            "%" => Rem,
            "+" => Add,
            "-" => Sub,
            _ => return None,
        })
    }

    /// Higher binds tighter
    fn precedence(self) -> u8 {
        use BinOp::*;
        match self {
            Shl | Shr | Ushr => 5,
            And => 4,
            Or | Xor => 3,
            Mul | Div | Rem => 2,
            Add | Sub => 1,
        }
    }

    fn apply(self, a: i64, b: i64) -> Result<i64, ExpressionError> {
        use BinOp::*;
        Ok(match self {
            Shl => a.wrapping_shl(b as u32),
            Shr => a.wrapping_shr(b as u32),
            Ushr => (a as u64).wrapping_shr(b as u32) as i64,
            And => a & b,
            Or => a | b,
            Xor => a ^ b,
            Mul => a.wrapping_mul(b),
            Div if b == 0 => return Err(ExpressionError::DivisionByZero),
            Div => a.wrapping_div(b),
            Rem if b == 0 => return Err(ExpressionError::DivisionByZero),
            Rem => a.wrapping_rem(b),
            Add => a.wrapping_add(b),
            Sub => a.wrapping_sub(b),
        })
    }
}

pub fn lo(x: i64) -> i64 {
    x & 0xffff
}

pub fn hi(x: i64) -> i64 {
    (x >> 16) & 0xffff
}

pub fn hiadj(x: i64) -> i64 {
    ((x >> 16) + ((x >> 15) & 1)) & 0xffff
}

struct Evaluator<'a> {
    tokens: Vec<Token>,
    pos: usize,
    symbols: Option<&'a Symbols>,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, token: Token, text: &'static str) -> Result<(), ExpressionError> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            other => Err(ExpressionError::ExpectedToken(
                text,
                other.map(|t| t.describe()),
            )),
        }
    }

    fn binary(&mut self, min_precedence: u8) -> Result<i64, ExpressionError> {
        let mut lhs = self.unary()?;

        while let Some(Token::Op(op)) = self.peek() {
            let Some(op) = BinOp::from_op(op) else {
                break;
            };
            if op.precedence() < min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(op.precedence() + 1)?;
            lhs = op.apply(lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, ExpressionError> {
        match self.next() {
            Some(Token::Op("-")) => Ok(self.unary()?.wrapping_neg()),
            Some(Token::Op("+")) => self.unary(),
            Some(Token::Op("~")) => Ok(!self.unary()?),
            Some(Token::Op("%")) => {
                let relocation = match self.next() {
                    Some(Token::Ident(name)) => name,
                    other => {
                        return Err(ExpressionError::ExpectedOperand(
                            other.map(|t| t.describe()),
                        ))
                    }
                };
                let transform = match relocation.to_ascii_lowercase().as_str() {
                    "lo" => lo,
                    "hi" => hi,
                    "hiadj" => hiadj,
                    _ => return Err(ExpressionError::UnknownRelocation(relocation)),
                };
                self.expect(Token::LParen, "(")?;
                let inner = self.binary(0)?;
                self.expect(Token::RParen, ")")?;
                Ok(transform(inner))
            }
            Some(Token::LParen) => {
                let inner = self.binary(0)?;
                self.expect(Token::RParen, ")")?;
                Ok(inner)
            }
            Some(Token::Num(x)) => Ok(x),
            Some(Token::Ident(name)) => self
                .symbols
                .and_then(|s| s.get(&name))
                .map(|&address| address as i64)
                .ok_or(ExpressionError::UnknownSymbol(name)),
            other => Err(ExpressionError::ExpectedOperand(other.map(|t| t.describe()))),
        }
    }
}

/// Evaluates `text`. Identifiers are looked up in `symbols`; without a symbol table, any
/// identifier is an error.
pub fn evaluate(text: &str, symbols: Option<&Symbols>) -> Result<i64, ExpressionError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut evaluator = Evaluator {
        tokens,
        pos: 0,
        symbols,
    };
    let value = evaluator.binary(0)?;

    match evaluator.next() {
        None => Ok(value),
        Some(Token::RParen) => Err(ExpressionError::UnexpectedChar(')')),
        Some(t) => Err(ExpressionError::ExpectedToken(
            "end of expression",
            Some(t.describe()),
        )),
    }
}
