//!
//! Small parsers for the pieces of an assembly line: labels, directive names, string
//! literals, operand lists.
//!

use super::expression::{is_ident_char, is_ident_start};
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_till1, take_while},
    character::complete::{char as the_char, satisfy, space0, space1},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use std::borrow::Cow;

pub fn identifier(s: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(s)
}

pub fn is_identifier(s: &str) -> bool {
    let parsed: IResult<&str, &str> = all_consuming(identifier)(s);
    parsed.is_ok()
}

/// `name:` at the start of a line
pub fn label(s: &str) -> IResult<&str, &str> {
    delimited(space0, identifier, preceded(space0, the_char(':')))(s)
}

/// `.name`, without the dot
pub fn directive(s: &str) -> IResult<&str, &str> {
    preceded(the_char('.'), take_till1(|c: char| c.is_whitespace()))(s)
}

/// First word of an instruction line
pub fn mnemonic(s: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace())(s)
}

/// A comma, or just whitespace
fn separator(s: &str) -> IResult<&str, ()> {
    alt((
        value((), delimited(space0, the_char(','), space0)),
        value((), space1),
    ))(s)
}

/// `.macro NAME p1, p2` or `.macro NAME p1 p2`
pub fn declare_macro(s: &str) -> IResult<&str, (&str, Vec<&str>)> {
    preceded(
        terminated(tag(".macro"), space1),
        tuple((
            identifier,
            preceded(
                opt(separator),
                terminated(separated_list0(separator, identifier), space0),
            ),
        )),
    )(s)
}

/// Recognizes `.endm` and `.end_macro`
pub fn end_macro(s: &str) -> bool {
    let parsed: IResult<&str, &str> =
        all_consuming(terminated(alt((tag(".endm"), tag(".end_macro"))), space0))(s.trim());
    parsed.is_ok()
}

fn transform_escaped_char(c: &str) -> IResult<&str, &str> {
    alt((
        value("\\", the_char('\\')),
        value("\"", the_char('"')),
        value("'", the_char('\'')),
        value("\n", the_char('n')),
        value("\t", the_char('t')),
        value("\r", the_char('r')),
        value("\0", the_char('0')),
    ))(c)
}

pub fn quoted_string(s: &str) -> IResult<&str, String> {
    alt((
        // escaped_transform doesn't accept an empty string
        map(tag("\"\""), |_| String::new()),
        delimited(
            the_char('"'),
            escaped_transform(is_not("\"\\"), '\\', transform_escaped_char),
            the_char('"'),
        ),
    ))(s)
}

/// Calls `f` on every character that isn't inside a string or character literal, with the
/// byte index of that character. Stops early if `f` returns true.
fn scan_outside_quotes(s: &str, mut f: impl FnMut(usize, char) -> bool) {
    let mut quote = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {
                if f(i, c) {
                    return;
                }
            }
        }
    }
}

/// Removes a `#` or `//` comment, unless it's inside a literal
pub fn strip_comment(s: &str) -> &str {
    let mut end = s.len();
    let bytes = s.as_bytes();
    scan_outside_quotes(s, |i, c| {
        let comment = c == '#' || (c == '/' && bytes.get(i + 1) == Some(&b'/'));
        if comment {
            end = i;
        }
        comment
    });
    &s[..end]
}

/// Splits on the commas that aren't inside parentheses or literals. Every piece is trimmed.
/// An empty (or all-blank) input has no operands at all.
pub fn split_operands(s: &str) -> Vec<&str> {
    if s.trim().is_empty() {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    scan_outside_quotes(s, |i, c| {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                pieces.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        false
    });
    pieces.push(s[start..].trim());
    pieces
}

/// Splits `offset(base)` into its two parts. The offset may be empty.
pub fn memory_operand(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    let inner = s.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    Some((inner[..open].trim(), inner[open + 1..].trim()))
}

/// Replaces every whole identifier for which `f` returns something. Identifiers written
/// as `\name` are looked up as `name`, and the backslash goes away with them when replaced.
/// Literals are left alone.
pub fn replace_identifiers<'a, F>(s: &str, f: F) -> String
where
    F: Fn(&str) -> Option<Cow<'a, str>>,
{
    let mut out = String::with_capacity(s.len());
    let mut copied = 0;
    let mut skip_until = 0;

    scan_outside_quotes(s, |i, c| {
        if i < skip_until {
            return false;
        }

        let escaped = c == '\\';
        let start = if escaped { i + 1 } else { i };
        let prev = s[..i].chars().next_back();
        let boundary = escaped || !prev.map_or(false, is_ident_char);

        match s[start..].chars().next() {
            Some(first) if boundary && is_ident_start(first) => {
                let end = s[start..]
                    .find(|c: char| !is_ident_char(c))
                    .map_or(s.len(), |len| start + len);
                skip_until = end;
                if let Some(replacement) = f(&s[start..end]) {
                    out.push_str(&s[copied..i]);
                    out.push_str(&replacement);
                    copied = end;
                }
            }
            _ => {}
        }
        false
    });

    out.push_str(&s[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label() {
        assert_eq!(label("loop: add r1, r1, r1"), Ok((" add r1, r1, r1", "loop")));
        assert_eq!(label("  _start :"), Ok(("", "_start")));
        assert!(label("add r1, r1, r1").is_err());
        assert!(label("1abc:").is_err());
    }

    #[test]
    fn test_directive() {
        assert_eq!(directive(".word 1, 2"), Ok((" 1, 2", "word")));
        assert_eq!(directive(".data"), Ok(("", "data")));
        assert!(directive("word").is_err());
    }

    #[test]
    fn test_declare_macro() {
        assert_eq!(
            declare_macro(".macro push reg"),
            Ok(("", ("push", vec!["reg"])))
        );
        assert_eq!(
            declare_macro(".macro swap a, b"),
            Ok(("", ("swap", vec!["a", "b"])))
        );
        assert_eq!(declare_macro(".macro halt"), Ok(("", ("halt", vec![]))));
        assert!(end_macro("  .endm "));
        assert!(end_macro(".end_macro"));
        assert!(!end_macro(".end"));
    }

    #[test]
    fn test_quoted_string() {
        assert_eq!(
            quoted_string("\"some quoted string\""),
            Ok(("", "some quoted string".to_owned()))
        );
        assert_eq!(
            quoted_string(r#""escape \"sequences\"\n parsed \t correctly""#),
            Ok(("", "escape \"sequences\"\n parsed \t correctly".to_owned()))
        );
        assert_eq!(quoted_string("\"\", 1"), Ok((", 1", String::new())));
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("add r1, r2, r3 # sum"), "add r1, r2, r3 ");
        assert_eq!(strip_comment("movi r2, 1 // one"), "movi r2, 1 ");
        assert_eq!(strip_comment(".ascii \"#1 // x\" # c"), ".ascii \"#1 // x\" ");
        assert_eq!(strip_comment("movi r2, '#'"), "movi r2, '#'");
        assert_eq!(strip_comment("movi r2, 8 / 2"), "movi r2, 8 / 2");
    }

    #[test]
    fn test_split_operands() {
        assert_eq!(split_operands("r1, r2 , r3"), ["r1", "r2", "r3"]);
        assert_eq!(split_operands("r2, %lo(a + 1)(r3)"), ["r2", "%lo(a + 1)(r3)"]);
        assert_eq!(split_operands("\"a,b\", ','"), ["\"a,b\"", "','"]);
        assert_eq!(split_operands("r1,"), ["r1", ""]);
        assert!(split_operands("   ").is_empty());
    }

    #[test]
    fn test_memory_operand() {
        assert_eq!(memory_operand("8(sp)"), Some(("8", "sp")));
        assert_eq!(memory_operand("(r4)"), Some(("", "r4")));
        assert_eq!(memory_operand("%lo(x)(r2)"), Some(("%lo(x)", "r2")));
        assert_eq!(memory_operand("r4"), None);
    }

    #[test]
    fn test_replace_identifiers() {
        let f = |name: &str| match name {
            "a" => Some(Cow::Borrowed("r4")),
            "size" => Some(Cow::Borrowed("16")),
            _ => None,
        };
        assert_eq!(replace_identifiers("add a, a, ab", f), "add r4, r4, ab");
        assert_eq!(replace_identifiers("addi \\a, r0, size*2", f), "addi r4, r0, 16*2");
        assert_eq!(replace_identifiers(".ascii \"a size\"", f), ".ascii \"a size\"");
        assert_eq!(replace_identifiers("x.a + 0xa", f), "x.a + 0xa");
    }
}
