//!
//! Macro table. Holds the built-in pseudo-instructions (`mov`, `movia`, `bgt`...) and any
//! macro the program defines with `.macro`. Expanding a macro is plain text substitution:
//! each formal parameter is replaced by the argument text, unevaluated.
//!

use super::combinators::{replace_identifiers, split_operands};
use super::error::MacroError;
use hashbrown::HashMap;
use std::borrow::Cow;

/// (name, parameters, body)
type BuiltIn = (&'static str, &'static [&'static str], &'static [&'static str]);

const BUILT_INS: &[BuiltIn] = &[
    ("mov", &["dst", "src"], &["add dst, src, r0"]),
    ("movi", &["dst", "imm"], &["addi dst, r0, imm"]),
    ("movui", &["dst", "imm"], &["ori dst, r0, imm"]),
    ("movhi", &["dst", "imm"], &["orhi dst, r0, imm"]),
    (
        "movia",
        &["dst", "label"],
        &["orhi dst, r0, %hiadj(label)", "addi dst, dst, %lo(label)"],
    ),
    ("nop", &[], &["add r0, r0, r0"]),
    ("subi", &["dst", "src", "imm"], &["addi dst, src, -(imm)"]),
    // operand swaps
    ("cmpgt", &["dst", "lhs", "rhs"], &["cmplt dst, rhs, lhs"]),
    ("cmpgtu", &["dst", "lhs", "rhs"], &["cmpltu dst, rhs, lhs"]),
    ("cmple", &["dst", "lhs", "rhs"], &["cmpge dst, rhs, lhs"]),
    ("cmpleu", &["dst", "lhs", "rhs"], &["cmpgeu dst, rhs, lhs"]),
    ("bgt", &["lhs", "rhs", "label"], &["blt rhs, lhs, label"]),
    ("bgtu", &["lhs", "rhs", "label"], &["bltu rhs, lhs, label"]),
    ("ble", &["lhs", "rhs", "label"], &["bge rhs, lhs, label"]),
    ("bleu", &["lhs", "rhs", "label"], &["bgeu rhs, lhs, label"]),
    // x > imm  <=>  x >= imm + 1
    ("cmpgti", &["dst", "src", "imm"], &["cmpgei dst, src, (imm) + 1"]),
    ("cmpgtui", &["dst", "src", "imm"], &["cmpgeui dst, src, (imm) + 1"]),
    ("cmplei", &["dst", "src", "imm"], &["cmplti dst, src, (imm) + 1"]),
    ("cmpleui", &["dst", "src", "imm"], &["cmpltui dst, src, (imm) + 1"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    params: Vec<String>,
    body: Vec<String>,
}

impl Macro {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Macros by lowercase name
#[derive(Debug, Clone)]
pub struct Macros {
    table: HashMap<String, Macro>,
}

impl Default for Macros {
    fn default() -> Self {
        Self::new()
    }
}

impl Macros {
    /// A table with only the built-in pseudo-instructions
    pub fn new() -> Self {
        let table = BUILT_INS
            .iter()
            .map(|&(name, params, body)| {
                let m = Macro {
                    params: params.iter().map(|p| p.to_string()).collect(),
                    body: body.iter().map(|l| l.to_string()).collect(),
                };
                (name.to_owned(), m)
            })
            .collect();
        Self { table }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.table
            .get(name)
            .or_else(|| self.table.get(name.to_ascii_lowercase().as_str()))
    }

    pub fn define(
        &mut self,
        name: &str,
        params: Vec<String>,
        body: Vec<String>,
    ) -> Result<(), MacroError> {
        if self.exists(name) {
            return Err(MacroError::Redefinition(name.to_owned()));
        }

        for (i, param) in params.iter().enumerate() {
            if params[..i].contains(param) {
                return Err(MacroError::DuplicateParameter {
                    name: name.to_owned(),
                    param: param.clone(),
                });
            }
        }

        tracing::debug!(name, arity = params.len(), lines = body.len(), "Macro defined");
        self.table
            .insert(name.to_ascii_lowercase(), Macro { params, body });
        Ok(())
    }

    /// Expands one invocation of `name`. `args_text` is everything after the macro name, e.g.
    /// `r3, r4` for `mov r3, r4`. Expanded lines may themselves invoke macros; expanding those
    /// is up to the caller.
    pub fn expand(&self, name: &str, args_text: &str) -> Result<Vec<String>, MacroError> {
        let m = self
            .get(name)
            .ok_or_else(|| MacroError::Unknown(name.to_owned()))?;

        let args = split_operands(args_text);
        if args.len() != m.arity() {
            return Err(MacroError::ArgumentCount {
                name: name.to_owned(),
                expected: m.arity(),
                found: args.len(),
            });
        }

        let lookup = |ident: &str| {
            m.params
                .iter()
                .position(|p| p == ident)
                .map(|i| Cow::Borrowed(args[i]))
        };

        Ok(m.body
            .iter()
            .map(|line| replace_identifiers(line, lookup))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_expansion() {
        let macros = Macros::new();
        assert_eq!(macros.expand("mov", "r3, r4"), Ok(owned(&["add r3, r4, r0"])));
        assert_eq!(macros.expand("MOV", "r3,r4"), Ok(owned(&["add r3, r4, r0"])));
        assert_eq!(macros.expand("nop", ""), Ok(owned(&["add r0, r0, r0"])));
        assert_eq!(
            macros.expand("movia", "r8, buffer + 4"),
            Ok(owned(&[
                "orhi r8, r0, %hiadj(buffer + 4)",
                "addi r8, r8, %lo(buffer + 4)"
            ]))
        );
        assert_eq!(
            macros.expand("subi", "sp, sp, 4 + 4"),
            Ok(owned(&["addi sp, sp, -(4 + 4)"]))
        );
        assert_eq!(
            macros.expand("bgt", "r2, r3, done"),
            Ok(owned(&["blt r3, r2, done"]))
        );
        assert_eq!(
            macros.expand("cmplei", "r2, r3, 9"),
            Ok(owned(&["cmplti r2, r3, (9) + 1"]))
        );
    }

    #[test]
    fn test_argument_count() {
        let macros = Macros::new();
        assert_eq!(
            macros.expand("mov", "r3"),
            Err(MacroError::ArgumentCount {
                name: "mov".into(),
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            macros.expand("nop", "r1"),
            Err(MacroError::ArgumentCount { found: 1, .. })
        ));
        assert_eq!(
            macros.expand("push", "r1"),
            Err(MacroError::Unknown("push".into()))
        );
    }

    #[test]
    fn test_user_macros() {
        let mut macros = Macros::new();
        macros
            .define(
                "push",
                owned(&["reg"]),
                owned(&["subi sp, sp, 4", "stw \\reg, 0(sp)"]),
            )
            .unwrap();

        assert!(macros.exists("PUSH"));
        assert_eq!(
            macros.expand("push", "ra"),
            Ok(owned(&["subi sp, sp, 4", "stw ra, 0(sp)"]))
        );
    }

    #[test]
    fn test_define_errors() {
        let mut macros = Macros::new();
        assert_eq!(
            macros.define("Mov", vec![], vec![]),
            Err(MacroError::Redefinition("Mov".into()))
        );
        assert_eq!(
            macros.define("twice", owned(&["x", "x"]), vec![]),
            Err(MacroError::DuplicateParameter {
                name: "twice".into(),
                param: "x".into()
            })
        );
        assert!(!macros.exists("twice"));
    }
}
