// ABOUTME: Datum tree, process-wide symbol interning, and syntax objects

use crate::number::Number;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// A symbol interned by name: two symbols with the same name are identical
/// (spec §3, §8). The table is process-wide and protected by a mutex so
/// `intern` is linearizable across compilations running on different
/// threads (spec §5) — a plain `std::sync` pair, no extra crate, since the
/// requirement is just mutual exclusion over a growable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(u32);

struct SymbolTable {
    names: Vec<String>,
    by_name: HashMap<String, u32>,
}

fn table() -> &'static Mutex<SymbolTable> {
    static TABLE: OnceLock<Mutex<SymbolTable>> = OnceLock::new();
    TABLE.get_or_init(|| {
        Mutex::new(SymbolTable {
            names: Vec::new(),
            by_name: HashMap::new(),
        })
    })
}

impl Symbol {
    pub fn intern(name: &str) -> Symbol {
        let mut table = table().lock().expect("symbol table poisoned");
        if let Some(&id) = table.by_name.get(name) {
            return Symbol(id);
        }
        let id = table.names.len() as u32;
        table.names.push(name.to_string());
        table.by_name.insert(name.to_string(), id);
        Symbol(id)
    }

    pub fn name(self) -> String {
        let table = table().lock().expect("symbol table poisoned");
        table.names[self.0 as usize].clone()
    }

    /// Number of distinct interned names, process-wide. Exposed for tests
    /// that assert on intern-table growth; shared mutable state across
    /// tests is why those tests run under `serial_test`.
    pub fn table_len() -> usize {
        table().lock().expect("symbol table poisoned").names.len()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The s-expression data model (spec §3). Pairs and vectors hold boxed
/// children; lists are right-nested pairs terminated by `Null` (proper) or
/// any other datum (dotted).
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Char(char),
    String(String),
    Symbol(Symbol),
    Number(Number),
    Pair(Box<Datum>, Box<Datum>),
    Vector(Vec<Datum>),
}

impl Datum {
    pub fn cons(car: Datum, cdr: Datum) -> Datum {
        Datum::Pair(Box::new(car), Box::new(cdr))
    }

    pub fn list(items: Vec<Datum>) -> Datum {
        Datum::list_with_tail(items, Datum::Null)
    }

    pub fn list_with_tail(items: Vec<Datum>, tail: Datum) -> Datum {
        items.into_iter().rev().fold(tail, |acc, item| Datum::cons(item, acc))
    }

    pub fn symbol(name: &str) -> Datum {
        Datum::Symbol(Symbol::intern(name))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Walks a proper or dotted list, returning its elements and the final
    /// tail datum (`Null` for a proper list).
    pub fn iter_list(&self) -> (Vec<&Datum>, &Datum) {
        let mut items = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Datum::Pair(car, cdr) => {
                    items.push(car.as_ref());
                    cur = cdr;
                }
                other => return (items, other),
            }
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "()"),
            Datum::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Datum::Char(c) => write!(f, "#\\{c}"),
            Datum::String(s) => write!(f, "{s:?}"),
            Datum::Symbol(s) => write!(f, "{s}"),
            Datum::Number(n) => write!(f, "{n}"),
            Datum::Pair(_, _) => {
                let (items, tail) = self.iter_list();
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                if !tail.is_null() {
                    write!(f, " . {tail}")?;
                }
                write!(f, ")")
            }
            Datum::Vector(items) => {
                write!(f, "#(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A datum plus its source span, produced when the datum parser runs in
/// `preserve_syntax` mode (spec §3, §4.C).
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxObject {
    pub datum: Datum,
    pub span: Span,
}

impl SyntaxObject {
    pub fn new(datum: Datum, span: Span) -> Self {
        SyntaxObject { datum, span }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn interning_same_name_yields_identical_symbol() {
        let a = Symbol::intern("lambda");
        let b = Symbol::intern("lambda");
        assert_eq!(a, b);
    }

    #[test]
    #[serial]
    fn interning_distinct_names_yields_distinct_symbols() {
        let before = Symbol::table_len();
        let a = Symbol::intern("distinct-one");
        let b = Symbol::intern("distinct-two");
        assert_ne!(a, b);
        assert_eq!(Symbol::table_len(), before + 2);
    }

    #[test]
    fn list_and_iter_list_round_trip() {
        let l = Datum::list(vec![Datum::symbol("a"), Datum::symbol("b")]);
        let (items, tail) = l.iter_list();
        assert_eq!(items.len(), 2);
        assert!(tail.is_null());
    }

    #[test]
    fn dotted_list_keeps_non_null_tail() {
        let l = Datum::list_with_tail(vec![Datum::symbol("a")], Datum::symbol("b"));
        let (items, tail) = l.iter_list();
        assert_eq!(items.len(), 1);
        assert_eq!(*tail, Datum::symbol("b"));
    }

    #[test]
    fn display_renders_list_and_dot() {
        let l = Datum::list_with_tail(vec![Datum::symbol("a")], Datum::symbol("b"));
        assert_eq!(format!("{l}"), "(a . b)");
    }
}
