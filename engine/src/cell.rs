//! FILENAME: engine/src/cell.rs
//! PURPOSE: Defines the fundamental data structures for a single spreadsheet cell.
//! CONTEXT: A cell owns one of three content variants (Empty, Text, Formula)
//! plus a memoized value cache and the set of cells that depend on it.
//! Content, cache, and dependents all sit behind `RefCell` so a single
//! `Cell` identity can survive repeated edits: replacing a formula with a
//! new one must keep the existing `dependents` set intact, the same way the
//! original swaps its internal `impl_` pointer while leaving the owning
//! `Cell` object, and its subscriber list, untouched.
//!
//! The mutation protocol itself (parsing, circular-dependency checking,
//! cache invalidation, subscription) lives on `Sheet`, since it requires
//! visibility into other cells.

use crate::coord::Position;
use parser::{CellError, Expression};
use std::cell::RefCell;
use std::collections::HashSet;

/// Prefixes a formula; stripped before parsing, re-added on display.
pub const FORMULA_SIGN: char = '=';
/// Prefixes literal text that would otherwise be read as a formula or a
/// number; stripped only when computing the cell's value, not its text.
pub const ESCAPE_SIGN: char = '\'';

/// The calculated value of a cell: a tagged union of number, text, or error.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Error(CellError),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// What a cell currently holds, before evaluation.
#[derive(Debug, Clone, PartialEq)]
enum Content {
    Empty,
    /// Raw text as supplied to `set`, including a leading `ESCAPE_SIGN` if
    /// present. The sign is stripped at value-computation time, not here.
    Text(String),
    Formula(Expression),
}

/// The atomic unit of the spreadsheet.
#[derive(Debug)]
pub struct Cell {
    content: RefCell<Content>,
    cache: RefCell<Option<CellValue>>,
    /// Cells whose formulas reference this one. Keyed by `Position` rather
    /// than a pointer or `Rc`, since cells live in a `HashMap` that can
    /// reallocate on insert.
    dependents: RefCell<HashSet<Position>>,
}

impl Cell {
    pub fn empty() -> Self {
        Cell {
            content: RefCell::new(Content::Empty),
            cache: RefCell::new(None),
            dependents: RefCell::new(HashSet::new()),
        }
    }

    pub(crate) fn set_empty(&self) {
        *self.content.borrow_mut() = Content::Empty;
    }

    pub(crate) fn set_text(&self, text: String) {
        *self.content.borrow_mut() = Content::Text(text);
    }

    pub(crate) fn set_formula(&self, ast: Expression) {
        *self.content.borrow_mut() = Content::Formula(ast);
    }

    /// Whether this cell currently holds `Empty` content. Used to decide
    /// which cells count toward the sheet's printable bounding box — a
    /// cell node persists after being cleared, but stops counting.
    pub(crate) fn is_empty(&self) -> bool {
        matches!(&*self.content.borrow(), Content::Empty)
    }

    /// The raw text a user would see if they edited this cell: empty for
    /// `Empty`, the stored text verbatim for `Text` (escape sign included),
    /// or `=` followed by the canonical formula text for `Formula`.
    pub fn get_text(&self) -> String {
        match &*self.content.borrow() {
            Content::Empty => String::new(),
            Content::Text(s) => s.clone(),
            Content::Formula(ast) => {
                let mut out = String::new();
                out.push(FORMULA_SIGN);
                ast.print_formula(&mut out);
                out
            }
        }
    }

    /// Positions this cell's formula reads from, in parse order with no
    /// duplicates. Empty for non-formula cells.
    pub fn get_referenced_cells(&self) -> Vec<(String, u32)> {
        match &*self.content.borrow() {
            Content::Formula(ast) => ast.get_cells(),
            _ => Vec::new(),
        }
    }

    /// Returns the memoized value if present.
    pub(crate) fn cached_value(&self) -> Option<CellValue> {
        self.cache.borrow().clone()
    }

    /// Computes and caches this cell's value using `lookup` to resolve any
    /// cell references in its formula. No-op if already cached.
    pub(crate) fn evaluate(
        &self,
        lookup: &impl Fn(&str, u32) -> Result<f64, CellError>,
    ) -> CellValue {
        if let Some(cached) = self.cached_value() {
            return cached;
        }

        let value = match &*self.content.borrow() {
            Content::Empty => CellValue::Empty,
            Content::Text(s) => {
                let text = match s.strip_prefix(ESCAPE_SIGN) {
                    Some(rest) => rest.to_string(),
                    None => s.clone(),
                };
                CellValue::Text(text)
            }
            Content::Formula(ast) => match ast.execute(lookup) {
                Ok(n) => CellValue::Number(n),
                Err(e) => CellValue::Error(e),
            },
        };

        *self.cache.borrow_mut() = Some(value.clone());
        value
    }

    /// Drops the memoized value, if any. Returns whether a value had been
    /// cached, so callers can stop an invalidation walk early (a cell with
    /// no cache has already notified its dependents, or never computed one).
    pub(crate) fn invalidate(&self) -> bool {
        self.cache.borrow_mut().take().is_some()
    }

    pub(crate) fn add_dependent(&self, pos: Position) {
        self.dependents.borrow_mut().insert(pos);
    }

    pub(crate) fn dependents(&self) -> Vec<Position> {
        self.dependents.borrow().iter().copied().collect()
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::empty()
    }
}
