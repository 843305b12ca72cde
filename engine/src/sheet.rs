//! FILENAME: engine/src/sheet.rs
//! PURPOSE: The public façade over a spreadsheet: cell mutation, value
//! lookup, and the dependency bookkeeping that keeps cached values correct.
//! CONTEXT: `Cell` stays a dumb data holder; all orchestration that needs
//! visibility across cells — parsing, circular-dependency detection, cache
//! invalidation, and dependent subscription — lives here, grounded directly
//! in the original engine's `Cell::Set`/`Cell::Notify`/`Cell::Subscribe`
//! contract, adapted to Rust's ownership model: since cells live in a
//! `HashMap` that can reallocate, there is no stable address to subscribe
//! to, so dependents are tracked by `Position` instead of by reference.

use crate::cell::{Cell, CellValue, FORMULA_SIGN};
use crate::coord::{a1_to_coord, Position};
use crate::error::SheetError;
use crate::grid::Grid;
use crate::traits::{CellInterface, SheetInterface};
use parser::CellError;
use std::collections::HashSet;

/// A spreadsheet: a sparse grid of cells plus the operations to mutate and
/// evaluate them.
#[derive(Debug, Default)]
pub struct Sheet {
    grid: Grid,
}

impl Sheet {
    pub fn new() -> Self {
        Sheet { grid: Grid::new() }
    }

    /// Sets the cell at `pos` from raw user input. An empty string clears
    /// it to `Empty`; text starting with `=` (and at least one more
    /// character) is parsed as a formula; anything else is stored as text
    /// verbatim, including a leading `ESCAPE_SIGN`.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition { pos });
        }

        if text.is_empty() {
            self.ensure_cell(pos);
            self.notify(pos);
            self.grid.get_cell(pos).expect("just ensured").set_empty();
            return Ok(());
        }

        if text.len() < 2 || !text.starts_with(FORMULA_SIGN) {
            self.ensure_cell(pos);
            self.notify(pos);
            self.grid
                .get_cell(pos)
                .expect("just ensured")
                .set_text(text.to_string());
            return Ok(());
        }

        let ast = parser::parse(&text[FORMULA_SIGN.len_utf8()..])?;

        // The target cell must exist before the cycle check runs: a formula
        // can reference its own position (e.g. `A1 = "=A1+1"` on a fresh
        // sheet), and `has_circular_dependency` only walks positions already
        // present in the grid.
        self.ensure_cell(pos);

        if self.has_circular_dependency(&ast, pos) {
            log::warn!("rejected formula at {}: circular dependency", pos);
            return Err(SheetError::CircularDependency { pos });
        }

        self.notify(pos);
        self.grid.get_cell(pos).expect("just ensured").set_formula(ast);

        let refs = self.grid.get_cell(pos).expect("just set").get_referenced_cells();
        for (col, row) in refs {
            let ref_pos = to_position(&col, row);
            if !ref_pos.is_valid() {
                // Out-of-range references surface as `#REF!` at evaluation
                // time via the lookup closure; there's nothing to subscribe.
                continue;
            }
            self.ensure_cell(ref_pos);
            self.grid.get_cell(ref_pos).expect("just ensured").add_dependent(pos);
        }

        log::debug!("set formula at {}", pos);
        Ok(())
    }

    /// Resets the cell at `pos` to `Empty` in place, shrinking the printable
    /// bounding box if it was on the boundary. The cell's node identity and
    /// `dependents` set survive the clear, same as `set_cell(pos, "")` —
    /// a later `set_cell` at the same position reuses the existing node, so
    /// anything that depends on it keeps getting notified. Invalidates the
    /// cell's cache and walks its dependents first, the same notification
    /// `set_cell` performs for every other edit.
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition { pos });
        }
        if let Some(cell) = self.grid.get_cell(pos) {
            cell.set_empty();
            self.notify(pos);
            self.grid.recompute_printable_bounds();
            log::debug!("cleared {}", pos);
        }
        Ok(())
    }

    /// The cell's memoized, lazily-computed value, or `None` if nothing has
    /// ever been stored there.
    pub fn get_value(&self, pos: Position) -> Option<CellValue> {
        self.grid.get_cell(pos).map(|cell| self.evaluate(cell))
    }

    /// The cell's raw stored text, or `None` if nothing has ever been
    /// stored there.
    pub fn get_text(&self, pos: Position) -> Option<String> {
        self.grid.get_cell(pos).map(|cell| cell.get_text())
    }

    /// Direct, concrete access to a cell, for callers that don't need the
    /// trait-object `SheetInterface` view (e.g. tests, or UI layers that
    /// already depend on the concrete engine types).
    pub fn get_cell(&self, pos: Position) -> Option<&Cell> {
        self.grid.get_cell(pos)
    }

    /// The smallest (rows, cols) rectangle containing every non-empty cell.
    pub fn get_printable_size(&self) -> (u32, u32) {
        self.grid.printable_size()
    }

    /// Writes a tab-separated grid of cell values, one row per line.
    pub fn print_values(&self, out: &mut String) {
        let (rows, cols) = self.get_printable_size();
        for row in 0..rows {
            for col in 0..cols {
                if col > 0 {
                    out.push('\t');
                }
                if let Some(value) = self.get_value(Position::new(row, col)) {
                    out.push_str(&value.to_string());
                }
            }
            out.push('\n');
        }
    }

    /// Writes a tab-separated grid of cell texts, one row per line.
    pub fn print_texts(&self, out: &mut String) {
        let (rows, cols) = self.get_printable_size();
        for row in 0..rows {
            for col in 0..cols {
                if col > 0 {
                    out.push('\t');
                }
                if let Some(text) = self.get_text(Position::new(row, col)) {
                    out.push_str(&text);
                }
            }
            out.push('\n');
        }
    }

    fn ensure_cell(&mut self, pos: Position) {
        if !self.grid.contains(pos) {
            self.grid.set_cell(pos, Cell::empty());
        }
    }

    /// Recomputes a cell's value, recursing into whatever it references.
    /// Each visited cell memoizes its own result, so a diamond-shaped
    /// dependency graph only evaluates any shared ancestor once per call.
    fn evaluate(&self, cell: &Cell) -> CellValue {
        let lookup = |col: &str, row: u32| -> Result<f64, CellError> {
            let pos = to_position(col, row);
            if !pos.is_valid() {
                return Err(CellError::Ref);
            }
            match self.grid.get_cell(pos) {
                None => Ok(0.0),
                Some(referenced) => coerce_to_number(self.evaluate(referenced)),
            }
        };
        cell.evaluate(&lookup)
    }

    /// DFS over the dependency graph reachable from `ast`'s references,
    /// using each visited cell's *current* `get_referenced_cells()` rather
    /// than a separately maintained edge set — the graph is always
    /// re-derivable from the cells themselves, so there is nothing else to
    /// keep in sync. `checked` memoizes positions already proven cycle-free,
    /// inserted only after their whole subtree has been walked clean.
    fn has_circular_dependency(&self, ast: &parser::Expression, start: Position) -> bool {
        let mut checked = HashSet::new();
        for (col, row) in ast.get_cells() {
            let pos = to_position(&col, row);
            if pos.is_valid()
                && self.grid.contains(pos)
                && self.dfs_has_cycle(pos, start, &mut checked)
            {
                return true;
            }
        }
        false
    }

    fn dfs_has_cycle(&self, current: Position, start: Position, checked: &mut HashSet<Position>) -> bool {
        if checked.contains(&current) {
            return false;
        }
        if current == start {
            return true;
        }
        if let Some(cell) = self.grid.get_cell(current) {
            for (col, row) in cell.get_referenced_cells() {
                let pos = to_position(&col, row);
                if pos.is_valid() && self.dfs_has_cycle(pos, start, checked) {
                    return true;
                }
            }
        }
        checked.insert(current);
        false
    }

    /// Invalidates this cell's cache and, only if it had one, walks its
    /// dependents to invalidate them too. A cell with no cache has either
    /// never been computed or was already invalidated by an earlier branch
    /// of the same walk, so stopping here avoids revisiting shared ancestors.
    fn notify(&self, pos: Position) {
        if let Some(cell) = self.grid.get_cell(pos) {
            if cell.invalidate() {
                for dependent in cell.dependents() {
                    self.notify(dependent);
                }
            }
        }
    }
}

/// Resolves the `CellValue` lookup coercion rule used during evaluation:
/// numbers pass through, empty text is 0, non-empty text must parse
/// entirely as a number, and errors propagate.
fn coerce_to_number(value: CellValue) -> Result<f64, CellError> {
    match value {
        CellValue::Number(n) => Ok(n),
        CellValue::Empty => Ok(0.0),
        CellValue::Text(t) => {
            if t.is_empty() {
                Ok(0.0)
            } else {
                // Only leading whitespace is skipped, matching the original's
                // `istringstream::operator>>` coercion: trailing garbage (or
                // trailing whitespace) must leave the parse short of the end
                // of the string and fail, not get silently stripped.
                t.trim_start().parse::<f64>().map_err(|_| CellError::Value)
            }
        }
        CellValue::Error(e) => Err(e),
    }
}

fn to_position(col: &str, row: u32) -> Position {
    let (r, c) = a1_to_coord(col, row);
    Position::new(r, c)
}

struct CellView<'a> {
    cell: &'a Cell,
    sheet: &'a Sheet,
}

impl<'a> CellInterface for CellView<'a> {
    fn get_value(&self) -> CellValue {
        self.sheet.evaluate(self.cell)
    }

    fn get_text(&self) -> String {
        self.cell.get_text()
    }

    fn get_referenced_cells(&self) -> Vec<Position> {
        self.cell
            .get_referenced_cells()
            .into_iter()
            .map(|(col, row)| to_position(&col, row))
            .collect()
    }
}

impl SheetInterface for Sheet {
    fn get_cell(&self, pos: Position) -> Option<Box<dyn CellInterface + '_>> {
        self.grid
            .get_cell(pos)
            .map(|cell| Box::new(CellView { cell, sheet: self }) as Box<dyn CellInterface + '_>)
    }
}
