//! FILENAME: engine/src/error.rs
//! PURPOSE: Edit-time error taxonomy for sheet mutations.
//! CONTEXT: These are distinct from `cell::CellError`, which represents
//! runtime value-domain errors (#REF!, #VALUE!, #DIV/0!) stored as data
//! inside a cell. `SheetError` is what a mutating operation like `set_cell`
//! can fail with, via `Result`.

use crate::coord::Position;
use parser::ParseError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SheetError {
    #[error("invalid position: {pos}")]
    InvalidPosition { pos: Position },

    #[error("formula error: {0}")]
    FormulaException(#[from] ParseError),

    #[error("circular dependency detected at {pos}")]
    CircularDependency { pos: Position },
}
