//! FILENAME: parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for formula expressions,
//! and the operations that run over it: evaluation, canonical
//! pretty-printing, and reference extraction.
//! CONTEXT: After the Lexer tokenizes a formula string, the Parser converts
//! those tokens into this tree structure.
//!
//! SUPPORTED EXPRESSIONS:
//! - Numeric literals
//! - Cell references in canonical form: A1, AA100
//! - Binary arithmetic: +, -, *, /
//! - Unary +, -
//! - Parenthesized subexpressions

use std::fmt::Write as _;

/// The three value-domain errors a formula can produce. These are data,
/// not `std::error::Error` types: they flow through `execute` as the `Err`
/// side of its `Result` and end up stored inside a cell's cached value.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CellError {
    /// A formula refers to a position outside the sheet's bounds.
    Ref,
    /// A referenced cell's text could not be coerced to a number.
    Value,
    /// Division by zero, or any other non-finite arithmetic result.
    Div0,
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellError::Ref => write!(f, "#REF!"),
            CellError::Value => write!(f, "#VALUE!"),
            CellError::Div0 => write!(f, "#DIV/0!"),
        }
    }
}

/// Represents a parsed formula expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A numeric literal.
    Literal(f64),

    /// A single cell reference like A1, B2, or AA100.
    /// The column is stored as uppercase letters; the row is 1-indexed.
    CellRef { col: String, row: u32 },

    /// A binary operation: left op right (e.g. 5 + 3).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g. -5, +5).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

/// Binary arithmetic operators, in increasing order of precedence.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOperator {
    /// Precedence used by the pretty-printer to decide whether a child
    /// subexpression needs parentheses. Higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Add | BinaryOperator::Subtract => 1,
            BinaryOperator::Multiply | BinaryOperator::Divide => 2,
        }
    }
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Plus,
    Negate,
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}

impl Expression {
    /// Evaluates the expression to a number, resolving cell references
    /// through `lookup(col, row)`. The lookup itself applies the
    /// text-coercion rules (empty string is 0, otherwise parse-as-number
    /// or `Value`); `execute` only adds `Div0` for division by zero or
    /// any other non-finite result, and propagates whatever error the
    /// lookup or a subexpression produced first, left to right.
    pub fn execute(
        &self,
        lookup: &impl Fn(&str, u32) -> Result<f64, CellError>,
    ) -> Result<f64, CellError> {
        match self {
            Expression::Literal(n) => Ok(*n),
            Expression::CellRef { col, row } => lookup(col, *row),
            Expression::UnaryOp { op, operand } => {
                let v = operand.execute(lookup)?;
                Ok(match op {
                    UnaryOperator::Plus => v,
                    UnaryOperator::Negate => -v,
                })
            }
            Expression::BinaryOp { left, op, right } => {
                let l = left.execute(lookup)?;
                let r = right.execute(lookup)?;
                let result = match op {
                    BinaryOperator::Add => l + r,
                    BinaryOperator::Subtract => l - r,
                    BinaryOperator::Multiply => l * r,
                    BinaryOperator::Divide => {
                        if r == 0.0 {
                            return Err(CellError::Div0);
                        }
                        l / r
                    }
                };
                if result.is_finite() {
                    Ok(result)
                } else {
                    Err(CellError::Div0)
                }
            }
        }
    }

    /// Writes the canonical, re-parseable form of this expression: minimal
    /// parentheses, normalized whitespace (a single space around binary
    /// operators, none around unary ones).
    pub fn print_formula(&self, out: &mut String) {
        self.print_with_precedence(out, 0);
    }

    fn print_with_precedence(&self, out: &mut String, parent_precedence: u8) {
        match self {
            Expression::Literal(n) => {
                let _ = write!(out, "{}", n);
            }
            Expression::CellRef { col, row } => {
                let _ = write!(out, "{}{}", col, row);
            }
            Expression::UnaryOp { op, operand } => {
                let _ = write!(out, "{}", op);
                operand.print_with_precedence(out, 3);
            }
            Expression::BinaryOp { left, op, right } => {
                let precedence = op.precedence();
                let needs_parens = precedence < parent_precedence;
                if needs_parens {
                    out.push('(');
                }
                left.print_with_precedence(out, precedence);
                let _ = write!(out, " {} ", op);
                // The right operand of a left-associative operator needs
                // parens at equal precedence to preserve grouping, e.g.
                // 1 - (2 - 3) must not print as "1 - 2 - 3".
                right.print_with_precedence(out, precedence + 1);
                if needs_parens {
                    out.push(')');
                }
            }
        }
    }

    /// Returns the cell references this expression reads from, in stable
    /// left-to-right order with duplicates removed.
    pub fn get_cells(&self) -> Vec<(String, u32)> {
        let mut cells = Vec::new();
        self.collect_cells(&mut cells);
        cells
    }

    fn collect_cells(&self, out: &mut Vec<(String, u32)>) {
        match self {
            Expression::Literal(_) => {}
            Expression::CellRef { col, row } => {
                let key = (col.clone(), *row);
                if !out.contains(&key) {
                    out.push(key);
                }
            }
            Expression::UnaryOp { operand, .. } => operand.collect_cells(out),
            Expression::BinaryOp { left, right, .. } => {
                left.collect_cells(out);
                right.collect_cells(out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_const(col: &str, row: u32) -> Result<f64, CellError> {
        match (col, row) {
            ("A", 1) => Ok(2.0),
            ("B", 2) => Ok(0.0),
            _ => Err(CellError::Ref),
        }
    }

    #[test]
    fn execute_literal() {
        let expr = Expression::Literal(5.0);
        assert_eq!(expr.execute(&lookup_const), Ok(5.0));
    }

    #[test]
    fn execute_cell_ref() {
        let expr = Expression::CellRef { col: "A".into(), row: 1 };
        assert_eq!(expr.execute(&lookup_const), Ok(2.0));
    }

    #[test]
    fn execute_missing_ref_propagates() {
        let expr = Expression::CellRef { col: "Z".into(), row: 99 };
        assert_eq!(expr.execute(&lookup_const), Err(CellError::Ref));
    }

    #[test]
    fn execute_division_by_zero() {
        let expr = Expression::BinaryOp {
            left: Box::new(Expression::Literal(1.0)),
            op: BinaryOperator::Divide,
            right: Box::new(Expression::CellRef { col: "B".into(), row: 2 }),
        };
        assert_eq!(expr.execute(&lookup_const), Err(CellError::Div0));
    }

    #[test]
    fn print_formula_minimal_parens() {
        let expr = Expression::BinaryOp {
            left: Box::new(Expression::Literal(1.0)),
            op: BinaryOperator::Add,
            right: Box::new(Expression::BinaryOp {
                left: Box::new(Expression::Literal(2.0)),
                op: BinaryOperator::Multiply,
                right: Box::new(Expression::Literal(3.0)),
            }),
        };
        let mut out = String::new();
        expr.print_formula(&mut out);
        assert_eq!(out, "1 + 2 * 3");
    }

    #[test]
    fn print_formula_preserves_right_associativity_grouping() {
        let expr = Expression::BinaryOp {
            left: Box::new(Expression::Literal(1.0)),
            op: BinaryOperator::Subtract,
            right: Box::new(Expression::BinaryOp {
                left: Box::new(Expression::Literal(2.0)),
                op: BinaryOperator::Subtract,
                right: Box::new(Expression::Literal(3.0)),
            }),
        };
        let mut out = String::new();
        expr.print_formula(&mut out);
        assert_eq!(out, "1 - (2 - 3)");
    }

    #[test]
    fn get_cells_dedupes_and_preserves_order() {
        let expr = Expression::BinaryOp {
            left: Box::new(Expression::CellRef { col: "B".into(), row: 2 }),
            op: BinaryOperator::Add,
            right: Box::new(Expression::CellRef { col: "A".into(), row: 1 }),
        };
        let rebuilt = Expression::BinaryOp {
            left: Box::new(expr.clone()),
            op: BinaryOperator::Add,
            right: Box::new(Expression::CellRef { col: "B".into(), row: 2 }),
        };
        assert_eq!(
            rebuilt.get_cells(),
            vec![("B".to_string(), 2), ("A".to_string(), 1)]
        );
    }
}
