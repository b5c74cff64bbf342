// Formula evaluator - walks the AST against a cell lookup service

use crate::cell::CellValue;
use crate::error::FormulaError;
use crate::position::Position;

use super::parser::{Expr, Op, UnaryOp};

/// Read-only cell lookup used during evaluation. The sheet implements this;
/// tests substitute table-backed fakes.
pub trait CellLookup {
    /// The lazily evaluated value of the cell at `pos`, or `None` when no
    /// cell exists there.
    fn cell_value(&self, pos: Position) -> Option<CellValue>;
}

/// Evaluate an expression to a finite number or a formula error.
///
/// Operand errors propagate leftmost-first; any non-finite result (overflow,
/// division by zero, a non-finite operand leaking out of a text cell)
/// becomes `Arithmetic`.
pub fn evaluate<L: CellLookup>(expr: &Expr, lookup: &L) -> Result<f64, FormulaError> {
    finite(eval_expr(expr, lookup)?)
}

fn eval_expr<L: CellLookup>(expr: &Expr, lookup: &L) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => resolve_ref(*pos, lookup),
        Expr::UnaryOp { op, operand } => {
            let v = eval_expr(operand, lookup)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::BinaryOp { op, left, right } => {
            let l = eval_expr(left, lookup)?;
            let r = eval_expr(right, lookup)?;
            finite(match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => l / r,
            })
        }
    }
}

fn finite(n: f64) -> Result<f64, FormulaError> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(FormulaError::Arithmetic)
    }
}

/// Coerce a referenced cell to a number:
/// missing or empty cell -> 0.0, number -> itself, text -> full-string parse
/// (empty text -> 0.0, failure -> #VALUE!), error -> propagated unchanged,
/// invalid position -> #REF!.
fn resolve_ref<L: CellLookup>(pos: Position, lookup: &L) -> Result<f64, FormulaError> {
    if !pos.is_valid() {
        return Err(FormulaError::Ref);
    }
    match lookup.cell_value(pos) {
        None => Ok(0.0),
        Some(CellValue::Number(n)) => Ok(n),
        Some(CellValue::Error(e)) => Err(e),
        Some(CellValue::Text(s)) => {
            if s.is_empty() {
                Ok(0.0)
            } else {
                s.parse::<f64>().map_err(|_| FormulaError::Value)
            }
        }
    }
}
