//! Parsed formulas.
//!
//! A `Formula` owns the expression tree for one cell plus the list of
//! positions the expression references, extracted once at parse time.

pub mod eval;
pub mod parser;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{FormulaError, FormulaParseError};
use crate::position::Position;

use self::eval::CellLookup;
use self::parser::Expr;

/// A parsed formula body (the text after the formula sign).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    expr: Expr,
    refs: Vec<Position>,
}

impl Formula {
    /// Parse a formula body. Any tokenizer or parser diagnostic is wrapped
    /// into a `FormulaParseError`.
    pub fn parse(body: &str) -> Result<Self, FormulaParseError> {
        let expr = parser::parse(body).map_err(FormulaParseError)?;
        let refs = collect_refs(&expr);
        Ok(Self { expr, refs })
    }

    /// Evaluate against a cell lookup, returning a finite number or a
    /// formula error. Never mutates the lookup.
    pub fn evaluate<L: CellLookup>(&self, lookup: &L) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, lookup)
    }

    /// Valid positions this formula references, deduplicated, in order of
    /// first occurrence (depth-first, left to right). Out-of-range
    /// references stay in the AST and surface as #REF! at evaluation.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.refs
    }

    /// Canonical text form, without the leading formula sign.
    pub fn expression(&self) -> String {
        self.expr.to_string()
    }
}

/// Walk the AST left to right, keeping the first occurrence of each valid
/// referenced position.
fn collect_refs(expr: &Expr) -> Vec<Position> {
    let mut refs = Vec::new();
    let mut seen = FxHashSet::default();
    walk_refs(expr, &mut refs, &mut seen);
    refs
}

fn walk_refs(expr: &Expr, refs: &mut Vec<Position>, seen: &mut FxHashSet<Position>) {
    match expr {
        Expr::Number(_) => {}
        Expr::CellRef(pos) => {
            if pos.is_valid() && seen.insert(*pos) {
                refs.push(*pos);
            }
        }
        Expr::UnaryOp { operand, .. } => walk_refs(operand, refs, seen),
        Expr::BinaryOp { left, right, .. } => {
            walk_refs(left, refs, seen);
            walk_refs(right, refs, seen);
        }
    }
}
