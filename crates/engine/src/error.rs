//! Error types for the engine.
//!
//! Two distinct populations: `FormulaError` is a legitimate evaluation
//! outcome that flows through cell values (and is cached like any result);
//! `SheetError` reports structural misuse (invalid positions, unparseable
//! formulas, cycle-introducing edits) and always leaves the sheet
//! unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::Position;

/// A formula evaluation error. Equality is by category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum FormulaError {
    /// A referenced position is outside the addressable area.
    #[error("#REF!")]
    Ref,
    /// A text operand could not be interpreted as a number.
    #[error("#VALUE!")]
    Value,
    /// Evaluation produced a non-finite result (division by zero, overflow).
    #[error("#ARITHM!")]
    Arithmetic,
}

/// A formula body that failed to tokenize or parse, with the diagnostic.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("formula parse error: {0}")]
pub struct FormulaParseError(pub String);

/// Errors from sheet operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SheetError {
    #[error("invalid position {0}")]
    InvalidPosition(Position),

    #[error(transparent)]
    Formula(#[from] FormulaParseError),

    /// The edit would make the cell at this position depend on itself.
    #[error("circular dependency at {0}")]
    CircularDependency(Position),
}

pub type Result<T> = std::result::Result<T, SheetError>;
