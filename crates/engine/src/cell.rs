//! Cell content and values.
//!
//! A cell holds one of three content variants: empty, literal text, or a
//! parsed formula. Formula cells carry a memoized evaluation result behind a
//! `RefCell` so the read path can populate it without a mutable receiver;
//! the sheet is responsible for invalidating it when upstream cells change.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

use crate::error::{FormulaError, FormulaParseError};
use crate::formula::eval::CellLookup;
use crate::formula::Formula;
use crate::position::Position;

/// Leading character that marks the rest of the input as a formula body.
pub const FORMULA_SIGN: char = '=';
/// Leading character stripped from a text cell's value (but not its raw
/// text), letting users display literals that start with the formula sign.
pub const ESCAPE_SIGN: char = '\'';

/// What a cell evaluates to. Text and empty cells always yield `Text`; only
/// formula cells yield `Number` or `Error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl From<Result<f64, FormulaError>> for CellValue {
    fn from(result: Result<f64, FormulaError>) -> Self {
        match result {
            Ok(n) => CellValue::Number(n),
            Err(e) => CellValue::Error(e),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// The closed set of things a cell can contain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum CellContent {
    #[default]
    Empty,
    /// Raw text as entered, escape sign included.
    Text(String),
    Formula {
        formula: Formula,
        /// Last evaluation result; `None` when stale or never computed.
        #[serde(skip)]
        cache: RefCell<Option<Result<f64, FormulaError>>>,
    },
}

impl CellContent {
    /// Dispatch on the leading character of the input: empty input is the
    /// Empty variant, a formula sign selects formula parsing, anything else
    /// is literal text. Text content is therefore never the empty string.
    pub fn from_input(text: &str) -> Result<Self, FormulaParseError> {
        if text.is_empty() {
            return Ok(CellContent::Empty);
        }
        if let Some(body) = text.strip_prefix(FORMULA_SIGN) {
            let formula = Formula::parse(body)?;
            return Ok(CellContent::Formula {
                formula,
                cache: RefCell::new(None),
            });
        }
        Ok(CellContent::Text(text.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Empty)
    }

    /// Valid positions referenced by this content; empty for Empty and Text.
    pub fn referenced_cells(&self) -> &[Position] {
        match self {
            CellContent::Formula { formula, .. } => formula.referenced_cells(),
            _ => &[],
        }
    }
}

/// One grid entry, owned by a sheet.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cell {
    content: CellContent,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub(crate) fn set_content(&mut self, content: CellContent) {
        self.content = content;
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Raw text as entered: `""` for empty cells, the original string for
    /// text cells, the formula sign plus the canonical expression for
    /// formula cells.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula { formula, .. } => {
                format!("{}{}", FORMULA_SIGN, formula.expression())
            }
        }
    }

    /// Evaluate the cell. Formula results are memoized: the cached value is
    /// returned if present, otherwise the formula is evaluated through
    /// `lookup` and the result stored.
    pub fn value<L: CellLookup>(&self, lookup: &L) -> CellValue {
        match &self.content {
            CellContent::Empty => CellValue::Text(String::new()),
            CellContent::Text(s) => match s.strip_prefix(ESCAPE_SIGN) {
                Some(rest) => CellValue::Text(rest.to_string()),
                None => CellValue::Text(s.clone()),
            },
            CellContent::Formula { formula, cache } => {
                if let Some(result) = *cache.borrow() {
                    return result.into();
                }
                // Not held across the recursive evaluation below: dependency
                // cells have their own caches.
                let result = formula.evaluate(lookup);
                *cache.borrow_mut() = Some(result);
                result.into()
            }
        }
    }

    pub fn referenced_cells(&self) -> &[Position] {
        self.content.referenced_cells()
    }

    /// True when a formula cell holds a memoized result. Empty and text
    /// cells have no cache; their value is pure from their content.
    pub fn is_cached(&self) -> bool {
        match &self.content {
            CellContent::Formula { cache, .. } => cache.borrow().is_some(),
            _ => false,
        }
    }

    /// Drop the memoized result, if any.
    pub fn invalidate_cache(&self) {
        if let CellContent::Formula { cache, .. } = &self.content {
            *cache.borrow_mut() = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Lookup that counts how many times it is consulted, for cache tests.
    #[derive(Default)]
    struct CountingLookup {
        values: HashMap<Position, CellValue>,
        hits: RefCell<usize>,
    }

    impl CellLookup for CountingLookup {
        fn cell_value(&self, pos: Position) -> Option<CellValue> {
            *self.hits.borrow_mut() += 1;
            self.values.get(&pos).cloned()
        }
    }

    fn cell(input: &str) -> Cell {
        let mut cell = Cell::new();
        cell.set_content(CellContent::from_input(input).unwrap());
        cell
    }

    #[test]
    fn test_from_input_dispatch() {
        assert!(matches!(CellContent::from_input("").unwrap(), CellContent::Empty));
        assert!(matches!(CellContent::from_input("hi").unwrap(), CellContent::Text(_)));
        assert!(matches!(
            CellContent::from_input("=1+2").unwrap(),
            CellContent::Formula { .. }
        ));
        // A lone formula sign is an empty body, which does not parse
        assert!(CellContent::from_input("=").is_err());
    }

    #[test]
    fn test_text_round_trip() {
        let lookup = CountingLookup::default();
        let c = cell("hello");
        assert_eq!(c.text(), "hello");
        assert_eq!(c.value(&lookup), CellValue::Text("hello".into()));
    }

    #[test]
    fn test_escape_sign_stripped_from_value_only() {
        let lookup = CountingLookup::default();
        let c = cell("'=notformula");
        assert_eq!(c.text(), "'=notformula");
        assert_eq!(c.value(&lookup), CellValue::Text("=notformula".into()));
        // Only one escape sign is stripped
        let c = cell("''quoted");
        assert_eq!(c.value(&lookup), CellValue::Text("'quoted".into()));
    }

    #[test]
    fn test_empty_cell_value_is_empty_text() {
        let lookup = CountingLookup::default();
        let c = Cell::new();
        assert_eq!(c.text(), "");
        assert_eq!(c.value(&lookup), CellValue::Text(String::new()));
        assert!(!c.is_cached());
    }

    #[test]
    fn test_formula_text_is_canonical() {
        let c = cell("= 1 + a1 ");
        assert_eq!(c.text(), "=1+A1");
    }

    #[test]
    fn test_formula_value_is_memoized() {
        let lookup = CountingLookup::default();
        let c = cell("=A1+A1");
        assert!(!c.is_cached());

        assert_eq!(c.value(&lookup), CellValue::Number(0.0));
        assert!(c.is_cached());
        let hits_after_first = *lookup.hits.borrow();
        assert!(hits_after_first > 0);

        // Second read must not consult the lookup again
        assert_eq!(c.value(&lookup), CellValue::Number(0.0));
        assert_eq!(*lookup.hits.borrow(), hits_after_first);
    }

    #[test]
    fn test_errors_are_cached_like_results() {
        let lookup = CountingLookup::default();
        let c = cell("=1/0");
        assert_eq!(c.value(&lookup), CellValue::Error(FormulaError::Arithmetic));
        assert!(c.is_cached());
    }

    #[test]
    fn test_invalidate_cache_forces_reevaluation() {
        let mut lookup = CountingLookup::default();
        let a1 = Position::new(0, 0);
        lookup.values.insert(a1, CellValue::Number(5.0));

        let c = cell("=A1");
        assert_eq!(c.value(&lookup), CellValue::Number(5.0));

        lookup.values.insert(a1, CellValue::Number(7.0));
        // Stale until invalidated
        assert_eq!(c.value(&lookup), CellValue::Number(5.0));
        c.invalidate_cache();
        assert_eq!(c.value(&lookup), CellValue::Number(7.0));
    }

    #[test]
    fn test_referenced_cells_pass_through() {
        let c = cell("=B1+A1");
        assert_eq!(
            c.referenced_cells(),
            &[Position::new(0, 1), Position::new(0, 0)]
        );
        assert!(cell("plain").referenced_cells().is_empty());
    }
}
