//! The sheet: a sparse map of positions to cells, and the mutation entry
//! point that keeps the dependency graph and caches consistent.
//!
//! Edits follow a check-then-commit protocol: parse the new content, prove
//! the edit closes no cycle, and only then rewire edges and force-invalidate
//! every transitive dependent's cache. A rejected edit leaves every cell's
//! content, edges and caches untouched, except that a position touched by
//! `set_cell` stays allocated as a blank cell. That allocation is deliberate
//! and observable.

use std::collections::HashMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellContent, CellValue};
use crate::dep_graph::DepGraph;
use crate::error::{Result, SheetError};
use crate::formula::eval::CellLookup;
use crate::position::{Position, Size};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    cells: HashMap<Position, Cell>,
    /// Derived from cell contents; rebuilt after deserialization.
    #[serde(skip)]
    deps: DepGraph,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cell at `pos` from input text: empty text for an empty cell,
    /// a leading formula sign for a formula, anything else for literal text.
    ///
    /// Fails with `InvalidPosition` for an out-of-range position, `Formula`
    /// when a formula body does not parse, and `CircularDependency` when the
    /// edit would make `pos` reachable from its own references. On failure
    /// the previous content, edges and caches are unchanged.
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<()> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        // Touched positions stay allocated even if the edit fails below.
        self.cells.entry(pos).or_default();

        let content = CellContent::from_input(text)?;
        let new_refs = content.referenced_cells().to_vec();
        if self.deps.would_cycle(pos, &new_refs) {
            return Err(SheetError::CircularDependency(pos));
        }

        // Commit: materialize blank referents, rewire, install, invalidate.
        for &referent in &new_refs {
            self.cells.entry(referent).or_default();
        }
        self.deps.replace_edges(pos, new_refs.into_iter().collect());
        if let Some(cell) = self.cells.get_mut(&pos) {
            cell.set_content(content);
        }
        self.invalidate_from(pos);
        Ok(())
    }

    /// Read-only view of the cell at `pos`, `None` when the position has
    /// never been touched (or has been cleared).
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        Ok(self.cells.get(&pos))
    }

    /// Lazily evaluated value of the cell at `pos`.
    pub fn value(&self, pos: Position) -> Result<Option<CellValue>> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        Ok(self.cells.get(&pos).map(|cell| cell.value(self)))
    }

    /// Clear the cell at `pos`. Equivalent to `set_cell(pos, "")` followed
    /// by removal of the entry: outgoing edges are severed, dependents'
    /// caches force-invalidated, and the position reads back as `None`.
    /// Clearing an untouched position is a no-op, so clearing is idempotent.
    pub fn clear_cell(&mut self, pos: Position) -> Result<()> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        if self.cells.remove(&pos).is_some() {
            self.deps.clear_cell(pos);
            self.invalidate_from(pos);
        }
        Ok(())
    }

    /// Smallest (rows, cols) extent covering every non-empty cell; `{0,0}`
    /// for a sheet with none. Blank cells materialized by reference stay
    /// allocated but do not extend the printable area.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for (pos, cell) in &self.cells {
            if cell.is_empty() {
                continue;
            }
            size.rows = size.rows.max(pos.row + 1);
            size.cols = size.cols.max(pos.col + 1);
        }
        size
    }

    /// True iff some formula cell references `pos` directly.
    pub fn is_referenced(&self, pos: Position) -> bool {
        self.deps.is_referenced(pos)
    }

    /// Recompute the dependency graph from cell contents. Needed after
    /// deserialization, where the graph (and every cache) is skipped.
    pub fn rebuild_deps(&mut self) {
        let mut deps = DepGraph::new();
        for (&pos, cell) in &self.cells {
            let refs: FxHashSet<Position> = cell.referenced_cells().iter().copied().collect();
            deps.replace_edges(pos, refs);
        }
        self.deps = deps;
    }

    /// Force-invalidate the caches of `start` and every transitive
    /// dependent. Visited set terminates diamonds; caches already absent are
    /// "cleared" again, which normalizes state. No re-evaluation happens
    /// here; the next `value` read is lazy.
    fn invalidate_from(&self, start: Position) {
        let mut visited = FxHashSet::default();
        let mut to_visit = vec![start];
        while let Some(current) = to_visit.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(cell) = self.cells.get(&current) {
                cell.invalidate_cache();
            }
            to_visit.extend(self.deps.dependents(current));
        }
    }
}

impl CellLookup for Sheet {
    fn cell_value(&self, pos: Position) -> Option<CellValue> {
        self.cells.get(&pos).map(|cell| cell.value(self))
    }
}
