//! Dependency graph for formula cells.
//!
//! Tracks which cells a formula references and which formulas reference a
//! given cell, for cycle detection on edit and cache invalidation after.
//!
//! # Edge Direction
//!
//! ```text
//! A ∈ preds[B]  means  "B references A"  (A is a precedent of B)
//! B ∈ succs[A]  means  the same edge, seen from A (B is a dependent of A)
//! ```
//!
//! Nodes are positions, not cell handles, so a cell that has been removed
//! from the sheet (or never materialized) participates with no edges and
//! nothing dangles.
//!
//! # Invariants
//!
//! 1. **Bidirectional consistency:** A ∈ preds[B] ⇔ B ∈ succs[A].
//! 2. **No dangling entries:** empty sets are removed, not stored.
//! 3. **No duplicate edges:** set semantics enforced by FxHashSet.
//! 4. **Atomic updates:** `replace_edges` is the only mutator.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// For each formula cell B, the cells it references (its out-edges).
    preds: FxHashMap<Position, FxHashSet<Position>>,

    /// For each referenced cell A, the formula cells referencing it (its
    /// in-edges).
    succs: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells this cell directly references.
    pub fn precedents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Cells that directly reference this cell.
    pub fn dependents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True iff at least one formula references this cell.
    pub fn is_referenced(&self, cell: Position) -> bool {
        self.succs.contains_key(&cell)
    }

    /// Replace all outgoing edges of a cell atomically:
    /// 1. remove the cell from all its old precedents' dependent sets,
    /// 2. clear its precedent set,
    /// 3. install the new edges in both directions.
    ///
    /// Pass an empty set to disconnect the cell (content became non-formula
    /// or the cell was cleared).
    pub fn replace_edges(&mut self, cell: Position, new_preds: FxHashSet<Position>) {
        if let Some(old_preds) = self.preds.remove(&cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&cell);
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        if new_preds.is_empty() {
            return;
        }

        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(cell);
        }

        self.preds.insert(cell, new_preds);
    }

    /// Disconnect a cell entirely.
    pub fn clear_cell(&mut self, cell: Position) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Would giving `cell` the outgoing edges `new_refs` close a cycle?
    ///
    /// Walks from `cell` in the dependents direction ("who reads me",
    /// transitively) with a visited set; a cycle exists iff the walk meets a
    /// member of `new_refs`. Self-reference falls out of the same test since
    /// `cell` is visited first. Cells that exist nowhere yet have no edges
    /// and can never be reached, so checking before they are materialized is
    /// sound.
    pub fn would_cycle(&self, cell: Position, new_refs: &[Position]) -> bool {
        if new_refs.is_empty() {
            return false;
        }
        let targets: FxHashSet<Position> = new_refs.iter().copied().collect();

        let mut visited = FxHashSet::default();
        let mut to_visit = vec![cell];
        while let Some(current) = to_visit.pop() {
            if !visited.insert(current) {
                continue;
            }
            if targets.contains(&current) {
                return true;
            }
            if let Some(deps) = self.succs.get(&current) {
                to_visit.extend(deps.iter().copied());
            }
        }
        false
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (cell, preds) in &self.preds {
            assert!(!preds.is_empty(), "empty pred set stored for {}", cell);
            for pred in preds {
                assert!(
                    self.succs.get(pred).is_some_and(|s| s.contains(cell)),
                    "edge {} -> {} missing its reverse",
                    cell,
                    pred
                );
            }
        }
        for (cell, succs) in &self.succs {
            assert!(!succs.is_empty(), "empty succ set stored for {}", cell);
            for succ in succs {
                assert!(
                    self.preds.get(succ).is_some_and(|s| s.contains(cell)),
                    "edge {} <- {} missing its forward",
                    cell,
                    succ
                );
            }
        }
    }
}
