use chrono::{DateTime, Local};
use std::collections::VecDeque;

use crate::canvas::{CellPos, GridState};
use crate::components::colors::Color;
use crate::components::selection::FloatingLayer;

pub const DEFAULT_MAX_HISTORY: usize = 50;

// ============================================================================
// GRID PATCH - before/after capture used to build matrix actions
// ============================================================================

/// Row-major copy of a grid's colors taken before an operation, diffed against
/// the state after it to produce the minimal list of changed cells.
#[derive(Clone, Debug)]
pub struct GridPatch {
    rows: usize,
    cols: usize,
    cells: Vec<Color>,
}

impl GridPatch {
    pub fn capture(grid: &GridState) -> Self {
        Self::from_cells(grid.rows(), grid.cols(), grid.cells().to_vec())
    }

    pub fn from_cells(rows: usize, cols: usize, cells: Vec<Color>) -> Self {
        debug_assert_eq!(cells.len(), rows * cols);
        Self { rows, cols, cells }
    }

    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    /// Every cell whose color differs between `self` (before) and `after`.
    /// Patches of different shapes have no meaningful cell diff.
    pub fn diff(&self, after: &GridPatch) -> Vec<CellChange> {
        if self.rows != after.rows || self.cols != after.cols {
            crate::log_warn!(
                "GridPatch::diff: shape changed {}x{} -> {}x{}",
                self.rows,
                self.cols,
                after.rows,
                after.cols
            );
            return Vec::new();
        }
        self.cells
            .iter()
            .zip(after.cells.iter())
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(i, (old, new))| CellChange {
                pos: CellPos::new(i / self.cols, i % self.cols),
                old: *old,
                new: *new,
            })
            .collect()
    }
}

// ============================================================================
// MATRIX ACTION - the only kind of history entry
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellChange {
    pub pos: CellPos,
    pub old: Color,
    pub new: Color,
}

/// Floating layer an entry floats again when it is replayed.
#[derive(Clone, Debug)]
pub enum LayerRestore {
    /// The entry lifted this layer off the grid; redo floats it again.
    Detached(FloatingLayer),
    /// The entry merged this layer down; undo floats it again.
    Merged(FloatingLayer),
}

/// One undo step: the cells an operation changed, with their colors on
/// either side of it.
#[derive(Clone, Debug)]
pub struct MatrixAction {
    description: String,
    timestamp: DateTime<Local>,
    changes: Vec<CellChange>,
    layer: Option<LayerRestore>,
}

impl MatrixAction {
    pub fn new(description: impl Into<String>, changes: Vec<CellChange>) -> Self {
        Self {
            description: description.into(),
            timestamp: Local::now(),
            changes,
            layer: None,
        }
    }

    pub fn with_layer(mut self, layer: LayerRestore) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Build from a before-patch and the grid as it is now.
    pub fn from_patch(description: impl Into<String>, before: &GridPatch, after: &GridPatch) -> Self {
        Self::new(description, before.diff(after))
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn changes(&self) -> &[CellChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Layer to float once this entry has been undone.
    pub fn layer_after_undo(&self) -> Option<&FloatingLayer> {
        match &self.layer {
            Some(LayerRestore::Merged(layer)) => Some(layer),
            _ => None,
        }
    }

    /// Layer to float once this entry has been redone.
    pub fn layer_after_redo(&self) -> Option<&FloatingLayer> {
        match &self.layer {
            Some(LayerRestore::Detached(layer)) => Some(layer),
            _ => None,
        }
    }

    pub fn undo(&self, grid: &mut GridState) {
        for change in self.changes.iter().rev() {
            grid.set(change.pos, change.old);
        }
    }

    pub fn redo(&self, grid: &mut GridState) {
        for change in &self.changes {
            grid.set(change.pos, change.new);
        }
    }

    pub fn memory_size(&self) -> usize {
        let layer_cells = match &self.layer {
            Some(LayerRestore::Detached(layer) | LayerRestore::Merged(layer)) => layer.content.len(),
            None => 0,
        };
        self.changes.len() * std::mem::size_of::<CellChange>()
            + layer_cells * std::mem::size_of::<crate::components::selection::FloatingCell>()
            + self.description.len()
    }
}

// ============================================================================
// HISTORY MANAGER - Manages undo/redo stacks with size and memory limits
// ============================================================================

/// Undo/redo history.  Callers are responsible for committing any floating
/// selection before `undo`/`redo` so entries always apply to committed cells,
/// and for floating whatever layer the replayed entry hands back.
pub struct HistoryManager {
    undo_stack: VecDeque<MatrixAction>,
    redo_stack: VecDeque<MatrixAction>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size: max_history_size.max(1),
            max_memory_bytes: Some(16 * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// Record a new action.  Empty actions are dropped; anything else clears
    /// the redo stack.  Returns whether the action was kept.
    pub fn push(&mut self, action: MatrixAction) -> bool {
        if action.is_empty() {
            return false;
        }
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        crate::log_info!("History: {} ({} cells)", action.description(), action.changes().len());
        self.total_memory += action.memory_size();
        self.undo_stack.push_back(action);

        self.prune();
        true
    }

    /// Revert the latest entry and return it.
    pub fn undo(&mut self, grid: &mut GridState) -> Option<&MatrixAction> {
        let action = self.undo_stack.pop_back()?;
        action.undo(grid);
        self.redo_stack.push_back(action);
        self.redo_stack.back()
    }

    /// Reapply the latest undone entry and return it.
    pub fn redo(&mut self, grid: &mut GridState) -> Option<&MatrixAction> {
        let action = self.redo_stack.pop_back()?;
        action.redo(grid);
        self.undo_stack.push_back(action);
        self.undo_stack.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|a| a.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|a| a.description())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|a| a.description().to_string()).collect()
    }

    /// Undo entries, most recent first.
    pub fn undo_actions(&self) -> impl Iterator<Item = &MatrixAction> {
        self.undo_stack.iter().rev()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }

    /// Drop both stacks (resize, import).  An immediate `undo` is then a no-op.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}
