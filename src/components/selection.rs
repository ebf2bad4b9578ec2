use crate::canvas::{CellPos, GridState};
use crate::components::colors::Color;
use crate::components::history::{CellChange, GridPatch, LayerRestore, MatrixAction};
use crate::ops::clipboard::ClipboardData;

// ============================================================================
// SELECTION RECTANGLE
// ============================================================================

/// Inclusive, normalized rectangle of grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionRect {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl SelectionRect {
    pub fn from_corners(a: CellPos, b: CellPos) -> Self {
        Self {
            min_row: a.row.min(b.row),
            max_row: a.row.max(b.row),
            min_col: a.col.min(b.col),
            max_col: a.col.max(b.col),
        }
    }

    pub fn whole_grid(grid: &GridState) -> Self {
        Self {
            min_row: 0,
            max_row: grid.rows() - 1,
            min_col: 0,
            max_col: grid.cols() - 1,
        }
    }

    pub fn contains(&self, pos: CellPos) -> bool {
        (self.min_row..=self.max_row).contains(&pos.row) && (self.min_col..=self.max_col).contains(&pos.col)
    }

    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    /// Row-major positions inside the rectangle.
    pub fn positions(&self) -> impl Iterator<Item = CellPos> {
        let (min_col, max_col) = (self.min_col, self.max_col);
        (self.min_row..=self.max_row).flat_map(move |row| (min_col..=max_col).map(move |col| CellPos::new(row, col)))
    }

    /// Part of the rectangle that lies inside the grid.
    pub fn clipped(&self, grid: &GridState) -> Option<Self> {
        if self.min_row >= grid.rows() || self.min_col >= grid.cols() {
            return None;
        }
        Some(Self {
            max_row: self.max_row.min(grid.rows() - 1),
            max_col: self.max_col.min(grid.cols() - 1),
            ..*self
        })
    }
}

// ============================================================================
// FLOATING LAYER - detached copy of a selected rectangle
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloatingCell {
    pub rel_row: i32,
    pub rel_col: i32,
    pub color: Color,
}

/// Content lifted out of the grid.  Its colors live only here until merged;
/// the footprint stays a full rectangle for its whole life.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloatingLayer {
    /// Current top-left, in grid coordinates.  May hang off the grid after a move.
    pub anchor: (i32, i32),
    pub content: Vec<FloatingCell>,
}

impl FloatingLayer {
    /// Lift every cell of `rect` (background included) out of `grid`,
    /// clearing the source cells to background.  Also returns the cells the
    /// clearing changed.
    fn detach(grid: &mut GridState, rect: SelectionRect) -> (Self, Vec<CellChange>) {
        let mut content = Vec::with_capacity(rect.width() * rect.height());
        let mut cleared = Vec::new();
        for pos in rect.positions() {
            let Some(color) = grid.get(pos) else { continue };
            content.push(FloatingCell {
                rel_row: (pos.row - rect.min_row) as i32,
                rel_col: (pos.col - rect.min_col) as i32,
                color,
            });
            if grid.set(pos, Color::BACKGROUND) {
                cleared.push(CellChange { pos, old: color, new: Color::BACKGROUND });
            }
        }
        let layer = Self {
            anchor: (rect.min_row as i32, rect.min_col as i32),
            content,
        };
        (layer, cleared)
    }

    /// `(min_rel_row, max_rel_row, min_rel_col, max_rel_col)`.
    pub fn rel_bounds(&self) -> (i32, i32, i32, i32) {
        self.content.iter().fold(
            (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
            |(r0, r1, c0, c1), cell| {
                (r0.min(cell.rel_row), r1.max(cell.rel_row), c0.min(cell.rel_col), c1.max(cell.rel_col))
            },
        )
    }

    /// Absolute `(row, col)` of a content entry.
    fn absolute(&self, cell: &FloatingCell) -> (i64, i64) {
        (
            self.anchor.0 as i64 + cell.rel_row as i64,
            self.anchor.1 as i64 + cell.rel_col as i64,
        )
    }

    /// Whether `pos` lies on the layer's displayed footprint.
    pub fn footprint_contains(&self, pos: CellPos) -> bool {
        if self.content.is_empty() {
            return false;
        }
        let (r0, r1, c0, c1) = self.rel_bounds();
        let (row, col) = (pos.row as i64 - self.anchor.0 as i64, pos.col as i64 - self.anchor.1 as i64);
        (r0 as i64..=r1 as i64).contains(&row) && (c0 as i64..=c1 as i64).contains(&col)
    }

    pub fn color_at(&self, pos: CellPos) -> Option<Color> {
        self.content
            .iter()
            .find(|cell| self.absolute(cell) == (pos.row as i64, pos.col as i64))
            .map(|cell| cell.color)
    }

    /// Paint the layer's visible (non-background) colors onto a row-major
    /// buffer of `cols` columns.  Off-grid entries are skipped.
    pub fn overlay_onto(&self, cells: &mut [Color], rows: usize, cols: usize) {
        for cell in &self.content {
            if cell.color.is_background() {
                continue;
            }
            let (row, col) = self.absolute(cell);
            if row < 0 || col < 0 || row as usize >= rows || col as usize >= cols {
                continue;
            }
            cells[row as usize * cols + col as usize] = cell.color;
        }
    }

    fn flip_horizontal(&mut self) {
        let (_, _, min_c, max_c) = self.rel_bounds();
        for cell in &mut self.content {
            cell.rel_col = max_c - (cell.rel_col - min_c);
        }
    }

    fn flip_vertical(&mut self) {
        let (min_r, max_r, _, _) = self.rel_bounds();
        for cell in &mut self.content {
            cell.rel_row = max_r - (cell.rel_row - min_r);
        }
    }

    fn to_clipboard(&self) -> ClipboardData {
        let (r0, r1, c0, c1) = self.rel_bounds();
        let mut block = ClipboardData::new((c1 - c0 + 1) as usize, (r1 - r0 + 1) as usize);
        for cell in &self.content {
            block.set((cell.rel_row - r0) as usize, (cell.rel_col - c0) as usize, Some(cell.color));
        }
        block
    }

    /// Write non-background content into the grid at the current anchor and
    /// return the cells that changed.  Background entries never overwrite
    /// what is underneath.
    fn merge_into(&self, grid: &mut GridState) -> Vec<CellChange> {
        let mut written = Vec::new();
        for cell in &self.content {
            if cell.color.is_background() {
                continue;
            }
            let (row, col) = self.absolute(cell);
            let Some(old) = grid.get_signed(row, col) else { continue };
            let pos = CellPos::new(row as usize, col as usize);
            if grid.set(pos, cell.color) {
                written.push(CellChange { pos, old, new: cell.color });
            }
        }
        written
    }
}

// ============================================================================
// SELECTION TOOL - state machine over the rectangle and floating layer
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionPhase {
    Idle,
    /// Dragging out a rectangle from `start`.
    Selecting { start: CellPos },
    /// A floating layer exists and is at rest.
    Floating,
    /// Dragging the floating layer; `last` is the previous drag sample.
    Moving { last: CellPos },
}

/// Invariant: `floating.is_some()` exactly when the phase is `Floating` or
/// `Moving`.  At most one floating layer exists at a time.
///
/// Detaching and merging write to the grid on their own, so they leave
/// their history entries in `journal` for the owner to collect with
/// [`SelectionTool::take_journal`].
#[derive(Clone, Debug)]
pub struct SelectionTool {
    phase: SelectionPhase,
    /// Highlighted plain selection (while dragging, or after select-all).
    rect: Option<SelectionRect>,
    floating: Option<FloatingLayer>,
    journal: Vec<MatrixAction>,
}

impl Default for SelectionTool {
    fn default() -> Self {
        Self {
            phase: SelectionPhase::Idle,
            rect: None,
            floating: None,
            journal: Vec::new(),
        }
    }
}

impl SelectionTool {
    pub fn phase(&self) -> SelectionPhase {
        self.phase
    }

    pub fn rect(&self) -> Option<SelectionRect> {
        self.rect
    }

    pub fn floating(&self) -> Option<&FloatingLayer> {
        self.floating.as_ref()
    }

    pub fn is_floating(&self) -> bool {
        self.floating.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, SelectionPhase::Selecting { .. } | SelectionPhase::Moving { .. })
    }

    pub fn has_selection(&self) -> bool {
        self.rect.is_some() || self.floating.is_some()
    }

    /// History entries left by detaches and merges since the last call,
    /// oldest first.
    pub fn take_journal(&mut self) -> Vec<MatrixAction> {
        std::mem::take(&mut self.journal)
    }

    // ------------------------------------------------------------------
    // Pointer-driven transitions
    // ------------------------------------------------------------------

    /// Pointer pressed: grab the floating layer if `pos` is on it, otherwise
    /// start a new rectangle.
    pub fn pointer_down(&mut self, grid: &mut GridState, pos: CellPos) {
        if self.floating.as_ref().is_some_and(|f| f.footprint_contains(pos)) {
            self.begin_move(pos);
        } else {
            self.begin_select(grid, pos);
        }
    }

    pub fn pointer_drag(&mut self, pos: CellPos) {
        match self.phase {
            SelectionPhase::Selecting { .. } => self.drag_select(pos),
            SelectionPhase::Moving { .. } => self.drag_move(pos),
            _ => {}
        }
    }

    pub fn pointer_up(&mut self, grid: &mut GridState) {
        match self.phase {
            SelectionPhase::Selecting { .. } => {
                self.commit_select(grid);
            }
            SelectionPhase::Moving { .. } => self.end_move(),
            _ => {}
        }
    }

    /// Start a rectangle at `pos`.  A floating layer that does not cover
    /// `pos` is merged first.
    pub fn begin_select(&mut self, grid: &mut GridState, pos: CellPos) {
        if self.floating.as_ref().is_some_and(|f| !f.footprint_contains(pos)) {
            self.merge(grid);
        }
        self.rect = Some(SelectionRect::from_corners(pos, pos));
        self.phase = SelectionPhase::Selecting { start: pos };
    }

    /// Stretch the rectangle so it spans exactly `start..=pos`.
    pub fn drag_select(&mut self, pos: CellPos) {
        if let SelectionPhase::Selecting { start } = self.phase {
            self.rect = Some(SelectionRect::from_corners(start, pos));
        }
    }

    /// Finish the drag: lift the rectangle into a floating layer and clear
    /// its source cells.  Returns whether a layer was created.
    pub fn commit_select(&mut self, grid: &mut GridState) -> bool {
        if !matches!(self.phase, SelectionPhase::Selecting { .. }) {
            return false;
        }
        let Some(rect) = self.rect.take().and_then(|r| r.clipped(grid)) else {
            self.phase = SelectionPhase::Idle;
            return false;
        };
        if self.floating.is_some() {
            self.merge(grid);
        }
        let (layer, cleared) = FloatingLayer::detach(grid, rect);
        crate::log_info!(
            "Floating layer created: {}x{} at ({}, {})",
            rect.height(),
            rect.width(),
            rect.min_row,
            rect.min_col
        );
        if !cleared.is_empty() {
            self.journal
                .push(MatrixAction::new("Select", cleared).with_layer(LayerRestore::Detached(layer.clone())));
        }
        self.floating = Some(layer);
        self.phase = SelectionPhase::Floating;
        true
    }

    /// Grab the floating layer at `pos`.  Ignored unless `pos` is on it.
    pub fn begin_move(&mut self, pos: CellPos) -> bool {
        let on_layer = self.floating.as_ref().is_some_and(|f| f.footprint_contains(pos));
        if on_layer {
            self.phase = SelectionPhase::Moving { last: pos };
        }
        on_layer
    }

    /// Shift the anchor by the delta since the previous drag sample.
    pub fn drag_move(&mut self, pos: CellPos) {
        let SelectionPhase::Moving { last } = self.phase else { return };
        if let Some(layer) = self.floating.as_mut() {
            let d_row = pos.row as i32 - last.row as i32;
            let d_col = pos.col as i32 - last.col as i32;
            layer.anchor = (layer.anchor.0 + d_row, layer.anchor.1 + d_col);
        }
        self.phase = SelectionPhase::Moving { last: pos };
    }

    pub fn end_move(&mut self) {
        if matches!(self.phase, SelectionPhase::Moving { .. }) {
            self.phase = SelectionPhase::Floating;
        }
    }

    // ------------------------------------------------------------------
    // Content operations
    // ------------------------------------------------------------------

    /// Paint every selected cell `color`: the floating content if present,
    /// otherwise the highlighted rectangle directly in the grid.
    pub fn recolor(&mut self, grid: &mut GridState, color: Color) -> bool {
        if let Some(layer) = self.floating.as_mut() {
            for cell in &mut layer.content {
                cell.color = color;
            }
            return true;
        }
        let Some(rect) = self.rect else { return false };
        let mut changed = false;
        for pos in rect.positions() {
            changed |= grid.set(pos, color);
        }
        changed
    }

    pub fn flip_horizontal(&mut self) -> bool {
        let Some(layer) = self.floating.as_mut() else { return false };
        layer.flip_horizontal();
        true
    }

    pub fn flip_vertical(&mut self) -> bool {
        let Some(layer) = self.floating.as_mut() else { return false };
        layer.flip_vertical();
        true
    }

    /// Blank the selection but keep its footprint.  A plain rectangle is
    /// cleared in the grid directly.
    pub fn clear_content(&mut self, grid: &mut GridState) -> bool {
        if let Some(layer) = self.floating.as_mut() {
            for cell in &mut layer.content {
                cell.color = Color::BACKGROUND;
            }
            return true;
        }
        let Some(rect) = self.rect else { return false };
        let mut changed = false;
        for pos in rect.positions() {
            changed |= grid.set(pos, Color::BACKGROUND);
        }
        changed
    }

    /// Commit the floating layer into the grid at its anchor and return to
    /// `Idle`.  Journals one entry when any cell was written.
    pub fn merge(&mut self, grid: &mut GridState) -> bool {
        let Some(layer) = self.floating.take() else { return false };
        let written = layer.merge_into(grid);
        crate::log_info!(
            "Floating layer merged at ({}, {}), {} cells written",
            layer.anchor.0,
            layer.anchor.1,
            written.len()
        );
        self.phase = SelectionPhase::Idle;
        self.rect = None;
        if written.is_empty() {
            return false;
        }
        self.journal
            .push(MatrixAction::new("Merge selection", written).with_layer(LayerRestore::Merged(layer)));
        true
    }

    /// Merge without journaling.  Used right before an undo or redo, which
    /// replays entries against fully committed cells.
    pub fn flatten(&mut self, grid: &mut GridState) {
        if let Some(layer) = self.floating.take() {
            layer.merge_into(grid);
        }
        self.phase = SelectionPhase::Idle;
        self.rect = None;
    }

    /// Float `layer` again after history replayed the entry that owned it.
    pub fn restore_floating(&mut self, layer: FloatingLayer) {
        self.floating = Some(layer);
        self.rect = None;
        self.phase = SelectionPhase::Floating;
    }

    /// Rectangular copy of the floating content, or of the highlighted
    /// rectangle's grid colors.
    pub fn copy(&self, grid: &GridState) -> Option<ClipboardData> {
        if let Some(layer) = self.floating.as_ref().filter(|l| !l.content.is_empty()) {
            return Some(layer.to_clipboard());
        }
        let rect = self.rect?.clipped(grid)?;
        let mut block = ClipboardData::new(rect.width(), rect.height());
        for pos in rect.positions() {
            block.set(pos.row - rect.min_row, pos.col - rect.min_col, grid.get(pos));
        }
        Some(block)
    }

    /// Copy, then remove.  A floating layer is discarded without touching the
    /// grid; a plain rectangle is cleared to background.
    pub fn cut(&mut self, grid: &mut GridState) -> Option<ClipboardData> {
        let block = self.copy(grid)?;
        if self.floating.take().is_some() {
            crate::log_info!("Floating layer cut");
        } else if let Some(rect) = self.rect {
            for pos in rect.positions() {
                grid.set(pos, Color::BACKGROUND);
            }
        }
        self.rect = None;
        self.phase = SelectionPhase::Idle;
        Some(block)
    }

    /// Highlight the whole grid as a plain selection.
    pub fn select_all(&mut self, grid: &mut GridState) {
        self.merge(grid);
        self.rect = Some(SelectionRect::whole_grid(grid));
        self.phase = SelectionPhase::Idle;
    }

    /// Commit any floating layer and drop every highlight.
    pub fn clear_selection(&mut self, grid: &mut GridState) {
        self.merge(grid);
        self.rect = None;
        self.phase = SelectionPhase::Idle;
    }

    /// Tool switch / Escape.  Content is committed, never discarded.
    pub fn cancel(&mut self, grid: &mut GridState) {
        self.clear_selection(grid);
    }

    /// Forget everything without writing back.  Only for when the grid
    /// itself was replaced (resize, import) and positions are stale.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ------------------------------------------------------------------
    // Projections for rendering and history
    // ------------------------------------------------------------------

    pub fn is_highlighted(&self, pos: CellPos) -> bool {
        self.rect.is_some_and(|r| r.contains(pos)) || self.footprint_contains(pos)
    }

    pub fn footprint_contains(&self, pos: CellPos) -> bool {
        self.floating.as_ref().is_some_and(|f| f.footprint_contains(pos))
    }

    /// Color shown at `pos`: floating content over the stored color.
    pub fn displayed_color(&self, grid: &GridState, pos: CellPos) -> Option<Color> {
        let stored = grid.get(pos)?;
        let floating = self.floating.as_ref().and_then(|f| f.color_at(pos)).filter(|c| !c.is_background());
        Some(floating.unwrap_or(stored))
    }

    /// The grid as it would read after a merge.  Content edits on a floating
    /// layer are recorded as diffs of this view.
    pub fn committed_view(&self, grid: &GridState) -> GridPatch {
        let mut cells = grid.cells().to_vec();
        if let Some(layer) = self.floating.as_ref() {
            layer.overlay_onto(&mut cells, grid.rows(), grid.cols());
        }
        GridPatch::from_cells(grid.rows(), grid.cols(), cells)
    }
}
