use crate::components::colors::Color;

// ============================================================================
// GRID BOUNDS
// ============================================================================

pub const MIN_GRID_DIM: usize = 5;
pub const MAX_GRID_DIM: usize = 50;
pub const DEFAULT_GRID_DIM: usize = 20;

/// Parse a user-entered dimension.  Garbage falls back to the minimum,
/// numbers are clamped into `[MIN_GRID_DIM, MAX_GRID_DIM]`.
pub fn clamp_grid_size(input: &str) -> usize {
    match input.trim().parse::<i64>() {
        Ok(n) => n.clamp(MIN_GRID_DIM as i64, MAX_GRID_DIM as i64) as usize,
        Err(_) => MIN_GRID_DIM,
    }
}

// ============================================================================
// CELL POSITION
// ============================================================================

/// Zero-based, row-major cell address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Signed offset.  `None` when the result would be negative; the upper
    /// bound is the grid's business.
    pub fn offset(self, d_row: i32, d_col: i32) -> Option<CellPos> {
        let row = self.row as i64 + d_row as i64;
        let col = self.col as i64 + d_col as i64;
        if row < 0 || col < 0 {
            return None;
        }
        Some(CellPos::new(row as usize, col as usize))
    }
}

// ============================================================================
// GRID STATE - the single source of truth for cell colors
// ============================================================================

/// Dense `rows × cols` color store.  Every in-bounds cell has exactly one
/// color; renderers read it and never keep a second mutable copy.
#[derive(Clone, Debug)]
pub struct GridState {
    rows: usize,
    cols: usize,
    cells: Vec<Color>,
    /// Bumped on every write that actually changes a cell.
    generation: u64,
}

impl Default for GridState {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_DIM, DEFAULT_GRID_DIM)
    }
}

impl GridState {
    /// New all-background grid.  Dimensions are clamped to the grid bounds.
    pub fn new(rows: usize, cols: usize) -> Self {
        let rows = rows.clamp(MIN_GRID_DIM, MAX_GRID_DIM);
        let cols = cols.clamp(MIN_GRID_DIM, MAX_GRID_DIM);
        Self {
            rows,
            cols,
            cells: vec![Color::BACKGROUND; rows * cols],
            generation: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Row-major view of every cell.
    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    pub fn in_bounds(&self, pos: CellPos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    fn index(&self, pos: CellPos) -> Option<usize> {
        self.in_bounds(pos).then(|| pos.row * self.cols + pos.col)
    }

    pub fn get(&self, pos: CellPos) -> Option<Color> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// Lookup with signed coordinates, for geometry that may hang off the grid.
    pub fn get_signed(&self, row: i64, col: i64) -> Option<Color> {
        if row < 0 || col < 0 {
            return None;
        }
        self.get(CellPos::new(row as usize, col as usize))
    }

    /// Unconditional write, no history side effect.  Returns whether the
    /// stored color changed; out-of-bounds writes are ignored.
    pub fn set(&mut self, pos: CellPos, color: Color) -> bool {
        let Some(i) = self.index(pos) else { return false };
        if self.cells[i] == color {
            return false;
        }
        self.cells[i] = color;
        self.generation += 1;
        true
    }

    /// Reinitialize to a new size, every cell background.  History owners
    /// must reset their stacks alongside.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let rows = rows.clamp(MIN_GRID_DIM, MAX_GRID_DIM);
        let cols = cols.clamp(MIN_GRID_DIM, MAX_GRID_DIM);
        self.rows = rows;
        self.cols = cols;
        self.cells = vec![Color::BACKGROUND; rows * cols];
        self.generation += 1;
    }

    /// Set every cell to background.  Returns whether anything changed.
    pub fn clear_all(&mut self) -> bool {
        if self.cells.iter().all(|c| c.is_background()) {
            return false;
        }
        self.cells.fill(Color::BACKGROUND);
        self.generation += 1;
        true
    }

    /// 4-connected in-bounds neighbours in up, right, down, left order.
    pub fn neighbors(&self, pos: CellPos) -> Vec<CellPos> {
        [(-1, 0), (0, 1), (1, 0), (0, -1)]
            .into_iter()
            .filter_map(|(dr, dc)| pos.offset(dr, dc))
            .filter(|p| self.in_bounds(*p))
            .collect()
    }

    pub fn positions(&self) -> impl Iterator<Item = CellPos> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| CellPos::new(row, col)))
    }

    pub fn non_background_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_background()).count()
    }

    /// Replace all cells from a row-major buffer of the same size.
    pub(crate) fn restore_cells(&mut self, cells: &[Color]) {
        if cells.len() != self.cells.len() {
            crate::log_warn!(
                "GridState::restore_cells: size mismatch ({} vs {})",
                cells.len(),
                self.cells.len()
            );
            return;
        }
        if self.cells != cells {
            self.cells.copy_from_slice(cells);
            self.generation += 1;
        }
    }
}
