// ============================================================================
// CLIPBOARD OPERATIONS - in-app clipboard slot and the paste preview overlay
// ============================================================================

use crate::canvas::{CellPos, GridState};
use crate::components::colors::Color;

// ---------------------------------------------------------------------------
//  Clipboard contents
// ---------------------------------------------------------------------------

/// Rectangular block of copied cells.  `None` marks a hole that pasting
/// leaves untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipboardData {
    width: usize,
    height: usize,
    /// Row-major, `width * height` entries.
    data: Vec<Option<Color>>,
}

impl ClipboardData {
    /// All-absent block.  Zero-sized blocks are widened to 1×1.
    pub fn new(width: usize, height: usize) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            width,
            height,
            data: vec![None; width * height],
        }
    }

    /// Build from `rows[height][width]`.  Ragged rows are padded with holes.
    pub fn from_rows(rows: &[Vec<Option<Color>>]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut block = Self::new(width, height);
        for (r, row) in rows.iter().enumerate() {
            for (c, color) in row.iter().enumerate() {
                block.set(r, c, *color);
            }
        }
        block
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Color> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, color: Option<Color>) {
        if row < self.height && col < self.width {
            self.data[row * self.width + col] = color;
        }
    }

    /// `data[height][width]` view, mostly for tests and debugging.
    pub fn rows(&self) -> Vec<Vec<Option<Color>>> {
        self.data.chunks(self.width).map(|r| r.to_vec()).collect()
    }

    /// Grid cells covered when the block is centered on `target`:
    /// the middle cell (`height/2`, `width/2`) lands under the cursor.
    /// Yields `(position, color)` for every present, in-bounds entry.
    pub fn placement<'a>(
        &'a self,
        grid: &'a GridState,
        target: CellPos,
    ) -> impl Iterator<Item = (CellPos, Color)> + 'a {
        let top = target.row as i64 - (self.height / 2) as i64;
        let left = target.col as i64 - (self.width / 2) as i64;
        (0..self.height).flat_map(move |r| {
            (0..self.width).filter_map(move |c| {
                let color = self.get(r, c)?;
                let (row, col) = (top + r as i64, left + c as i64);
                grid.get_signed(row, col)?;
                Some((CellPos::new(row as usize, col as usize), color))
            })
        })
    }
}

// ---------------------------------------------------------------------------
//  Single-slot clipboard (in-process only, last write wins)
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct Clipboard {
    slot: Option<ClipboardData>,
}

impl Clipboard {
    pub fn set(&mut self, data: ClipboardData) {
        crate::log_info!("Clipboard: {}x{} block", data.width(), data.height());
        self.slot = Some(data);
    }

    pub fn get(&self) -> Option<&ClipboardData> {
        self.slot.as_ref()
    }

    pub fn has_data(&self) -> bool {
        self.slot.is_some()
    }
}

// ---------------------------------------------------------------------------
//  Paste preview - non-committed overlay following the pointer
// ---------------------------------------------------------------------------

/// A cell currently showing preview content instead of its stored color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewCell {
    pub pos: CellPos,
    pub shown: Color,
    pub original: Color,
}

/// Paste in progress.  Holds its own copy of the clipboard block so later
/// clipboard writes do not change what is being placed.  The grid is never
/// touched until [`PastePreview::commit`].
#[derive(Clone, Debug)]
pub struct PastePreview {
    data: ClipboardData,
    target: Option<CellPos>,
    overlay: Vec<PreviewCell>,
}

impl PastePreview {
    pub fn new(data: ClipboardData) -> Self {
        Self {
            data,
            target: None,
            overlay: Vec::new(),
        }
    }

    pub fn data(&self) -> &ClipboardData {
        &self.data
    }

    pub fn target(&self) -> Option<CellPos> {
        self.target
    }

    pub fn overlay(&self) -> &[PreviewCell] {
        &self.overlay
    }

    /// Drop the overlay so every cell shows its stored color again.
    pub fn clear_overlay(&mut self) {
        self.overlay.clear();
    }

    /// Re-center on `target`.  Previously overlaid cells are restored first,
    /// so no stale preview survives a pointer move.
    pub fn update(&mut self, grid: &GridState, target: CellPos) {
        self.clear_overlay();
        if !grid.in_bounds(target) {
            self.target = None;
            return;
        }
        self.target = Some(target);
        self.overlay = self
            .writes(grid, target)
            .filter_map(|(pos, shown)| {
                let original = grid.get(pos)?;
                Some(PreviewCell { pos, shown, original })
            })
            .collect();
    }

    /// Cells a commit at `target` would write.  Holes and background entries
    /// leave the destination alone, in the preview as well as on commit.
    fn writes<'a>(&'a self, grid: &'a GridState, target: CellPos) -> impl Iterator<Item = (CellPos, Color)> + 'a {
        self.data.placement(grid, target).filter(|(_, color)| !color.is_background())
    }

    /// Color shown at `pos` while previewing, if the overlay covers it.
    pub fn preview_color_at(&self, pos: CellPos) -> Option<Color> {
        self.overlay.iter().find(|c| c.pos == pos).map(|c| c.shown)
    }

    /// Write the block into the grid centered on `target`.  Holes and
    /// background entries leave the destination cell alone.  Returns whether
    /// any cell changed.
    pub fn commit(mut self, grid: &mut GridState, target: CellPos) -> bool {
        self.clear_overlay();
        let writes: Vec<(CellPos, Color)> = self.writes(grid, target).collect();
        let mut changed = false;
        for (pos, color) in writes {
            changed |= grid.set(pos, color);
        }
        crate::log_info!("Paste committed at ({}, {}), changed={}", target.row, target.col, changed);
        changed
    }
}
