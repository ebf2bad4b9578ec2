use std::collections::VecDeque;

use crate::canvas::{CellPos, GridState};
use crate::components::colors::Color;
use crate::components::history::{GridPatch, MatrixAction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Pencil,
    Eraser,
    Fill,
    ColorPicker,
    Select,
    /// Transient mode while a paste preview follows the pointer.
    Paste,
}

impl Tool {
    /// Tools offered in the toolbar.  `Paste` is entered through the clipboard.
    pub const TOOLBAR: [Tool; 5] = [Tool::Pencil, Tool::Eraser, Tool::Fill, Tool::ColorPicker, Tool::Select];

    pub fn label(self) -> &'static str {
        match self {
            Tool::Pencil => "Pencil",
            Tool::Eraser => "Eraser",
            Tool::Fill => "Fill",
            Tool::ColorPicker => "Color Picker",
            Tool::Select => "Select",
            Tool::Paste => "Paste",
        }
    }

    pub fn shortcut(self) -> Option<char> {
        match self {
            Tool::Pencil => Some('P'),
            Tool::Eraser => Some('E'),
            Tool::Fill => Some('F'),
            Tool::ColorPicker => Some('I'),
            Tool::Select => Some('S'),
            Tool::Paste => None,
        }
    }

    pub fn from_shortcut(key: char) -> Option<Tool> {
        let key = key.to_ascii_uppercase();
        Self::TOOLBAR.into_iter().find(|t| t.shortcut() == Some(key))
    }

    /// Pencil and eraser paint continuously while dragging.
    pub fn is_stroke(self) -> bool {
        matches!(self, Tool::Pencil | Tool::Eraser)
    }
}

// ============================================================================
// STROKE - one pointer-down..pointer-up gesture batched into a single entry
// ============================================================================

#[derive(Clone, Debug)]
pub struct Stroke {
    tool: Tool,
    color: Color,
    before: GridPatch,
    dirty: bool,
}

impl Stroke {
    /// Start a stroke and paint the first cell.  The eraser always paints
    /// background, whatever `color` says.
    pub fn begin(grid: &mut GridState, tool: Tool, color: Color, pos: CellPos) -> Self {
        let color = if tool == Tool::Eraser { Color::BACKGROUND } else { color };
        let mut stroke = Self {
            tool,
            color,
            before: GridPatch::capture(grid),
            dirty: false,
        };
        stroke.extend(grid, pos);
        stroke
    }

    /// Paint `pos` if it is not already the stroke color.
    pub fn extend(&mut self, grid: &mut GridState, pos: CellPos) {
        self.dirty |= grid.set(pos, self.color);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Close the stroke.  A stroke that changed nothing yields no entry.
    pub fn finish(self, grid: &GridState) -> Option<MatrixAction> {
        if !self.dirty {
            return None;
        }
        let action = MatrixAction::from_patch(self.tool.label(), &self.before, &GridPatch::capture(grid));
        (!action.is_empty()).then_some(action)
    }
}

// ============================================================================
// FLOOD FILL / PICKER
// ============================================================================

/// 4-connected region of cells sharing the color at `start`.
pub fn fill_region(grid: &GridState, start: CellPos) -> Vec<CellPos> {
    let Some(target) = grid.get(start) else { return Vec::new() };
    let cols = grid.cols();
    let mut visited = vec![false; grid.rows() * cols];
    let mut queue = VecDeque::new();
    let mut region = Vec::new();

    visited[start.row * cols + start.col] = true;
    queue.push_back(start);

    while let Some(pos) = queue.pop_front() {
        region.push(pos);
        for next in grid.neighbors(pos) {
            let vi = next.row * cols + next.col;
            if visited[vi] {
                continue;
            }
            visited[vi] = true;
            if grid.get(next) == Some(target) {
                queue.push_back(next);
            }
        }
    }
    region
}

/// Replace the region under `start` with `color`.  Returns the number of
/// cells changed; filling with the region's own color is a no-op.
pub fn flood_fill(grid: &mut GridState, start: CellPos, color: Color) -> usize {
    match grid.get(start) {
        Some(source) if source != color => {}
        _ => return 0,
    }
    let region = fill_region(grid, start);
    for pos in &region {
        grid.set(*pos, color);
    }
    region.len()
}

pub fn pick_color(grid: &GridState, pos: CellPos) -> Option<Color> {
    grid.get(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Color::rgb(0xFF, 0, 0);

    fn p(row: usize, col: usize) -> CellPos {
        CellPos::new(row, col)
    }

    #[test]
    fn shortcuts_map_to_toolbar_tools() {
        assert_eq!(Tool::from_shortcut('e'), Some(Tool::Eraser));
        assert_eq!(Tool::from_shortcut('S'), Some(Tool::Select));
        assert_eq!(Tool::from_shortcut('x'), None);
        assert!(Tool::Pencil.is_stroke() && !Tool::Fill.is_stroke());
    }

    #[test]
    fn stroke_batches_into_one_action() {
        let mut grid = GridState::new(5, 5);
        let mut stroke = Stroke::begin(&mut grid, Tool::Pencil, RED, p(0, 0));
        stroke.extend(&mut grid, p(0, 1));
        stroke.extend(&mut grid, p(0, 1));
        stroke.extend(&mut grid, p(1, 1));
        let action = stroke.finish(&grid).unwrap();
        assert_eq!(action.changes().len(), 3);
        assert_eq!(action.description(), "Pencil");
    }

    #[test]
    fn stroke_over_same_color_records_nothing() {
        let mut grid = GridState::new(5, 5);
        let mut stroke = Stroke::begin(&mut grid, Tool::Eraser, RED, p(2, 2));
        stroke.extend(&mut grid, p(2, 3));
        assert!(!stroke.is_dirty());
        assert!(stroke.finish(&grid).is_none());
    }

    #[test]
    fn eraser_writes_background() {
        let mut grid = GridState::new(5, 5);
        grid.set(p(1, 1), RED);
        let stroke = Stroke::begin(&mut grid, Tool::Eraser, RED, p(1, 1));
        assert_eq!(grid.get(p(1, 1)), Some(Color::BACKGROUND));
        assert!(stroke.finish(&grid).is_some());
    }

    #[test]
    fn fill_stays_inside_bounded_region() {
        // Ring of black around (1..=3, 1..=3), open to nothing.
        let mut grid = GridState::new(6, 6);
        for i in 0..5 {
            grid.set(p(0, i), Color::BLACK);
            grid.set(p(4, i), Color::BLACK);
            grid.set(p(i, 0), Color::BLACK);
            grid.set(p(i, 4), Color::BLACK);
        }
        assert_eq!(flood_fill(&mut grid, p(2, 2), RED), 9);
        assert_eq!(grid.get(p(1, 3)), Some(RED));
        assert_eq!(grid.get(p(5, 5)), Some(Color::BACKGROUND));
        assert_eq!(grid.get(p(0, 2)), Some(Color::BLACK));
    }

    #[test]
    fn fill_reaches_region_touching_edges() {
        let mut grid = GridState::new(5, 5);
        for row in 0..5 {
            grid.set(p(row, 2), Color::BLACK);
        }
        assert_eq!(flood_fill(&mut grid, p(0, 0), RED), 10);
        assert_eq!(grid.get(p(4, 1)), Some(RED));
        assert_eq!(grid.get(p(4, 3)), Some(Color::BACKGROUND));
    }

    #[test]
    fn fill_with_same_color_is_noop() {
        let mut grid = GridState::new(5, 5);
        let generation = grid.generation();
        assert_eq!(flood_fill(&mut grid, p(0, 0), Color::BACKGROUND), 0);
        assert_eq!(flood_fill(&mut grid, p(9, 9), RED), 0);
        assert_eq!(grid.generation(), generation);
    }

    #[test]
    fn picker_reads_without_writing() {
        let mut grid = GridState::new(5, 5);
        grid.set(p(3, 4), RED);
        assert_eq!(pick_color(&grid, p(3, 4)), Some(RED));
        assert_eq!(pick_color(&grid, p(5, 0)), None);
    }
}
