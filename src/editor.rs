//! Application context: one object owns the pattern, the tools and every bit
//! of transient editing state.  All mutations enter through
//! [`Editor::handle_pointer`] / [`Editor::handle_command`] (or the named
//! methods they dispatch to), and every visible change is recorded as a
//! single history entry.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::canvas::{CellPos, GridState};
use crate::components::colors::{Color, ColorError, Palette};
use crate::components::history::{GridPatch, HistoryManager, MatrixAction};
use crate::components::selection::{FloatingLayer, SelectionTool};
use crate::components::tools::{self, Stroke, Tool};
use crate::io::{self, ExportError, ExportOptions, GridFile, GridFileError, ImageFormat};
use crate::ops::clipboard::{Clipboard, PastePreview};
use crate::project::Project;

/// Pointer input already mapped to a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Down(CellPos),
    Drag(CellPos),
    /// Movement with no button held.
    Hover(CellPos),
    Up,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorCommand {
    Undo,
    Redo,
    Copy,
    Cut,
    Paste,
    Cancel,
    FlipHorizontal,
    FlipVertical,
    /// Recolor the selection with the current color.
    FillSelection,
    ClearSelectionContent,
    SelectAll,
    ClearAll,
    SetTool(Tool),
    Resize { rows: usize, cols: usize },
    SetColor(Color),
}

/// Follow-up work queued during an event and run once it has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingAction {
    RestoreTool(Tool),
}

pub struct Editor {
    project: Project,
    palette: Palette,
    selection: SelectionTool,
    clipboard: Clipboard,
    paste: Option<PastePreview>,
    tool: Tool,
    /// Tool to return to once a paste completes or is cancelled.
    tool_before_paste: Tool,
    current_color: Color,
    hover: Option<CellPos>,
    stroke: Option<Stroke>,
    /// Committed view captured when a floating-layer drag starts.
    move_before: Option<GridPatch>,
    pending: VecDeque<PendingAction>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Project::default(), Palette::default())
    }
}

impl Editor {
    pub fn new(project: Project, palette: Palette) -> Self {
        Self {
            project,
            palette,
            selection: SelectionTool::default(),
            clipboard: Clipboard::default(),
            paste: None,
            tool: Tool::Pencil,
            tool_before_paste: Tool::Pencil,
            current_color: Color::BLACK,
            hover: None,
            stroke: None,
            move_before: None,
            pending: VecDeque::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read access for the rendering collaborator
    // ------------------------------------------------------------------

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn grid(&self) -> &GridState {
        &self.project.grid
    }

    pub fn history(&self) -> &HistoryManager {
        &self.project.history
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn selection(&self) -> &SelectionTool {
        &self.selection
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn paste_preview(&self) -> Option<&PastePreview> {
        self.paste.as_ref()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn current_color(&self) -> Color {
        self.current_color
    }

    /// What the cell shows right now: paste preview, then floating content,
    /// then the stored color.
    pub fn displayed_color(&self, pos: CellPos) -> Option<Color> {
        if let Some(shown) = self.paste.as_ref().and_then(|p| p.preview_color_at(pos)) {
            return Some(shown);
        }
        self.selection.displayed_color(&self.project.grid, pos)
    }

    pub fn is_highlighted(&self, pos: CellPos) -> bool {
        self.selection.is_highlighted(pos)
    }

    /// The grid with any floating layer merged in, without disturbing it.
    pub fn committed_grid(&self) -> GridState {
        let mut grid = self.project.grid.clone();
        grid.restore_cells(self.selection.committed_view(&self.project.grid).cells());
        grid
    }

    // ------------------------------------------------------------------
    // History plumbing
    // ------------------------------------------------------------------

    /// Run `op` and record whatever it changed in the committed view as one
    /// entry named `description`.
    fn record<R>(&mut self, description: &str, op: impl FnOnce(&mut Self) -> R) -> R {
        self.collect_journal();
        let before = self.selection.committed_view(&self.project.grid);
        let result = op(self);
        let after = self.selection.committed_view(&self.project.grid);
        self.push_action(MatrixAction::from_patch(description, &before, &after));
        result
    }

    fn push_action(&mut self, action: MatrixAction) {
        if self.project.history.push(action) {
            self.project.mark_dirty();
        }
    }

    /// Move entries the selection tool left for detaches and merges onto
    /// the undo stack.
    fn collect_journal(&mut self) {
        for action in self.selection.take_journal() {
            self.push_action(action);
        }
    }

    fn finish_stroke(&mut self) {
        if let Some(stroke) = self.stroke.take()
            && let Some(action) = stroke.finish(&self.project.grid)
        {
            self.push_action(action);
        }
    }

    fn finish_move(&mut self) {
        self.selection.end_move();
        if let Some(before) = self.move_before.take() {
            let after = self.selection.committed_view(&self.project.grid);
            self.push_action(MatrixAction::from_patch("Move selection", &before, &after));
        }
    }

    /// Close any gesture still in progress so it lands as its own entry.
    fn settle(&mut self) {
        self.finish_stroke();
        self.finish_move();
    }

    /// Commit any floating layer, then revert the latest entry.  An entry
    /// that merged a layer floats that layer again.
    pub fn undo(&mut self) -> Option<String> {
        self.settle();
        self.collect_journal();
        if !self.project.history.can_undo() {
            return None;
        }
        self.selection.flatten(&mut self.project.grid);
        let action = self.project.history.undo(&mut self.project.grid)?;
        let description = action.description().to_string();
        let layer = action.layer_after_undo().cloned();
        crate::log_info!("Undo: {}", description);
        self.after_history_jump(layer);
        Some(description)
    }

    /// Commit any floating layer, then reapply the latest undone entry.  An
    /// entry that detached a layer floats that layer again.
    pub fn redo(&mut self) -> Option<String> {
        self.settle();
        self.collect_journal();
        if !self.project.history.can_redo() {
            return None;
        }
        self.selection.flatten(&mut self.project.grid);
        let action = self.project.history.redo(&mut self.project.grid)?;
        let description = action.description().to_string();
        let layer = action.layer_after_redo().cloned();
        crate::log_info!("Redo: {}", description);
        self.after_history_jump(layer);
        Some(description)
    }

    /// Undo `count` entries at once (history panel).
    pub fn undo_to(&mut self, count: usize) {
        for _ in 0..count {
            if self.undo().is_none() {
                break;
            }
        }
    }

    fn after_history_jump(&mut self, layer: Option<FloatingLayer>) {
        if let Some(layer) = layer {
            self.selection.restore_floating(layer);
            self.paste = None;
            self.tool = Tool::Select;
        }
        self.project.mark_dirty();
        self.refresh_preview();
    }

    fn refresh_preview(&mut self) {
        if let (Some(preview), Some(target)) = (self.paste.as_mut(), self.hover) {
            preview.update(&self.project.grid, target);
        }
    }

    // ------------------------------------------------------------------
    // Input dispatch
    // ------------------------------------------------------------------

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down(pos) => {
                self.hover = Some(pos);
                self.pointer_down(pos);
            }
            PointerEvent::Drag(pos) => {
                self.hover = Some(pos);
                self.pointer_drag(pos);
            }
            PointerEvent::Hover(pos) => {
                self.hover = Some(pos);
                if let Some(preview) = self.paste.as_mut() {
                    preview.update(&self.project.grid, pos);
                }
            }
            PointerEvent::Up => self.settle_pointer_up(),
        }
        self.drain_pending();
    }

    fn pointer_down(&mut self, pos: CellPos) {
        if !self.project.grid.in_bounds(pos) {
            return;
        }
        match self.tool {
            Tool::Pencil | Tool::Eraser => {
                self.finish_stroke();
                self.stroke = Some(Stroke::begin(&mut self.project.grid, self.tool, self.current_color, pos));
            }
            Tool::Fill => {
                let color = self.current_color;
                self.record("Fill", |ed| tools::flood_fill(&mut ed.project.grid, pos, color));
            }
            Tool::ColorPicker => {
                if let Some(color) = tools::pick_color(&self.project.grid, pos) {
                    self.set_color(color);
                }
            }
            Tool::Select => {
                if self.selection.footprint_contains(pos) {
                    self.move_before = Some(self.selection.committed_view(&self.project.grid));
                }
                self.selection.pointer_down(&mut self.project.grid, pos);
                self.collect_journal();
            }
            Tool::Paste => self.commit_paste(pos),
        }
    }

    fn pointer_drag(&mut self, pos: CellPos) {
        match self.tool {
            Tool::Pencil | Tool::Eraser => {
                if let Some(stroke) = self.stroke.as_mut() {
                    stroke.extend(&mut self.project.grid, pos);
                }
            }
            Tool::Select => self.selection.pointer_drag(pos),
            Tool::Paste => {
                if let Some(preview) = self.paste.as_mut() {
                    preview.update(&self.project.grid, pos);
                }
            }
            Tool::Fill | Tool::ColorPicker => {}
        }
    }

    fn settle_pointer_up(&mut self) {
        self.finish_stroke();
        if self.selection.is_dragging() {
            self.selection.pointer_up(&mut self.project.grid);
            self.collect_journal();
        }
        self.finish_move();
    }

    pub fn handle_command(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::Undo => {
                self.undo();
            }
            EditorCommand::Redo => {
                self.redo();
            }
            EditorCommand::Copy => self.copy(),
            EditorCommand::Cut => self.cut(),
            EditorCommand::Paste => self.paste(),
            EditorCommand::Cancel => self.cancel(),
            EditorCommand::FlipHorizontal => self.flip_horizontal(),
            EditorCommand::FlipVertical => self.flip_vertical(),
            EditorCommand::FillSelection => self.fill_selection(),
            EditorCommand::ClearSelectionContent => self.clear_selection_content(),
            EditorCommand::SelectAll => self.select_all(),
            EditorCommand::ClearAll => self.clear_all(),
            EditorCommand::SetTool(tool) => self.set_tool(tool),
            EditorCommand::Resize { rows, cols } => self.resize(rows, cols),
            EditorCommand::SetColor(color) => self.set_color(color),
        }
        self.drain_pending();
    }

    fn drain_pending(&mut self) {
        while let Some(action) = self.pending.pop_front() {
            match action {
                PendingAction::RestoreTool(tool) => self.set_tool(tool),
            }
        }
    }

    // ------------------------------------------------------------------
    // Tools and colors
    // ------------------------------------------------------------------

    /// Switch tools.  Any floating layer is committed and any paste preview
    /// dropped first.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        if tool == Tool::Paste {
            self.paste();
            return;
        }
        self.settle();
        if self.paste.take().is_some() {
            crate::log_info!("Paste preview cancelled");
        }
        self.selection.cancel(&mut self.project.grid);
        self.collect_journal();
        self.tool = tool;
    }

    pub fn set_color(&mut self, color: Color) {
        self.current_color = color;
    }

    /// Parse, add to the palette and make current.  Re-adding an existing
    /// color just selects it.
    pub fn add_palette_color(&mut self, hex: &str) -> Result<Color, ColorError> {
        let color = self.palette.add_hex(hex)?;
        self.current_color = color;
        Ok(color)
    }

    /// Remove a swatch.  When it was the current color, the first remaining
    /// swatch takes over.
    pub fn remove_palette_color(&mut self, color: Color) -> bool {
        if !self.palette.remove(color) {
            return false;
        }
        if self.current_color == color {
            self.current_color = self.palette.first();
        }
        true
    }

    // ------------------------------------------------------------------
    // Selection commands
    // ------------------------------------------------------------------

    pub fn copy(&mut self) {
        if let Some(block) = self.selection.copy(&self.project.grid) {
            self.clipboard.set(block);
        }
    }

    pub fn cut(&mut self) {
        self.settle();
        if let Some(block) = self.record("Cut", |ed| ed.selection.cut(&mut ed.project.grid)) {
            self.clipboard.set(block);
        }
    }

    pub fn flip_horizontal(&mut self) {
        self.settle();
        self.record("Flip horizontal", |ed| ed.selection.flip_horizontal());
    }

    pub fn flip_vertical(&mut self) {
        self.settle();
        self.record("Flip vertical", |ed| ed.selection.flip_vertical());
    }

    pub fn fill_selection(&mut self) {
        self.settle();
        let color = self.current_color;
        self.record("Fill selection", |ed| ed.selection.recolor(&mut ed.project.grid, color));
    }

    pub fn clear_selection_content(&mut self) {
        self.settle();
        self.record("Clear selection", |ed| ed.selection.clear_content(&mut ed.project.grid));
    }

    pub fn select_all(&mut self) {
        self.set_tool(Tool::Select);
        self.selection.select_all(&mut self.project.grid);
        self.collect_journal();
    }

    /// Escape: leave paste mode without writing, otherwise commit any
    /// floating layer and drop the selection.
    pub fn cancel(&mut self) {
        self.settle();
        if self.paste.take().is_some() {
            crate::log_info!("Paste preview cancelled");
            self.tool = self.tool_before_paste;
            return;
        }
        self.selection.cancel(&mut self.project.grid);
        self.collect_journal();
    }

    // ------------------------------------------------------------------
    // Paste
    // ------------------------------------------------------------------

    /// Enter paste mode with the clipboard contents.  An empty clipboard is
    /// a no-op; pasting again restarts the preview.
    pub fn paste(&mut self) {
        let Some(block) = self.clipboard.get().cloned() else { return };
        self.settle();
        self.selection.cancel(&mut self.project.grid);
        self.collect_journal();
        if self.tool != Tool::Paste {
            self.tool_before_paste = self.tool;
            self.tool = Tool::Paste;
        }
        let mut preview = PastePreview::new(block);
        if let Some(target) = self.hover {
            preview.update(&self.project.grid, target);
        }
        self.paste = Some(preview);
    }

    fn commit_paste(&mut self, pos: CellPos) {
        let Some(preview) = self.paste.take() else { return };
        self.record("Paste", |ed| preview.commit(&mut ed.project.grid, pos));
        self.pending.push_back(PendingAction::RestoreTool(self.tool_before_paste));
    }

    // ------------------------------------------------------------------
    // Whole-grid operations
    // ------------------------------------------------------------------

    pub fn clear_all(&mut self) {
        self.settle();
        self.paste = None;
        self.selection.cancel(&mut self.project.grid);
        self.collect_journal();
        self.record("Clear all", |ed| ed.project.grid.clear_all());
        if self.tool == Tool::Paste {
            self.tool = self.tool_before_paste;
        }
        self.set_tool(Tool::Pencil);
    }

    /// Start over at a new size.  Floating content and history are dropped
    /// along with the old cells.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.discard_transient_state();
        self.project.grid.resize(rows, cols);
        self.project.history.clear();
        self.project.mark_dirty();
        crate::log_info!("Grid resized to {}x{}", self.project.grid.rows(), self.project.grid.cols());
    }

    fn discard_transient_state(&mut self) {
        self.stroke = None;
        self.move_before = None;
        self.paste = None;
        self.selection.reset();
        if self.tool == Tool::Paste {
            self.tool = self.tool_before_paste;
        }
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Replace the pattern with a grid file.  Nothing changes on failure.
    pub fn open_file(&mut self, path: &Path) -> Result<(), GridFileError> {
        let loaded = io::load_grid_file(path)?;
        self.discard_transient_state();
        self.project = Project::from_file(path.to_path_buf(), loaded.name, loaded.grid);
        if self.palette.replace_all(&loaded.palette) {
            self.current_color = self.palette.first();
        }
        Ok(())
    }

    pub fn save_file(&mut self, path: PathBuf) -> Result<(), GridFileError> {
        let file = GridFile::from_grid(&self.project.name, &self.committed_grid(), self.palette.colors());
        io::save_grid_file(&path, &file)?;
        self.project.set_path(path);
        self.project.mark_clean();
        Ok(())
    }

    /// Export the committed grid.  The format follows the path's extension.
    pub fn export_image(&self, path: &Path, options: &ExportOptions) -> Result<(), ExportError> {
        let format = ImageFormat::for_path(path)?;
        io::export_image(&self.committed_grid(), path, format, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::clipboard::ClipboardData;

    const RED: Color = Color::rgb(0xFF, 0, 0);
    const BLUE: Color = Color::rgb(0, 0, 0xFF);

    fn p(row: usize, col: usize) -> CellPos {
        CellPos::new(row, col)
    }

    fn editor(rows: usize, cols: usize) -> Editor {
        Editor::new(Project::new_untitled(1, rows, cols), Palette::default())
    }

    fn click(ed: &mut Editor, pos: CellPos) {
        ed.handle_pointer(PointerEvent::Down(pos));
        ed.handle_pointer(PointerEvent::Up);
    }

    fn drag(ed: &mut Editor, from: CellPos, to: CellPos) {
        ed.handle_pointer(PointerEvent::Down(from));
        ed.handle_pointer(PointerEvent::Drag(to));
        ed.handle_pointer(PointerEvent::Up);
    }

    #[test]
    fn pencil_undo_redo_scenario() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(2, 2));
        assert_eq!(ed.grid().non_background_count(), 1);
        assert_eq!(ed.grid().get(p(2, 2)), Some(RED));

        ed.handle_command(EditorCommand::Undo);
        assert_eq!(ed.grid().non_background_count(), 0);
        ed.handle_command(EditorCommand::Redo);
        assert_eq!(ed.grid().get(p(2, 2)), Some(RED));
        assert_eq!(ed.grid().non_background_count(), 1);
    }

    #[test]
    fn whole_stroke_is_one_entry() {
        let mut ed = editor(5, 5);
        ed.handle_pointer(PointerEvent::Down(p(0, 0)));
        for col in 1..5 {
            ed.handle_pointer(PointerEvent::Drag(p(0, col)));
        }
        ed.handle_pointer(PointerEvent::Up);
        assert_eq!(ed.history().undo_count(), 1);
        ed.undo();
        assert_eq!(ed.grid().non_background_count(), 0);
    }

    #[test]
    fn undo_redo_round_trips_over_mixed_sequence() {
        let mut ed = editor(8, 8);
        ed.set_color(RED);
        drag(&mut ed, p(0, 0), p(0, 3));
        ed.set_tool(Tool::Fill);
        ed.set_color(BLUE);
        click(&mut ed, p(5, 5));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(1, 2));
        drag(&mut ed, p(0, 1), p(2, 3));
        ed.flip_horizontal();
        ed.fill_selection();
        ed.cut();
        ed.paste();
        ed.handle_pointer(PointerEvent::Hover(p(6, 6)));
        click(&mut ed, p(6, 6));

        let mut states = vec![ed.committed_grid().cells().to_vec()];
        while ed.undo().is_some() {
            states.push(ed.committed_grid().cells().to_vec());
        }
        assert!(ed.grid().cells().iter().all(|c| c.is_background()));
        states.pop();
        while let Some(expected) = states.pop() {
            ed.redo();
            assert_eq!(ed.committed_grid().cells(), &expected[..]);
        }
        assert!(!ed.history().can_redo());
    }

    #[test]
    fn selecting_is_its_own_undo_step() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(0, 0));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(1, 1));
        assert!(ed.selection().is_floating());
        assert_eq!(ed.history().undo_count(), 2);
        assert_eq!(ed.history().undo_description(), Some("Select"));

        assert_eq!(ed.undo().as_deref(), Some("Select"));
        assert_eq!(ed.history().undo_count(), 1);
        assert!(!ed.selection().is_floating());
        assert_eq!(ed.grid().get(p(0, 0)), Some(RED));

        assert_eq!(ed.redo().as_deref(), Some("Select"));
        assert!(ed.selection().is_floating());
        assert_eq!(ed.grid().get(p(0, 0)), Some(Color::BACKGROUND));
        assert_eq!(ed.displayed_color(p(0, 0)), Some(RED));
    }

    #[test]
    fn merging_is_its_own_undo_step() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(0, 0));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(0, 0));
        ed.set_tool(Tool::Pencil);
        assert_eq!(ed.history().undo_count(), 3);
        assert_eq!(ed.grid().get(p(0, 0)), Some(RED));

        assert_eq!(ed.undo().as_deref(), Some("Merge selection"));
        assert!(ed.selection().is_floating());
        assert_eq!(ed.tool(), Tool::Select);
        assert_eq!(ed.grid().get(p(0, 0)), Some(Color::BACKGROUND));
        assert_eq!(ed.displayed_color(p(0, 0)), Some(RED));

        assert_eq!(ed.redo().as_deref(), Some("Merge selection"));
        assert!(!ed.selection().is_floating());
        assert_eq!(ed.grid().get(p(0, 0)), Some(RED));
    }

    #[test]
    fn redo_with_nothing_to_redo_keeps_layer_floating() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(0, 0));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(1, 1));
        assert_eq!(ed.redo(), None);
        assert!(ed.selection().is_floating());
        assert_eq!(ed.history().undo_count(), 2);
    }

    #[test]
    fn merging_onto_unchanged_cells_records_nothing() {
        let mut ed = editor(5, 5);
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(1, 1), p(2, 2));
        ed.cancel();
        assert!(!ed.history().can_undo());
    }

    #[test]
    fn move_then_merge_scenario() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(0, 0));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(1, 1));
        let layer = ed.selection().floating().unwrap();
        assert_eq!((layer.anchor, layer.content.len()), ((0, 0), 4));

        drag(&mut ed, p(0, 0), p(1, 1));
        ed.handle_command(EditorCommand::Cancel);
        assert_eq!(ed.grid().get(p(1, 1)), Some(RED));
        assert_eq!(ed.grid().get(p(0, 0)), Some(Color::BACKGROUND));
        assert_eq!(ed.grid().non_background_count(), 1);
        assert!(ed.grid().positions().all(|pos| !ed.is_highlighted(pos)));

        assert_eq!(ed.undo().as_deref(), Some("Merge selection"));
        assert_eq!(ed.displayed_color(p(1, 1)), Some(RED));
        assert_eq!(ed.undo().as_deref(), Some("Move selection"));
        assert_eq!(ed.grid().get(p(0, 0)), Some(RED));
        assert_eq!(ed.grid().non_background_count(), 1);
        assert_eq!(ed.undo().as_deref(), Some("Select"));
        assert_eq!(ed.grid().get(p(0, 0)), Some(RED));
        assert_eq!(ed.history().undo_count(), 1);
    }

    #[test]
    fn undo_while_floating_merges_first() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(2, 2));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(2, 2), p(2, 2));
        ed.flip_vertical();
        // A 1x1 flip changes nothing, so the selection is the latest entry.
        assert_eq!(ed.undo().as_deref(), Some("Select"));
        assert!(!ed.selection().is_floating());
        assert_eq!(ed.grid().get(p(2, 2)), Some(RED));
        assert_eq!(ed.undo().as_deref(), Some("Pencil"));
        assert_eq!(ed.grid().non_background_count(), 0);
        ed.redo();
        assert_eq!(ed.grid().get(p(2, 2)), Some(RED));
    }

    #[test]
    fn undo_to_replays_selection_steps() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(0, 0));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(0, 0));
        drag(&mut ed, p(0, 0), p(3, 3));
        ed.cancel();
        assert_eq!(ed.history().undo_count(), 4);

        ed.undo_to(3);
        assert_eq!(ed.history().undo_count(), 1);
        assert_eq!(ed.history().redo_count(), 3);
        assert!(!ed.selection().is_floating());
        assert_eq!(ed.grid().get(p(0, 0)), Some(RED));
        assert_eq!(ed.grid().non_background_count(), 1);
    }

    #[test]
    fn cut_and_paste_back_restores_original() {
        let mut ed = editor(6, 6);
        ed.set_color(RED);
        click(&mut ed, p(1, 1));
        ed.set_color(BLUE);
        click(&mut ed, p(2, 3));
        let original = ed.grid().cells().to_vec();

        ed.set_tool(Tool::Select);
        drag(&mut ed, p(1, 1), p(2, 3));
        ed.cut();
        assert_eq!(ed.grid().non_background_count(), 0);

        // 2x3 block: centered placement puts its top-left at (row-1, col-1).
        ed.paste();
        assert_eq!(ed.tool(), Tool::Paste);
        ed.handle_pointer(PointerEvent::Hover(p(2, 2)));
        click(&mut ed, p(2, 2));
        assert_eq!(ed.grid().cells(), &original[..]);
        assert_eq!(ed.tool(), Tool::Select);
    }

    #[test]
    fn paste_centers_and_skips_background() {
        let mut ed = editor(8, 8);
        ed.set_color(BLUE);
        click(&mut ed, p(3, 3));
        ed.set_color(RED);
        click(&mut ed, p(6, 6));

        ed.set_tool(Tool::Select);
        drag(&mut ed, p(6, 6), p(7, 7));
        ed.copy();
        ed.cancel();
        let entries = ed.history().undo_count();

        ed.paste();
        ed.handle_pointer(PointerEvent::Hover(p(3, 3)));
        assert_eq!(ed.displayed_color(p(2, 2)), Some(RED));
        assert_eq!(ed.grid().get(p(2, 2)), Some(Color::BACKGROUND));
        click(&mut ed, p(3, 3));

        assert_eq!(ed.grid().get(p(2, 2)), Some(RED));
        // (3,3) sat under a background block cell and keeps its color.
        assert_eq!(ed.grid().get(p(3, 3)), Some(BLUE));
        assert_eq!(ed.grid().non_background_count(), 3);
        assert_eq!(ed.history().undo_count(), entries + 1);
    }

    #[test]
    fn paste_preview_matches_committed_cells() {
        let mut ed = editor(5, 5);
        ed.set_color(BLUE);
        click(&mut ed, p(2, 2));
        ed.clipboard.set(ClipboardData::from_rows(&[vec![Some(Color::BACKGROUND)]]));
        ed.paste();
        ed.handle_pointer(PointerEvent::Hover(p(2, 2)));
        let previewed: Vec<_> = ed.grid().positions().map(|pos| ed.displayed_color(pos)).collect();
        assert_eq!(ed.displayed_color(p(2, 2)), Some(BLUE));

        click(&mut ed, p(2, 2));
        let committed: Vec<_> = ed.grid().positions().map(|pos| ed.grid().get(pos)).collect();
        assert_eq!(previewed, committed);
        assert_eq!(ed.history().undo_count(), 1);
    }

    #[test]
    fn escape_cancels_paste_without_writing() {
        let mut ed = editor(5, 5);
        ed.clipboard.set(ClipboardData::from_rows(&[vec![Some(RED)]]));
        ed.set_tool(Tool::Fill);
        ed.paste();
        ed.handle_pointer(PointerEvent::Hover(p(1, 1)));
        assert_eq!(ed.displayed_color(p(1, 1)), Some(RED));
        ed.handle_command(EditorCommand::Cancel);
        assert_eq!(ed.tool(), Tool::Fill);
        assert!(ed.paste_preview().is_none());
        assert_eq!(ed.displayed_color(p(1, 1)), Some(Color::BACKGROUND));
        assert!(!ed.history().can_undo());
    }

    #[test]
    fn paste_with_empty_clipboard_is_noop() {
        let mut ed = editor(5, 5);
        ed.handle_command(EditorCommand::Paste);
        assert_eq!(ed.tool(), Tool::Pencil);
        assert!(ed.paste_preview().is_none());
    }

    #[test]
    fn switching_tools_commits_floating_layer() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        click(&mut ed, p(0, 0));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(0, 0));
        drag(&mut ed, p(0, 0), p(3, 3));
        ed.set_tool(Tool::Pencil);
        assert!(!ed.selection().has_selection());
        assert_eq!(ed.grid().get(p(3, 3)), Some(RED));
    }

    #[test]
    fn resize_resets_cells_and_history() {
        let mut ed = editor(5, 5);
        click(&mut ed, p(1, 1));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(2, 2));
        ed.handle_command(EditorCommand::Resize { rows: 7, cols: 9 });
        assert_eq!((ed.grid().rows(), ed.grid().cols()), (7, 9));
        assert_eq!(ed.grid().non_background_count(), 0);
        assert!(!ed.selection().has_selection());
        assert_eq!(ed.undo(), None);
        assert_eq!(ed.grid().non_background_count(), 0);
    }

    #[test]
    fn fill_and_picker_tools() {
        let mut ed = editor(5, 5);
        ed.set_tool(Tool::Fill);
        ed.set_color(BLUE);
        click(&mut ed, p(4, 4));
        assert_eq!(ed.grid().non_background_count(), 25);
        click(&mut ed, p(0, 0));
        assert_eq!(ed.history().undo_count(), 1);

        ed.set_color(RED);
        ed.set_tool(Tool::ColorPicker);
        click(&mut ed, p(2, 2));
        assert_eq!(ed.current_color(), BLUE);
        assert_eq!(ed.history().undo_count(), 1);
    }

    #[test]
    fn clear_all_is_one_entry_and_returns_to_pencil() {
        let mut ed = editor(5, 5);
        click(&mut ed, p(0, 0));
        click(&mut ed, p(4, 4));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(4, 4), p(4, 4));
        ed.handle_command(EditorCommand::ClearAll);
        assert_eq!(ed.grid().non_background_count(), 0);
        assert_eq!(ed.tool(), Tool::Pencil);
        assert_eq!(ed.undo().as_deref(), Some("Clear all"));
        assert_eq!(ed.grid().non_background_count(), 2);
    }

    #[test]
    fn select_all_then_fill_recolors_grid() {
        let mut ed = editor(5, 5);
        ed.set_color(RED);
        ed.handle_command(EditorCommand::SelectAll);
        assert_eq!(ed.tool(), Tool::Select);
        ed.handle_command(EditorCommand::FillSelection);
        assert_eq!(ed.grid().non_background_count(), 25);
        ed.handle_command(EditorCommand::ClearSelectionContent);
        assert_eq!(ed.grid().non_background_count(), 0);
        assert_eq!(ed.history().undo_count(), 2);
    }

    #[test]
    fn palette_edits_track_current_color() {
        let mut ed = editor(5, 5);
        assert_eq!(ed.add_palette_color("#00FF00"), Ok(Color::rgb(0, 0xFF, 0)));
        assert_eq!(ed.current_color(), Color::rgb(0, 0xFF, 0));
        assert!(ed.add_palette_color("00FF00").is_err());
        assert!(ed.remove_palette_color(Color::rgb(0, 0xFF, 0)));
        assert_eq!(ed.current_color(), ed.palette().first());
    }

    #[test]
    fn failed_import_leaves_editor_untouched() {
        let mut ed = editor(5, 5);
        click(&mut ed, p(0, 0));
        let path = std::env::temp_dir().join(format!("crochetfe_bad_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"rows": 100, "cols": 5, "cells": []}"#).unwrap();
        assert!(ed.open_file(&path).is_err());
        let _ = std::fs::remove_file(&path);
        assert_eq!(ed.grid().get(p(0, 0)), Some(Color::BLACK));
        assert!(ed.history().can_undo());
    }

    #[test]
    fn save_includes_floating_content_and_reopens() {
        let mut ed = editor(6, 6);
        ed.set_color(RED);
        click(&mut ed, p(0, 0));
        ed.set_tool(Tool::Select);
        drag(&mut ed, p(0, 0), p(0, 0));
        let path = std::env::temp_dir().join(format!("crochetfe_save_{}.json", uuid::Uuid::new_v4()));
        ed.save_file(path.clone()).unwrap();
        assert!(!ed.project().is_dirty);
        assert!(ed.selection().is_floating());

        let mut other = editor(5, 5);
        other.open_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!((other.grid().rows(), other.grid().cols()), (6, 6));
        assert_eq!(other.grid().get(p(0, 0)), Some(RED));
        assert!(!other.history().can_undo());
        assert_eq!(other.current_color(), other.palette().first());
    }
}
