use eframe::egui;
use egui::{Color32, Key, Modifiers, Pos2, Rect, Sense, Stroke, Vec2};

use crate::canvas::{CellPos, clamp_grid_size};
use crate::components::colors::{Color, Palette};
use crate::components::tools::Tool;
use crate::editor::{Editor, EditorCommand, PointerEvent};
use crate::io::{self, ExportOptions, MAX_EXPORT_RESOLUTION};
use crate::project::Project;

const MIN_CELL_PX: f32 = 6.0;
const MAX_CELL_PX: f32 = 40.0;
const SELECTION_TINT: Color32 = Color32::from_rgba_premultiplied(30, 70, 140, 70);
const SELECTION_EDGE: Color32 = Color32::from_rgb(40, 110, 230);
const PASTE_EDGE: Color32 = Color32::from_rgb(230, 120, 20);

/// Window front end.  Owns an [`Editor`] and turns egui input into editor
/// events; everything drawn is read back from the editor each frame.
pub struct CrochetApp {
    editor: Editor,
    rows_input: String,
    cols_input: String,
    hex_input: String,
    export: ExportOptions,
    /// Last cell sent to the editor during the current press or hover.
    last_cell: Option<CellPos>,
    pressing: bool,
    status: Option<String>,
}

impl CrochetApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let editor = Editor::new(Project::default(), Palette::load());
        let (rows, cols) = (editor.grid().rows(), editor.grid().cols());
        crate::log_info!("Editor started with a {}x{} grid", rows, cols);
        Self {
            editor,
            rows_input: rows.to_string(),
            cols_input: cols.to_string(),
            hex_input: String::from("#"),
            export: ExportOptions::default(),
            last_cell: None,
            pressing: false,
            status: None,
        }
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let shortcuts = [
            (Modifiers::COMMAND | Modifiers::SHIFT, Key::Z, EditorCommand::Redo),
            (Modifiers::COMMAND, Key::Z, EditorCommand::Undo),
            (Modifiers::COMMAND, Key::Y, EditorCommand::Redo),
            (Modifiers::COMMAND, Key::C, EditorCommand::Copy),
            (Modifiers::COMMAND, Key::X, EditorCommand::Cut),
            (Modifiers::COMMAND, Key::V, EditorCommand::Paste),
            (Modifiers::COMMAND, Key::A, EditorCommand::SelectAll),
            (Modifiers::NONE, Key::Escape, EditorCommand::Cancel),
        ];
        for (mods, key, command) in shortcuts {
            if ctx.input_mut(|i| i.consume_key(mods, key)) {
                self.editor.handle_command(command);
            }
        }

        // Single-letter keys must not steal typing from the hex field.
        if ctx.wants_keyboard_input() {
            return;
        }
        let letters = [
            (Key::Delete, EditorCommand::ClearSelectionContent),
            (Key::H, EditorCommand::FlipHorizontal),
            (Key::V, EditorCommand::FlipVertical),
            (Key::P, EditorCommand::SetTool(Tool::Pencil)),
            (Key::E, EditorCommand::SetTool(Tool::Eraser)),
            (Key::F, EditorCommand::SetTool(Tool::Fill)),
            (Key::I, EditorCommand::SetTool(Tool::ColorPicker)),
            (Key::S, EditorCommand::SetTool(Tool::Select)),
        ];
        for (key, command) in letters {
            if ctx.input_mut(|i| i.consume_key(Modifiers::NONE, key)) {
                self.editor.handle_command(command);
            }
        }
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    fn open(&mut self) {
        let Some(path) = io::pick_open_path() else { return };
        match self.editor.open_file(&path) {
            Ok(()) => {
                self.rows_input = self.editor.grid().rows().to_string();
                self.cols_input = self.editor.grid().cols().to_string();
                self.editor.palette().save();
                self.set_status(format!("Opened {}", path.display()));
            }
            Err(e) => self.set_status(format!("Could not open {}: {}", path.display(), e)),
        }
    }

    fn save(&mut self, save_as: bool) {
        let path = match self.editor.project().path.clone() {
            Some(p) if !save_as => p,
            _ => match io::pick_save_path(&self.editor.project().name) {
                Some(p) => p,
                None => return,
            },
        };
        let shown = path.display().to_string();
        match self.editor.save_file(path) {
            Ok(()) => self.set_status(format!("Saved {}", shown)),
            Err(e) => self.set_status(format!("Could not save {}: {}", shown, e)),
        }
    }

    fn export(&mut self) {
        let Some(path) = io::pick_export_path(&self.editor.project().name) else { return };
        match self.editor.export_image(&path, &self.export) {
            Ok(()) => self.set_status(format!("Exported {}", path.display())),
            Err(e) => self.set_status(format!("Export failed: {}", e)),
        }
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            if ui.button("Open").clicked() {
                self.open();
            }
            if ui.button("Save").clicked() {
                self.save(false);
            }
            if ui.button("Save As").clicked() {
                self.save(true);
            }
            ui.separator();

            for tool in Tool::TOOLBAR {
                let hint = tool.shortcut().map(|c| format!("{} ({})", tool.label(), c));
                let resp = ui.selectable_label(self.editor.tool() == tool, tool.label());
                if resp.on_hover_text(hint.unwrap_or_default()).clicked() {
                    self.editor.handle_command(EditorCommand::SetTool(tool));
                }
            }
            if let Some(preview) = self.editor.paste_preview() {
                let block = preview.data();
                ui.label(format!("Pasting {}x{} (Esc to cancel)", block.height(), block.width()));
            }
            ui.separator();

            let history = self.editor.history();
            let undo_tip = history.undo_description().map(|d| format!("Undo {}", d)).unwrap_or_default();
            let redo_tip = history.redo_description().map(|d| format!("Redo {}", d)).unwrap_or_default();
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
            if ui.add_enabled(can_undo, egui::Button::new("Undo")).on_hover_text(undo_tip).clicked() {
                self.editor.handle_command(EditorCommand::Undo);
            }
            if ui.add_enabled(can_redo, egui::Button::new("Redo")).on_hover_text(redo_tip).clicked() {
                self.editor.handle_command(EditorCommand::Redo);
            }
            ui.separator();

            let has_selection = self.editor.selection().has_selection();
            let floating = self.editor.selection().is_floating();
            if ui.add_enabled(has_selection, egui::Button::new("Copy")).clicked() {
                self.editor.handle_command(EditorCommand::Copy);
            }
            if ui.add_enabled(has_selection, egui::Button::new("Cut")).clicked() {
                self.editor.handle_command(EditorCommand::Cut);
            }
            if ui.add_enabled(self.editor.clipboard().has_data(), egui::Button::new("Paste")).clicked() {
                self.editor.handle_command(EditorCommand::Paste);
            }
            if ui.add_enabled(floating, egui::Button::new("Flip H")).clicked() {
                self.editor.handle_command(EditorCommand::FlipHorizontal);
            }
            if ui.add_enabled(floating, egui::Button::new("Flip V")).clicked() {
                self.editor.handle_command(EditorCommand::FlipVertical);
            }
            if ui.add_enabled(has_selection, egui::Button::new("Fill Selection")).clicked() {
                self.editor.handle_command(EditorCommand::FillSelection);
            }
            ui.separator();

            if ui.button("Clear All").clicked() {
                self.editor.handle_command(EditorCommand::ClearAll);
            }
        });

        ui.horizontal(|ui| {
            ui.label("Rows");
            ui.add(egui::TextEdit::singleline(&mut self.rows_input).desired_width(32.0));
            ui.label("Cols");
            ui.add(egui::TextEdit::singleline(&mut self.cols_input).desired_width(32.0));
            if ui.button("Resize").on_hover_text("Clears the grid and its history").clicked() {
                let (rows, cols) = (clamp_grid_size(&self.rows_input), clamp_grid_size(&self.cols_input));
                self.rows_input = rows.to_string();
                self.cols_input = cols.to_string();
                self.editor.handle_command(EditorCommand::Resize { rows, cols });
            }
            ui.separator();

            ui.label("Export");
            ui.add(egui::Slider::new(&mut self.export.resolution, 1..=MAX_EXPORT_RESOLUTION).suffix("×"));
            ui.checkbox(&mut self.export.include_grid_lines, "Grid lines");
            if ui.button("Export Image").clicked() {
                self.export();
            }
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Colors");
        let current = self.editor.current_color();
        ui.horizontal(|ui| {
            let mut rgb = [current.r, current.g, current.b];
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                self.editor.handle_command(EditorCommand::SetColor(Color::rgb(rgb[0], rgb[1], rgb[2])));
            }
            ui.monospace(current.to_hex());
        });

        let mut clicked = None;
        let mut removed = None;
        ui.horizontal_wrapped(|ui| {
            for &color in self.editor.palette().colors() {
                let (rect, resp) = ui.allocate_exact_size(Vec2::splat(24.0), Sense::click());
                ui.painter().rect_filled(rect, 3.0, color.to_color32());
                let edge = if color == current { color.contrast().to_color32() } else { Color32::GRAY };
                ui.painter().rect_stroke(rect, 3.0, Stroke::new(if color == current { 2.0 } else { 1.0 }, edge));
                let resp = resp.on_hover_text(format!("{} (right-click to remove)", color));
                if resp.clicked() {
                    clicked = Some(color);
                }
                if resp.secondary_clicked() {
                    removed = Some(color);
                }
            }
        });
        if let Some(color) = clicked {
            self.editor.handle_command(EditorCommand::SetColor(color));
        }
        if let Some(color) = removed {
            if self.editor.remove_palette_color(color) {
                self.editor.palette().save();
            } else {
                self.set_status("The last palette color cannot be removed");
            }
        }

        ui.horizontal(|ui| {
            let resp = ui.add(egui::TextEdit::singleline(&mut self.hex_input).desired_width(80.0));
            let submitted = resp.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));
            if ui.button("Add").clicked() || submitted {
                match self.editor.add_palette_color(&self.hex_input) {
                    Ok(_) => {
                        self.editor.palette().save();
                        self.hex_input = String::from("#");
                    }
                    Err(e) => self.set_status(e.to_string()),
                }
            }
        });

        ui.separator();
        ui.heading("History");
        if !self.editor.history().can_undo() {
            ui.weak("Nothing to undo");
        }
        let mut undo_steps = None;
        egui::ScrollArea::vertical().max_height(ui.available_height() - 40.0).show(ui, |ui| {
            for (i, action) in self.editor.history().undo_actions().enumerate() {
                let label = format!("{} ({} cells)", action.description(), action.changes().len());
                let resp = ui
                    .selectable_label(i == 0, label)
                    .on_hover_text(action.timestamp().format("%H:%M:%S").to_string());
                if resp.clicked() && i > 0 {
                    undo_steps = Some(i);
                }
            }
        });
        if let Some(steps) = undo_steps {
            self.editor.undo_to(steps);
        }
        let history = self.editor.history();
        ui.weak(format!(
            "{} undo, {} redo, {:.1} KB",
            history.undo_count(),
            history.redo_count(),
            history.memory_usage() as f32 / 1024.0
        ));

        if let Some(status) = &self.status {
            ui.separator();
            ui.label(status);
        }
    }

    // ------------------------------------------------------------------
    // Grid
    // ------------------------------------------------------------------

    fn grid_view(&mut self, ui: &mut egui::Ui) {
        let (rows, cols) = (self.editor.grid().rows(), self.editor.grid().cols());
        let avail = ui.available_size();
        let cell = (avail.x / cols as f32).min(avail.y / rows as f32).floor().clamp(MIN_CELL_PX, MAX_CELL_PX);
        let size = Vec2::new(cell * cols as f32, cell * rows as f32);
        let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
        let response = if self.editor.tool().is_stroke() {
            response.on_hover_cursor(egui::CursorIcon::Crosshair)
        } else {
            response
        };
        let origin = response.rect.min;

        let cell_at = |p: Pos2, clamp: bool| -> Option<CellPos> {
            let rel = (p - origin) / cell;
            let (r, c) = (rel.y.floor(), rel.x.floor());
            if clamp {
                return Some(CellPos::new(
                    r.clamp(0.0, (rows - 1) as f32) as usize,
                    c.clamp(0.0, (cols - 1) as f32) as usize,
                ));
            }
            (r >= 0.0 && c >= 0.0 && (r as usize) < rows && (c as usize) < cols)
                .then(|| CellPos::new(r as usize, c as usize))
        };

        self.feed_pointer(ui, &response, &cell_at);

        let cell_rect = |pos: CellPos| {
            Rect::from_min_size(origin + Vec2::new(pos.col as f32 * cell, pos.row as f32 * cell), Vec2::splat(cell))
        };
        let line = Stroke::new(1.0, Color::GRID_LINE.to_color32());
        for pos in self.editor.grid().positions() {
            let rect = cell_rect(pos);
            let color = self.editor.displayed_color(pos).unwrap_or(Color::BACKGROUND);
            painter.rect_filled(rect, 0.0, color.to_color32());
            if self.editor.is_highlighted(pos) {
                painter.rect_filled(rect, 0.0, SELECTION_TINT);
            }
            painter.rect_stroke(rect, 0.0, line);
        }

        if let Some(rect) = self.editor.selection().rect() {
            let min = cell_rect(CellPos::new(rect.min_row, rect.min_col)).min;
            let max = cell_rect(CellPos::new(rect.max_row, rect.max_col)).max;
            painter.rect_stroke(Rect::from_min_max(min, max), 0.0, Stroke::new(2.0, SELECTION_EDGE));
        }
        if let Some(layer) = self.editor.selection().floating() {
            let (r0, r1, c0, c1) = layer.rel_bounds();
            let (ar, ac) = layer.anchor;
            let min = origin + Vec2::new((ac + c0) as f32 * cell, (ar + r0) as f32 * cell);
            let max = origin + Vec2::new((ac + c1 + 1) as f32 * cell, (ar + r1 + 1) as f32 * cell);
            painter.rect_stroke(Rect::from_min_max(min, max), 0.0, Stroke::new(2.0, SELECTION_EDGE));
        }
        if let Some(preview) = self.editor.paste_preview() {
            let changing = Stroke::new(1.0, PASTE_EDGE);
            for cell in preview.overlay().iter().filter(|c| c.shown != c.original) {
                painter.rect_stroke(cell_rect(cell.pos).shrink(1.0), 0.0, changing);
            }
            if let Some(target) = preview.target() {
                painter.rect_stroke(cell_rect(target), 0.0, Stroke::new(2.0, PASTE_EDGE));
            }
        }
    }

    /// Press, drag and release become Down/Drag/Up; free movement becomes Hover.
    /// Repeated samples over the same cell are dropped.
    fn feed_pointer(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        cell_at: &dyn Fn(Pos2, bool) -> Option<CellPos>,
    ) {
        let (pressed, down, released, pos) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });

        if pressed && response.hovered() {
            if let Some(cell) = pos.and_then(|p| cell_at(p, false)) {
                self.pressing = true;
                self.last_cell = Some(cell);
                self.editor.handle_pointer(PointerEvent::Down(cell));
            }
        } else if self.pressing && down {
            if let Some(cell) = pos.and_then(|p| cell_at(p, true))
                && self.last_cell != Some(cell)
            {
                self.last_cell = Some(cell);
                self.editor.handle_pointer(PointerEvent::Drag(cell));
            }
        } else if self.pressing && (released || !down) {
            self.pressing = false;
            self.editor.handle_pointer(PointerEvent::Up);
        } else if let Some(cell) = response.hover_pos().and_then(|p| cell_at(p, false))
            && self.last_cell != Some(cell)
        {
            self.last_cell = Some(cell);
            self.editor.handle_pointer(PointerEvent::Hover(cell));
        }
    }
}

impl eframe::App for CrochetApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "CrochetFE - {}",
            self.editor.project().display_title()
        )));

        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::SidePanel::right("side_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| self.side_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.grid_view(ui));
    }
}
