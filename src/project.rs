use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::canvas::GridState;
use crate::components::history::{DEFAULT_MAX_HISTORY, HistoryManager};

/// Single open pattern.
pub struct Project {
    pub id: Uuid,
    pub grid: GridState,
    pub history: HistoryManager,
    /// `None` for unsaved/untitled patterns.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Default for Project {
    fn default() -> Self {
        Self::new_untitled(1, GridState::default().rows(), GridState::default().cols())
    }
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, rows: usize, cols: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            grid: GridState::new(rows, cols),
            history: HistoryManager::new(DEFAULT_MAX_HISTORY),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    pub fn from_file(path: PathBuf, name: Option<String>, grid: GridState) -> Self {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| name_from_path(&path));

        Self {
            id: Uuid::new_v4(),
            grid,
            history: HistoryManager::new(DEFAULT_MAX_HISTORY),
            path: Some(path),
            is_dirty: false,
            name,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Remember where the pattern was saved and take the name from it.
    pub fn set_path(&mut self, path: PathBuf) {
        self.name = name_from_path(&path);
        self.path = Some(path);
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

fn name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untitled_project_starts_clean() {
        let project = Project::new_untitled(3, 8, 9);
        assert_eq!(project.name, "Untitled-3");
        assert_eq!((project.grid.rows(), project.grid.cols()), (8, 9));
        assert!(!project.history.can_undo());
        assert_eq!(project.display_title(), "Untitled-3");
    }

    #[test]
    fn name_follows_path_and_dirty_flag_shows() {
        let mut project = Project::from_file(PathBuf::from("/tmp/scarf.json"), Some("  ".into()), GridState::default());
        assert_eq!(project.name, "scarf");
        project.mark_dirty();
        assert_eq!(project.display_title(), "scarf*");
        project.set_path(PathBuf::from("blanket.json"));
        project.mark_clean();
        assert_eq!(project.display_title(), "blanket");
    }
}
