use eframe::egui::Color32;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// COLOR - strict #RRGGBB cell color
// ============================================================================

/// A flat, opaque cell color.  Always rendered as upper-case `#RRGGBB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Rejected color input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorError(pub String);

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid color '{}': expected #RRGGBB", self.0)
    }
}

impl std::error::Error for ColorError {}

impl Color {
    /// Empty cells. Erasing, clearing and detaching all write this.
    pub const BACKGROUND: Color = Color::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    /// Grid line color used by image export and the canvas view.
    pub const GRID_LINE: Color = Color::rgb(0xCC, 0xCC, 0xCC);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (hex digits in either case).  Anything else is rejected,
    /// including shorthand `#RGB`, missing `#` and surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, ColorError> {
        let bytes = s.as_bytes();
        if bytes.len() != 7 || bytes[0] != b'#' || !bytes[1..].iter().all(u8::is_ascii_hexdigit) {
            return Err(ColorError(s.to_string()));
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ColorError(s.to_string()));
        Ok(Self::rgb(channel(1)?, channel(3)?, channel(5)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn is_background(self) -> bool {
        self == Self::BACKGROUND
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }

    pub fn to_color32(self) -> Color32 {
        Color32::from_rgb(self.r, self.g, self.b)
    }

    /// Black or white, whichever reads better on top of this color.
    pub fn contrast(self) -> Color {
        let luma = 0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32;
        if luma > 140.0 { Color::BLACK } else { Color::BACKGROUND }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BACKGROUND
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

// ============================================================================
// PALETTE - user-managed swatches, persisted between sessions
// ============================================================================

pub const DEFAULT_PALETTE: [Color; 4] = [
    Color::rgb(0xFF, 0x00, 0x00),
    Color::rgb(0x00, 0x00, 0xFF),
    Color::rgb(0xFF, 0xFF, 0x00),
    Color::rgb(0x00, 0x00, 0x00),
];

/// Ordered list of unique swatches.  Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Default for Palette {
    fn default() -> Self {
        Self { colors: DEFAULT_PALETTE.to_vec() }
    }
}

impl Palette {
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn contains(&self, color: Color) -> bool {
        self.colors.contains(&color)
    }

    pub fn first(&self) -> Color {
        self.colors.first().copied().unwrap_or(Color::BLACK)
    }

    /// Append a swatch.  Returns `false` when it was already present.
    pub fn add(&mut self, color: Color) -> bool {
        if self.contains(color) {
            return false;
        }
        self.colors.push(color);
        true
    }

    /// Parse then add.  Invalid input never reaches the palette.
    pub fn add_hex(&mut self, hex: &str) -> Result<Color, ColorError> {
        let color = Color::parse(hex.trim())?;
        self.add(color);
        Ok(color)
    }

    /// Remove a swatch.  The last remaining swatch cannot be removed.
    pub fn remove(&mut self, color: Color) -> bool {
        if self.colors.len() <= 1 {
            return false;
        }
        let before = self.colors.len();
        self.colors.retain(|c| *c != color);
        before != self.colors.len()
    }

    /// Replace every swatch (grid file import).  Duplicates are dropped;
    /// an empty list leaves the palette unchanged.
    pub fn replace_all(&mut self, colors: &[Color]) -> bool {
        let mut unique: Vec<Color> = Vec::with_capacity(colors.len());
        for c in colors {
            if !unique.contains(c) {
                unique.push(*c);
            }
        }
        if unique.is_empty() {
            return false;
        }
        self.colors = unique;
        true
    }

    // ------------------------------------------------------------------
    // Persistence: key=value settings file
    // ------------------------------------------------------------------

    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("CrochetFE").join("crochetfe_palette.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("CrochetFE")
                    .join("crochetfe_palette.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("crochetfe").join("crochetfe_palette.cfg"))
        }
    }

    /// Load the saved palette, falling back to the defaults.
    pub fn load() -> Self {
        Self::settings_path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };

        let mut palette = Self { colors: Vec::new() };
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            if key.trim() != "palette" {
                continue;
            }
            for hex in val.split(',') {
                match Color::parse(hex.trim()) {
                    Ok(c) => {
                        palette.add(c);
                    }
                    Err(e) => crate::log_warn!("Skipping saved swatch: {}", e),
                }
            }
        }
        if palette.is_empty() { Self::default() } else { palette }
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_err!("Failed to save palette to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let joined: Vec<String> = self.colors.iter().map(|c| c.to_hex()).collect();
        std::fs::write(path, format!("palette={}\n", joined.join(",")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_strict_hex_only() {
        assert_eq!(Color::parse("#ff0000"), Ok(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("#00Ff7a").map(Color::to_hex), Ok("#00FF7A".to_string()));
        for bad in ["FF0000", "#FFF", "#GG0000", " #FF0000", "#FF00000", "", "#ＦＦ0000"] {
            assert!(Color::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn serde_uses_hex_strings() {
        let json = serde_json::to_string(&Color::rgb(1, 2, 3)).unwrap();
        assert_eq!(json, "\"#010203\"");
        assert!(serde_json::from_str::<Color>("\"red\"").is_err());
    }

    #[test]
    fn palette_add_is_unique_and_remove_keeps_one() {
        let mut p = Palette::default();
        assert!(!p.add(Color::rgb(0xFF, 0, 0)));
        assert!(p.add_hex("#123456").is_ok());
        assert!(p.add_hex("123456").is_err());
        assert_eq!(p.len(), 5);

        let mut single = Palette::default();
        single.replace_all(&[Color::BLACK]);
        assert!(!single.remove(Color::BLACK));
        assert_eq!(single.colors(), &[Color::BLACK]);
    }

    #[test]
    fn replace_all_ignores_empty_input() {
        let mut p = Palette::default();
        assert!(!p.replace_all(&[]));
        assert_eq!(p, Palette::default());
        assert!(p.replace_all(&[Color::BLACK, Color::BLACK, Color::BACKGROUND]));
        assert_eq!(p.colors(), &[Color::BLACK, Color::BACKGROUND]);
    }

    #[test]
    fn palette_round_trips_through_settings_file() {
        let path = std::env::temp_dir().join(format!("crochetfe_palette_{}.cfg", uuid::Uuid::new_v4()));
        let mut p = Palette::default();
        p.add(Color::rgb(0x12, 0x34, 0x56));
        p.save_to(&path).unwrap();
        assert_eq!(Palette::load_from(&path), p);
        let _ = std::fs::remove_file(&path);

        assert_eq!(Palette::load_from(&path), Palette::default());
    }
}
