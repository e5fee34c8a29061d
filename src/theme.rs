//! Theme loading: btop-style `theme[key]="value"` and hex → colours.

use crate::Palette;
use crate::game::{CLASSIC_PALETTE, Rgb};
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Theme keys for the seven block colours, in palette order.
const BLOCK_KEYS: [&str; 7] = [
    "block_red",
    "block_green",
    "block_blue",
    "block_yellow",
    "block_magenta",
    "block_cyan",
    "block_purple",
];

/// UI colours plus the block palette handed to the game.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Block colours a new piece is drawn from.
    pub blocks: [Rgb; 7],
    /// Screen and playfield background.
    pub bg: Color,
    /// Borders and preview boxes.
    pub div_line: Color,
    /// Text (score, controls).
    pub main_fg: Color,
    /// Titles and banners.
    pub title: Color,
    /// Settled blocks after game over.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}

impl Theme {
    /// Black background, gray frame, white text, the seven classic blocks.
    pub fn classic() -> Self {
        Self {
            blocks: CLASSIC_PALETTE,
            bg: Color::Rgb(0, 0, 0),
            div_line: Color::Rgb(128, 128, 128),
            main_fg: Color::Rgb(255, 255, 255),
            title: Color::Rgb(255, 255, 255),
            inactive_fg: Color::Rgb(64, 64, 64),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Missing keys keep their classic value; no path means the classic theme.
    /// `palette` then overrides the block colours unless it is `Classic`.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))?
            }
            None => Self::classic(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override block colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Classic => {}
            Palette::HighContrast => {
                self.blocks = [
                    Rgb(0xFF, 0x20, 0x20),
                    Rgb(0x20, 0xFF, 0x20),
                    Rgb(0x30, 0x90, 0xFF),
                    Rgb(0xFF, 0xFF, 0x00),
                    Rgb(0xFF, 0x40, 0xFF),
                    Rgb(0x00, 0xFF, 0xFF),
                    Rgb(0xFF, 0xFF, 0xFF),
                ];
            }
            Palette::Colorblind => {
                // Okabe–Ito
                self.blocks = [
                    Rgb(0xD5, 0x5E, 0x00),
                    Rgb(0x00, 0x9E, 0x73),
                    Rgb(0x00, 0x72, 0xB2),
                    Rgb(0xF0, 0xE4, 0x42),
                    Rgb(0xCC, 0x79, 0xA7),
                    Rgb(0x56, 0xB4, 0xE9),
                    Rgb(0xE6, 0x9F, 0x00),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Result<Self, ThemeError> {
        let classic = Self::classic();
        let get = |key: &str| map.get(key).map(|v| parse_hex(v)).transpose();
        let mut blocks = classic.blocks;
        for (slot, key) in blocks.iter_mut().zip(BLOCK_KEYS) {
            if let Some(rgb) = get(key)? {
                *slot = rgb;
            }
        }
        Ok(Self {
            blocks,
            bg: get("main_bg")?.map_or(classic.bg, to_color),
            div_line: get("div_line")?.map_or(classic.div_line, to_color),
            main_fg: get("main_fg")?.map_or(classic.main_fg, to_color),
            title: get("title")?.map_or(classic.title, to_color),
            inactive_fg: get("inactive_fg")?.map_or(classic.inactive_fg, to_color),
        })
    }
}

#[inline]
pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB".
pub fn parse_hex(s: &str) -> Result<Rgb, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    match s.len() {
        6 => Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Rgb(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        assert_eq!(parse_hex("#98C379").unwrap(), Rgb(0x98, 0xC3, 0x79));
    }

    #[test]
    fn test_parse_hex_3() {
        assert_eq!(parse_hex("#FFF").unwrap(), Rgb(255, 255, 255));
    }

    #[test]
    fn test_parse_hex_invalid() {
        assert!(matches!(parse_hex("#12345"), Err(ThemeError::InvalidHex(_))));
        assert!(matches!(parse_hex("#GG0000"), Err(ThemeError::InvalidHex(_))));
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(
            r##"
# comment
theme[main_bg]="#31353F"
theme[title]='#E5C07B'
theme[empty]=""
"##,
        );
        assert_eq!(map.get("main_bg"), Some(&"#31353F".to_string()));
        assert_eq!(map.get("title"), Some(&"#E5C07B".to_string()));
        assert!(!map.contains_key("empty"));
    }

    #[test]
    fn test_from_map_overrides_and_defaults() {
        let map = parse_theme_file("theme[block_red]=\"#800000\"\ntheme[main_fg]=\"#ABB2BF\"");
        let theme = Theme::from_map(&map).unwrap();
        assert_eq!(theme.blocks[0], Rgb(0x80, 0, 0));
        assert_eq!(theme.blocks[1..], CLASSIC_PALETTE[1..]);
        assert_eq!(theme.main_fg, Color::Rgb(0xAB, 0xB2, 0xBF));
        assert_eq!(theme.bg, Theme::classic().bg);
    }

    #[test]
    fn test_from_map_rejects_bad_hex() {
        let map = parse_theme_file("theme[div_line]=\"nope\"");
        assert!(Theme::from_map(&map).is_err());
    }

    #[test]
    fn test_load_without_file_is_classic() {
        let theme = Theme::load(None, Palette::Classic).unwrap();
        assert_eq!(theme.blocks, CLASSIC_PALETTE);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = Theme::load(Some(Path::new("/nonexistent/sirtet.theme")), Palette::Classic);
        assert!(matches!(err, Err(ThemeError::Io(_))));
    }

    #[test]
    fn test_palette_override() {
        let theme = Theme::load(None, Palette::Colorblind).unwrap();
        assert_ne!(theme.blocks, CLASSIC_PALETTE);
        let distinct: std::collections::HashSet<_> = theme.blocks.iter().collect();
        assert_eq!(distinct.len(), 7);
    }
}
