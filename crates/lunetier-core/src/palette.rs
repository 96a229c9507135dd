//! The closed color set every selection and suggestion is validated against.

use serde::{Deserialize, Serialize};

/// One palette entry: display name plus `#rrggbb` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorOption {
    pub name: &'static str,
    pub value: &'static str,
}

impl ColorOption {
    pub const fn new(name: &'static str, value: &'static str) -> Self {
        Self { name, value }
    }
}

/// Every color the configurator may apply, in display order. Swatch groups,
/// the suggestion prompt, and reply validation all draw from this list.
pub const COLOR_PALETTE: &[ColorOption] = &[
    ColorOption::new("Noir", "#1f1f1f"),
    ColorOption::new("Anthracite", "#3a3a3a"),
    ColorOption::new("Beige", "#d4c5a0"),
    ColorOption::new("Écaille", "#a5653f"),
    ColorOption::new("Ivoire", "#f5f1e6"),
    ColorOption::new("Bleu", "#5678ff"),
    ColorOption::new("Vert", "#4caf50"),
    ColorOption::new("Rouge", "#e03d3d"),
    ColorOption::new("Rose", "#eaa0b5"),
];

/// Case-insensitive palette lookup; leading/trailing whitespace in the query
/// is ignored. Returns `None` for anything outside the palette.
pub fn find_color_by_name(name: &str) -> Option<ColorOption> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    COLOR_PALETTE
        .iter()
        .copied()
        .find(|color| color.name.to_lowercase() == needle)
}

/// A selected color as carried in configurator state: hex value plus the
/// display label, replaced wholesale on each selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub value: String,
    pub label: String,
}

impl From<ColorOption> for PaletteColor {
    fn from(option: ColorOption) -> Self {
        Self {
            value: option.value.to_string(),
            label: option.name.to_string(),
        }
    }
}

/// A named color as exchanged with the suggestion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorChoice {
    pub name: String,
    pub value: String,
}

impl From<ColorOption> for ColorChoice {
    fn from(option: ColorOption) -> Self {
        Self {
            name: option.name.to_string(),
            value: option.value.to_string(),
        }
    }
}

/// The three color slots of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRole {
    Branches,
    Frame,
    Lenses,
}

impl ColorRole {
    /// Label used in user-facing feedback lines.
    pub const fn feedback_label(self) -> &'static str {
        match self {
            Self::Branches => "branches",
            Self::Frame => "monture",
            Self::Lenses => "verres",
        }
    }
}

/// Expands `#rrggbb` into an `rgba(r, g, b, alpha)` string. Returns `None`
/// unless the input is exactly six hex digits (with or without the leading
/// `#`).
pub fn hex_to_rgba(hex: &str, alpha: f64) -> Option<String> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let packed = u32::from_str_radix(digits, 16).ok()?;
    let r = (packed >> 16) & 0xff;
    let g = (packed >> 8) & 0xff;
    let b = packed & 0xff;
    Some(format!("rgba({r}, {g}, {b}, {alpha})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let color = find_color_by_name("  bleu ").expect("color");
        assert_eq!(color.value, "#5678ff");
        assert_eq!(find_color_by_name("écaille").map(|c| c.name), Some("Écaille"));
    }

    #[test]
    fn lookup_rejects_unknown_and_empty_names() {
        assert!(find_color_by_name("Turquoise").is_none());
        assert!(find_color_by_name("   ").is_none());
    }

    #[test]
    fn rgba_expansion_matches_reference_tint() {
        assert_eq!(
            hex_to_rgba("#5678FF", 0.45).as_deref(),
            Some("rgba(86, 120, 255, 0.45)")
        );
        assert_eq!(
            hex_to_rgba("1f1f1f", 1.0).as_deref(),
            Some("rgba(31, 31, 31, 1)")
        );
    }

    #[test]
    fn rgba_expansion_rejects_malformed_hex() {
        assert!(hex_to_rgba("#fff", 0.45).is_none());
        assert!(hex_to_rgba("#12345g", 0.45).is_none());
        assert!(hex_to_rgba("", 0.45).is_none());
    }
}
