//! Configurator state and the frame-shape vocabulary.

use std::fmt;

use crate::palette::{COLOR_PALETTE, PaletteColor};

/// Bridge width the configurator starts with, in millimetres.
pub const DEFAULT_BRIDGE_MM: f64 = 20.0;
/// Lens size the configurator starts with, in millimetres.
pub const DEFAULT_LENS_SIZE_MM: f64 = 50.0;
/// Material label shown before the gallery has loaded.
pub const DEFAULT_MATERIAL_LABEL: &str = "Matériau";

/// Lens-opening silhouette. The two named shapes carry anisotropic scale
/// adjustments; anything else scales uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameShape {
    Rectangulaire,
    Papillon,
    Autre(String),
}

impl FrameShape {
    /// Maps a form value onto a shape, keeping unknown labels verbatim.
    pub fn parse(label: &str) -> Self {
        match label {
            "Rectangulaire" => Self::Rectangulaire,
            "Papillon" => Self::Papillon,
            other => Self::Autre(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Rectangulaire => "Rectangulaire",
            Self::Papillon => "Papillon",
            Self::Autre(label) => label,
        }
    }

    /// Horizontal/vertical multipliers applied on top of the base lens scale.
    pub const fn scale_factors(&self) -> (f64, f64) {
        match self {
            Self::Rectangulaire => (1.1, 0.9),
            Self::Papillon => (1.15, 0.85),
            Self::Autre(_) => (1.0, 1.0),
        }
    }
}

impl Default for FrameShape {
    fn default() -> Self {
        Self::Rectangulaire
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An active image-backed frame fill. Mutually exclusive with a plain frame
/// color fill; the frame color still drives the stroke while a texture is
/// active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTexture {
    /// Pattern identifier referenced by the frame fill (`url(#...)`).
    pub pattern_id: String,
    /// Material label shown in the summary line.
    pub label: String,
}

/// The one mutable record behind a configurator session. Owned by the
/// session and mutated only through its event handlers; only the final
/// snapshot ever leaves the process, on explicit save.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguratorState {
    pub branches: PaletteColor,
    pub frame: PaletteColor,
    pub lenses: PaletteColor,
    pub frame_texture: Option<FrameTexture>,
    /// Last valid bridge width in millimetres; non-finite updates are
    /// dropped before reaching this field.
    pub bridge_mm: f64,
    /// Last valid lens size in millimetres.
    pub lens_size_mm: f64,
    pub shape: FrameShape,
    pub material_label: String,
}

impl Default for ConfiguratorState {
    fn default() -> Self {
        Self {
            branches: PaletteColor::from(COLOR_PALETTE[0]),
            frame: PaletteColor::from(COLOR_PALETTE[0]),
            lenses: PaletteColor::from(COLOR_PALETTE[0]),
            frame_texture: None,
            bridge_mm: DEFAULT_BRIDGE_MM,
            lens_size_mm: DEFAULT_LENS_SIZE_MM,
            shape: FrameShape::default(),
            material_label: DEFAULT_MATERIAL_LABEL.to_string(),
        }
    }
}
