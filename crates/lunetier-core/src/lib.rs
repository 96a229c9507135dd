//! Headless eyewear configurator: the palette, state, and scene-graph core
//! shared by the HTTP service and any embedding storefront.
//!
//! Layout: `palette.rs` (closed color set and color helpers), `model.rs`
//! (configurator state and frame shapes), `scene.rs` (SVG scene graph and
//! templates), `render.rs` (state-to-scene projections), `material.rs`
//! (material gallery), `session.rs` (events, selection semantics, payload
//! assembly).

pub mod error;
pub mod material;
pub mod model;
pub mod palette;
pub mod render;
pub mod scene;
pub mod session;

pub use error::{SceneError, SessionError};
pub use material::{
    FALLBACK_MATERIAL_ID, FALLBACK_MATERIAL_LABEL, MaterialCatalog, MaterialEntry, slugify,
};
pub use model::{ConfiguratorState, FrameShape, FrameTexture};
pub use palette::{
    COLOR_PALETTE, ColorChoice, ColorOption, ColorRole, PaletteColor, find_color_by_name,
    hex_to_rgba,
};
pub use render::{
    LENS_ALPHA, apply_all, apply_branches_color, apply_frame_style, apply_lens_color,
    apply_lens_scale, lens_scale_factors, stroke_width_for_bridge, summary_line,
};
pub use scene::{FrameTemplate, PatternDef, SceneGroup, ScenePath, SvgScene};
pub use session::{
    AppliedSuggestion, ConfiguratorEvent, ConfiguratorSession, PaletteDefaults, PaletteGroup,
    RenderScope, SaveMetadata, SavePayload, SuggestedPalette,
};
