//! Event-driven configurator session.
//!
//! The session owns the one state record and the scene, translates discrete
//! events into state transitions, enforces the radio-like selection
//! semantics, and reports the narrowest repaint each event requires. Hosts
//! never mutate state directly.

use serde::{Deserialize, Serialize};

use crate::error::{SceneError, SessionError};
use crate::material::{FALLBACK_MATERIAL_ID, FALLBACK_MATERIAL_LABEL, MaterialCatalog, MaterialEntry};
use crate::model::{ConfiguratorState, FrameShape, FrameTexture};
use crate::palette::{COLOR_PALETTE, ColorChoice, ColorRole, PaletteColor};
use crate::render;
use crate::scene::{FrameTemplate, SvgScene};

/// Default swatch index per palette group. The lens group preselects a
/// curated tint partway down the list; out-of-range indices fall back to
/// the first entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteDefaults {
    pub branches: usize,
    pub frame: usize,
    pub lenses: usize,
}

impl Default for PaletteDefaults {
    fn default() -> Self {
        Self {
            branches: 0,
            frame: 0,
            lenses: 4,
        }
    }
}

/// One radio-like swatch group: its entries and the single active index.
///
/// Groups are always built from [`COLOR_PALETTE`] and therefore never empty.
#[derive(Debug, Clone)]
pub struct PaletteGroup {
    entries: Vec<PaletteColor>,
    active: usize,
}

impl PaletteGroup {
    fn new(entries: Vec<PaletteColor>, default_index: usize) -> Self {
        let active = if default_index < entries.len() {
            default_index
        } else {
            0
        };
        Self { entries, active }
    }

    pub fn entries(&self) -> &[PaletteColor] {
        &self.entries
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &PaletteColor {
        &self.entries[self.active]
    }

    fn select(&mut self, index: usize) -> Option<PaletteColor> {
        let entry = self.entries.get(index)?.clone();
        self.active = index;
        Some(entry)
    }

    fn index_of_name(&self, name: &str) -> Option<usize> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .position(|entry| entry.label.to_lowercase() == needle)
    }
}

/// A discrete user action the session can apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfiguratorEvent {
    SelectColor { role: ColorRole, index: usize },
    SelectTexture { material_id: String },
    ClearTexture,
    SetBridgeWidth(f64),
    SetLensSize(f64),
    SetShape(FrameShape),
    SetMaterial { material_id: String },
}

/// What a host must repaint after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderScope {
    /// Colors, texture, geometry, and the summary all changed.
    Full,
    /// Frame fill/stroke only (bridge slider).
    FrameOnly,
    /// Lens transform only (size slider).
    LensGeometry,
    /// Lens transform plus the summary line (shape change).
    LensAndSummary,
    /// Summary line only (material label change).
    SummaryOnly,
    /// No visible change.
    Nothing,
}

/// Canonical body for the save endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub name: String,
    /// Percent-encoded serialized scene markup.
    pub code_svg: String,
    pub largeur_pont: f64,
    pub taille_verre: f64,
    pub materiau_id: String,
    pub user_id: String,
    pub metadata: SaveMetadata,
}

/// Raw selections, kept separate from the structural fields for forward
/// compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMetadata {
    pub branches_color: String,
    pub frame_color: String,
    pub lenses_color: String,
    pub frame_texture_id: Option<String>,
    pub frame_texture_label: Option<String>,
    pub shape: String,
    pub material_label: String,
}

/// Palette choices coming back from the suggestion service; roles the model
/// missed are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedPalette {
    pub branches: Option<ColorChoice>,
    pub frame: Option<ColorChoice>,
    pub lenses: Option<ColorChoice>,
    pub reason: Option<String>,
}

/// Which roles a suggestion actually changed, plus the feedback line shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedSuggestion {
    pub branches: bool,
    pub frame: bool,
    pub lenses: bool,
    pub message: String,
}

/// The single owner of configurator state for one visitor.
#[derive(Debug, Clone)]
pub struct ConfiguratorSession {
    state: ConfiguratorState,
    scene: SvgScene,
    branches: PaletteGroup,
    frame: PaletteGroup,
    lenses: PaletteGroup,
    materials: MaterialCatalog,
    selected_material_id: String,
    active_texture_material: Option<String>,
}

impl ConfiguratorSession {
    /// Builds a session over the given artwork and applies the initial
    /// render so scene and state agree from the start.
    pub fn new(template: &FrameTemplate, defaults: PaletteDefaults) -> Result<Self, SceneError> {
        let scene = SvgScene::from_template(template)?;
        let palette: Vec<PaletteColor> =
            COLOR_PALETTE.iter().copied().map(PaletteColor::from).collect();
        let branches = PaletteGroup::new(palette.clone(), defaults.branches);
        let frame = PaletteGroup::new(palette.clone(), defaults.frame);
        let lenses = PaletteGroup::new(palette, defaults.lenses);
        let state = ConfiguratorState {
            branches: branches.active().clone(),
            frame: frame.active().clone(),
            lenses: lenses.active().clone(),
            ..ConfiguratorState::default()
        };
        let mut session = Self {
            state,
            scene,
            branches,
            frame,
            lenses,
            materials: MaterialCatalog::default(),
            selected_material_id: String::new(),
            active_texture_material: None,
        };
        render::apply_all(&session.state, &mut session.scene);
        Ok(session)
    }

    /// Session over the stock artwork with the standard group defaults.
    pub fn classic() -> Result<Self, SceneError> {
        Self::new(&FrameTemplate::classic(), PaletteDefaults::default())
    }

    pub fn state(&self) -> &ConfiguratorState {
        &self.state
    }

    pub fn scene(&self) -> &SvgScene {
        &self.scene
    }

    pub fn group(&self, role: ColorRole) -> &PaletteGroup {
        match role {
            ColorRole::Branches => &self.branches,
            ColorRole::Frame => &self.frame,
            ColorRole::Lenses => &self.lenses,
        }
    }

    pub fn materials(&self) -> &MaterialCatalog {
        &self.materials
    }

    pub fn selected_material_id(&self) -> &str {
        &self.selected_material_id
    }

    /// Current summary line.
    pub fn summary(&self) -> String {
        render::summary_line(&self.state)
    }

    /// Serialized scene markup, as submitted on save.
    pub fn markup(&self) -> String {
        self.scene.to_markup()
    }

    /// Applies one event and reports the narrowest repaint it requires.
    pub fn apply(&mut self, event: ConfiguratorEvent) -> RenderScope {
        match event {
            ConfiguratorEvent::SelectColor { role, index } => self.select_color(role, index),
            ConfiguratorEvent::SelectTexture { material_id } => self.select_texture(&material_id),
            ConfiguratorEvent::ClearTexture => {
                self.clear_texture();
                render::apply_all(&self.state, &mut self.scene);
                RenderScope::Full
            }
            ConfiguratorEvent::SetBridgeWidth(value) => {
                if !value.is_finite() {
                    return RenderScope::Nothing;
                }
                self.state.bridge_mm = value;
                render::apply_frame_style(&self.state, &mut self.scene);
                RenderScope::FrameOnly
            }
            ConfiguratorEvent::SetLensSize(value) => {
                if !value.is_finite() {
                    return RenderScope::Nothing;
                }
                self.state.lens_size_mm = value;
                render::apply_lens_scale(&self.state, &mut self.scene);
                RenderScope::LensGeometry
            }
            ConfiguratorEvent::SetShape(shape) => {
                self.state.shape = shape;
                render::apply_lens_scale(&self.state, &mut self.scene);
                RenderScope::LensAndSummary
            }
            ConfiguratorEvent::SetMaterial { material_id } => self.set_material(&material_id),
        }
    }

    /// Installs a fetched material list: the first entry becomes the
    /// selected material and every entry with an image backs a swatch. An
    /// empty list just leaves the gallery empty.
    pub fn load_materials(&mut self, entries: Vec<MaterialEntry>) -> RenderScope {
        self.materials = MaterialCatalog::from_entries(entries);
        if let Some(first) = self.materials.entries().first() {
            self.selected_material_id = first.id.clone();
            self.state.material_label = first.display_label().to_string();
        }
        RenderScope::SummaryOnly
    }

    /// Falls back to the standard material when the gallery could not load
    /// at all.
    pub fn materials_unavailable(&mut self) -> RenderScope {
        self.materials = MaterialCatalog::default();
        self.selected_material_id = FALLBACK_MATERIAL_ID.to_string();
        self.state.material_label = FALLBACK_MATERIAL_LABEL.to_string();
        RenderScope::SummaryOnly
    }

    /// Selects a palette entry by display name, as the suggestion flow
    /// does. Returns whether a matching entry existed.
    pub fn select_color_by_name(&mut self, role: ColorRole, name: &str) -> bool {
        let Some(index) = self.group(role).index_of_name(name) else {
            return false;
        };
        self.select_color(role, index);
        true
    }

    /// Validates and assembles the save body. Identity is checked before
    /// the name, and nothing leaves the process when either check fails.
    pub fn save_payload(&self, name: &str, user_id: &str) -> Result<SavePayload, SessionError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(SessionError::MissingUser);
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        Ok(SavePayload {
            name: name.to_string(),
            code_svg: urlencoding::encode(&self.scene.to_markup()).into_owned(),
            largeur_pont: self.state.bridge_mm,
            taille_verre: self.state.lens_size_mm,
            materiau_id: self.selected_material_id.clone(),
            user_id: user_id.to_string(),
            metadata: SaveMetadata {
                branches_color: self.state.branches.value.clone(),
                frame_color: self.state.frame.value.clone(),
                lenses_color: self.state.lenses.value.clone(),
                frame_texture_id: self
                    .state
                    .frame_texture
                    .as_ref()
                    .map(|texture| texture.pattern_id.clone()),
                frame_texture_label: self
                    .state
                    .frame_texture
                    .as_ref()
                    .map(|texture| texture.label.clone()),
                shape: self.state.shape.label().to_string(),
                material_label: self.state.material_label.clone(),
            },
        })
    }

    /// Applies the matched subset of a suggestion. All three roles missing
    /// from the palette is a rejection; partial matches are applied and
    /// reported as such.
    pub fn apply_suggestion(
        &mut self,
        suggestion: &SuggestedPalette,
    ) -> Result<AppliedSuggestion, SessionError> {
        let mut applied = AppliedSuggestion {
            branches: false,
            frame: false,
            lenses: false,
            message: String::new(),
        };
        let mut lines = vec!["Nouvelle palette appliquée :".to_string()];
        if let Some(choice) = &suggestion.branches {
            applied.branches = self.select_color_by_name(ColorRole::Branches, &choice.name);
            if applied.branches {
                lines.push(format!(
                    "{} → {}",
                    ColorRole::Branches.feedback_label(),
                    choice.name
                ));
            }
        }
        if let Some(choice) = &suggestion.frame {
            applied.frame = self.select_color_by_name(ColorRole::Frame, &choice.name);
            if applied.frame {
                lines.push(format!(
                    "{} → {}",
                    ColorRole::Frame.feedback_label(),
                    choice.name
                ));
            }
        }
        if let Some(choice) = &suggestion.lenses {
            applied.lenses = self.select_color_by_name(ColorRole::Lenses, &choice.name);
            if applied.lenses {
                lines.push(format!(
                    "{} → {}",
                    ColorRole::Lenses.feedback_label(),
                    choice.name
                ));
            }
        }
        if !(applied.branches || applied.frame || applied.lenses) {
            return Err(SessionError::SuggestionRejected);
        }
        render::apply_all(&self.state, &mut self.scene);
        let mut message = lines.join(" ");
        if let Some(reason) = suggestion.reason.as_deref() {
            if !reason.is_empty() {
                message.push('\n');
                message.push_str(reason);
            }
        }
        applied.message = message;
        Ok(applied)
    }

    fn group_mut(&mut self, role: ColorRole) -> &mut PaletteGroup {
        match role {
            ColorRole::Branches => &mut self.branches,
            ColorRole::Frame => &mut self.frame,
            ColorRole::Lenses => &mut self.lenses,
        }
    }

    fn select_color(&mut self, role: ColorRole, index: usize) -> RenderScope {
        let Some(selected) = self.group_mut(role).select(index) else {
            return RenderScope::Nothing;
        };
        match role {
            ColorRole::Branches => self.state.branches = selected,
            ColorRole::Frame => {
                self.state.frame = selected;
                // Color and texture are mutually exclusive fill sources.
                self.clear_texture();
            }
            ColorRole::Lenses => self.state.lenses = selected,
        }
        render::apply_all(&self.state, &mut self.scene);
        RenderScope::Full
    }

    fn select_texture(&mut self, material_id: &str) -> RenderScope {
        if self.active_texture_material.as_deref() == Some(material_id) {
            return RenderScope::Nothing;
        }
        let Some(entry) = self.materials.entry(material_id) else {
            return RenderScope::Nothing;
        };
        let Some(image_url) = entry.image_url.clone() else {
            return RenderScope::Nothing;
        };
        let pattern_id = entry.pattern_id();
        let label = entry.label.clone();
        self.scene.ensure_pattern(&pattern_id, &image_url);
        self.active_texture_material = Some(material_id.to_string());
        self.state.frame_texture = Some(FrameTexture { pattern_id, label });
        render::apply_all(&self.state, &mut self.scene);
        RenderScope::Full
    }

    fn clear_texture(&mut self) {
        self.active_texture_material = None;
        self.state.frame_texture = None;
    }

    fn set_material(&mut self, material_id: &str) -> RenderScope {
        let Some(entry) = self.materials.entry(material_id) else {
            return RenderScope::Nothing;
        };
        self.state.material_label = entry.display_label().to_string();
        self.selected_material_id = material_id.to_string();
        RenderScope::SummaryOnly
    }
}
