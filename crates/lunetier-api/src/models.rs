//! Wire DTOs for the storefront-facing endpoints.
//!
//! The configurator script consumes these shapes verbatim, so the field
//! casing (`lunetteId`, `imageUrl`) is part of the contract and the mapping
//! from store records stays next to the handlers that serve it.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use lunetier_core::{ColorChoice, SuggestedPalette};
use lunetier_store::MaterialRecord;
use lunetier_suggest::CurrentColors;

/// Error envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReply {
    pub success: bool,
    pub error: String,
}

/// Acknowledgement returned once a design and its ownership link are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveReply {
    pub success: bool,
    #[serde(rename = "lunetteId")]
    pub lunette_id: String,
    pub name: String,
}

/// One material as shown in the storefront gallery. `data` carries the raw
/// store record so newer clients can read fields this view does not model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialView {
    pub id: String,
    pub label: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub data: Value,
}

impl From<MaterialRecord> for MaterialView {
    fn from(record: MaterialRecord) -> Self {
        let label = record.label.unwrap_or_else(|| record.id.clone());
        Self {
            id: record.id,
            label,
            image_url: record.image_url,
            data: record.raw,
        }
    }
}

/// Gallery payload; `success: false` carries the soft-fallback empty list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialsReply {
    pub success: bool,
    pub items: Vec<MaterialView>,
}

/// Body accepted by `POST /api/generate-colors`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub current: CurrentSelection,
}

/// Palette selection snapshot forwarded with a suggestion request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentSelection {
    #[serde(default)]
    pub branches: Option<String>,
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub lenses: Option<String>,
}

impl From<CurrentSelection> for CurrentColors {
    fn from(value: CurrentSelection) -> Self {
        Self {
            branches: value.branches,
            frame: value.frame,
            lenses: value.lenses,
        }
    }
}

/// Suggestion payload: per-role palette matches (`null` when the model named
/// a color outside the palette) plus the model's one-line justification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestReply {
    pub success: bool,
    pub colors: SuggestedColors,
    pub reason: Option<String>,
}

/// The three role slots of a suggestion reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuggestedColors {
    pub branches: Option<ColorChoice>,
    pub frame: Option<ColorChoice>,
    pub lenses: Option<ColorChoice>,
}

impl From<SuggestedPalette> for SuggestReply {
    fn from(palette: SuggestedPalette) -> Self {
        Self {
            success: true,
            colors: SuggestedColors {
                branches: palette.branches,
                frame: palette.frame,
                lenses: palette.lenses,
            },
            reason: palette.reason,
        }
    }
}
