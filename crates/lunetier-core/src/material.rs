//! Material gallery: fetched entries, texture swatches, and slug lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label shown when the materials backend is unavailable.
pub const FALLBACK_MATERIAL_LABEL: &str = "Matériau standard";
/// Identifier submitted when the fallback material is selected.
pub const FALLBACK_MATERIAL_ID: &str = "default";

/// One material as served by the materials endpoint: store identifier,
/// display label, optional texture image, and the raw backing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub id: String,
    pub label: String,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl MaterialEntry {
    /// Label preferred for the material selector: the store record's
    /// `libelle` when present, else the endpoint label.
    pub fn display_label(&self) -> &str {
        self.data
            .get("libelle")
            .and_then(Value::as_str)
            .unwrap_or(&self.label)
    }

    /// Stable pattern identifier for this material's texture.
    pub fn pattern_id(&self) -> String {
        format!("materiau-{}", self.id)
    }
}

/// The loaded material list plus its lookup indexes.
#[derive(Debug, Clone, Default)]
pub struct MaterialCatalog {
    entries: Vec<MaterialEntry>,
    slug_to_id: BTreeMap<String, String>,
}

impl MaterialCatalog {
    pub fn from_entries(entries: Vec<MaterialEntry>) -> Self {
        let mut slug_to_id = BTreeMap::new();
        for entry in &entries {
            let slug = slugify(entry.display_label());
            if !slug.is_empty() {
                slug_to_id.insert(slug, entry.id.clone());
            }
        }
        Self { entries, slug_to_id }
    }

    pub fn entries(&self) -> &[MaterialEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&MaterialEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn id_for_slug(&self, slug: &str) -> Option<&str> {
        self.slug_to_id.get(slug).map(String::as_str)
    }

    /// Entries that can back a texture swatch (the ones with an image).
    pub fn textured(&self) -> impl Iterator<Item = &MaterialEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.image_url.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lowercase ASCII slug: accents folded, every non-alphanumeric run
/// collapsed into a single dash, no leading or trailing dash.
pub fn slugify(value: &str) -> String {
    let mut slug = String::new();
    let mut prev_dash = false;
    for ch in fold_accents(value).chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash && !slug.is_empty() {
            slug.push('-');
            prev_dash = true;
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// Covers the accented characters French material labels actually use.
fn fold_accents(value: &str) -> String {
    let mut folded = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            'à' | 'â' | 'ä' | 'á' | 'ã' => folded.push('a'),
            'À' | 'Â' | 'Ä' | 'Á' | 'Ã' => folded.push('A'),
            'ç' => folded.push('c'),
            'Ç' => folded.push('C'),
            'é' | 'è' | 'ê' | 'ë' => folded.push('e'),
            'É' | 'È' | 'Ê' | 'Ë' => folded.push('E'),
            'î' | 'ï' | 'í' => folded.push('i'),
            'Î' | 'Ï' | 'Í' => folded.push('I'),
            'ô' | 'ö' | 'ó' | 'õ' => folded.push('o'),
            'Ô' | 'Ö' | 'Ó' | 'Õ' => folded.push('O'),
            'ù' | 'û' | 'ü' | 'ú' => folded.push('u'),
            'Ù' | 'Û' | 'Ü' | 'Ú' => folded.push('U'),
            'ÿ' => folded.push('y'),
            'ñ' => folded.push('n'),
            'Ñ' => folded.push('N'),
            'œ' => folded.push_str("oe"),
            'Œ' => folded.push_str("OE"),
            'æ' => folded.push_str("ae"),
            'Æ' => folded.push_str("AE"),
            other => folded.push(other),
        }
    }
    folded
}
