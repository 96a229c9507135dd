//! Prompt assembly and reply interpretation for palette suggestions.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use lunetier_core::{COLOR_PALETTE, ColorChoice, SuggestedPalette, find_color_by_name};

use crate::engine::SuggestionEngine;
use crate::error::{SuggestError, SuggestResult};

/// Assistants wrap JSON in prose; keep the first brace-delimited object.
static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("literal pattern compiles"));

/// Placeholder forwarded when a current color slot has no selection.
const UNSET_COLOR: &str = "—";

/// Current selection snapshot forwarded to the assistant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentColors {
    /// Label of the current temple color, when known.
    pub branches: Option<String>,
    /// Label of the current frame color, when known.
    pub frame: Option<String>,
    /// Label of the current lens color, when known.
    pub lenses: Option<String>,
}

/// Orchestrates one suggestion round against a completion engine.
pub struct SuggestionService {
    engine: Arc<dyn SuggestionEngine>,
}

impl SuggestionService {
    /// Build a service around the given engine.
    #[must_use]
    pub fn new(engine: Arc<dyn SuggestionEngine>) -> Self {
        Self { engine }
    }

    /// Ask the engine for a palette matching `prompt` and map the reply onto
    /// the catalogue. Roles naming unknown colors come back as `None`; the
    /// round fails only when every role misses.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails, the reply carries no JSON
    /// object, or no suggested color exists in the palette.
    pub async fn suggest_palette(
        &self,
        prompt: &str,
        current: &CurrentColors,
    ) -> SuggestResult<SuggestedPalette> {
        let reply = self
            .engine
            .complete(&system_prompt(), &user_prompt(prompt, current))
            .await?;
        interpret_reply(&reply)
    }
}

fn system_prompt() -> String {
    let palette = COLOR_PALETTE
        .iter()
        .map(|entry| format!("- {} ({})", entry.name, entry.value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Tu es un assistant de style pour lunettes. Tu dois choisir des couleurs cohérentes parmi la palette disponible, sans jamais inventer de nouvelle couleur.\n\nPalette autorisée :\n{palette}\n\nRéponds STRICTEMENT avec un JSON unique de la forme suivante :\n{{\"branches\":\"Nom\",\"frame\":\"Nom\",\"lenses\":\"Nom\",\"reason\":\"Une phrase qui justifie le choix\"}}\n\nContraintes :\n- Utilise uniquement les noms listés ci-dessus.\n- branches = branches, frame = monture/pont, lenses = verres.\n- Si l'utilisateur ne précise rien, propose une combinaison équilibrée et élégante.\n- Le champ reason est optionnel mais apprécié."
    )
}

fn user_prompt(prompt: &str, current: &CurrentColors) -> String {
    let branches = current.branches.as_deref().unwrap_or(UNSET_COLOR);
    let frame = current.frame.as_deref().unwrap_or(UNSET_COLOR);
    let lenses = current.lenses.as_deref().unwrap_or(UNSET_COLOR);

    format!(
        "Couleurs actuelles : branches = {branches}, monture = {frame}, verres = {lenses}.\n\nDemande : {prompt}"
    )
}

fn interpret_reply(reply: &str) -> SuggestResult<SuggestedPalette> {
    let candidate = JSON_OBJECT
        .find(reply)
        .map_or(reply, |object| object.as_str());
    let parsed: AssistantPalette =
        serde_json::from_str(candidate).map_err(|_| SuggestError::Unreadable)?;

    let branches = parsed.branches.as_deref().and_then(find_color_by_name);
    let frame = parsed.frame.as_deref().and_then(find_color_by_name);
    let lenses = parsed.lenses.as_deref().and_then(find_color_by_name);
    if branches.is_none() && frame.is_none() && lenses.is_none() {
        return Err(SuggestError::OutOfPalette);
    }

    Ok(SuggestedPalette {
        branches: branches.map(ColorChoice::from),
        frame: frame.map(ColorChoice::from),
        lenses: lenses.map(ColorChoice::from),
        reason: parsed.reason,
    })
}

#[derive(Deserialize)]
struct AssistantPalette {
    #[serde(default)]
    branches: Option<String>,
    #[serde(default)]
    frame: Option<String>,
    #[serde(default)]
    lenses: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}
