//! Error types for scene construction and session-local validation.

use thiserror::Error;

/// Failure to build a scene out of template artwork.
#[derive(Debug, Error)]
pub enum SceneError {
    /// A path's `d` attribute did not parse as SVG path data.
    #[error("invalid path data in group '{group}': {detail}")]
    InvalidPath {
        group: &'static str,
        detail: String,
    },
    /// A template group carried no paths at all.
    #[error("group '{group}' has no paths")]
    EmptyGroup { group: &'static str },
}

/// Local validation failures surfaced to the user before any network call.
/// The display strings are the exact inline messages the storefront shows.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Veuillez vous connecter pour sauvegarder vos créations.")]
    MissingUser,
    #[error("Merci de nommer votre modèle avant de l'enregistrer.")]
    EmptyName,
    #[error("L'IA a proposé des couleurs indisponibles. Reformulez votre demande.")]
    SuggestionRejected,
}
