//! Domain records exchanged with the persistence backend.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// Draft of a design awaiting persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDesign {
    /// Display name chosen by the customer. Omitted entirely on the nameless retry.
    pub name: Option<String>,
    /// Normalized SVG markup of the configured frame.
    pub svg_markup: String,
    /// Bridge width in millimetres.
    pub bridge_mm: Option<f64>,
    /// Lens diameter in millimetres.
    pub lens_size_mm: Option<f64>,
    /// Primary material record identifier.
    pub material_id: Option<String>,
    /// Secondary material record identifier.
    pub secondary_material_id: Option<String>,
}

/// Stored design as acknowledged by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignRecord {
    /// Backend record identifier.
    pub id: String,
    /// Name stored on the record, when one was accepted.
    pub name: Option<String>,
}

/// Material entry from the backend catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRecord {
    /// Backend record identifier.
    pub id: String,
    /// Display label, when the record carries one.
    pub label: Option<String>,
    /// Fully-qualified texture image URL, when the record carries a file.
    pub image_url: Option<String>,
    /// Raw backend record, passed through for forward compatibility.
    pub raw: Value,
}

/// Persistence backend for designs, ownership links, and the material catalogue.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new design and return the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the draft or cannot be reached.
    async fn create_design(&self, design: &NewDesign) -> StoreResult<DesignRecord>;

    /// Associate a stored design with the owning user account.
    ///
    /// # Errors
    ///
    /// Returns an error if the link record cannot be created.
    async fn link_owner(&self, user_id: &str, design_id: &str) -> StoreResult<()>;

    /// List the material catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue cannot be fetched or decoded.
    async fn list_materials(&self) -> StoreResult<Vec<MaterialRecord>>;
}
