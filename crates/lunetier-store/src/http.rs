//! REST client for the `PocketBase` persistence backend.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{StoreError, StoreResult};
use crate::records::{DesignRecord, MaterialRecord, NewDesign, RecordStore};

const DESIGN_COLLECTION: &str = "lunette";
const OWNERSHIP_COLLECTION: &str = "Compose";
const MATERIAL_COLLECTION: &str = "Materiaux";

/// The catalogue is small and curated; a single page covers it.
const MATERIAL_PAGE_SIZE: u32 = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// `PocketBase`-backed [`RecordStore`] speaking the collection REST API.
#[derive(Clone)]
pub struct HttpRecordStore {
    client: Client,
    base: String,
}

impl HttpRecordStore {
    /// Build a store for the backend at `base_url` with a freshly configured client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &Url) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| StoreError::Transport {
                operation: "build http client",
                source,
            })?;
        Ok(Self::with_client(client, base_url))
    }

    /// Build a store reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client, base_url: &Url) -> Self {
        let base = base_url.as_str().trim_end_matches('/').to_string();
        Self { client, base }
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{collection}/records", self.base)
    }

    fn file_url(&self, collection: &str, record_id: &str, filename: &str) -> String {
        format!(
            "{}/api/files/{}/{}/{}",
            self.base,
            urlencoding::encode(collection),
            urlencoding::encode(record_id),
            urlencoding::encode(filename),
        )
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create_design(&self, design: &NewDesign) -> StoreResult<DesignRecord> {
        const OPERATION: &str = "create design";

        let body = CreateDesignBody {
            code_svg: &design.svg_markup,
            largeur_pont: design.bridge_mm,
            taille_verre: design.lens_size_mm,
            material_id: design.material_id.as_deref(),
            secondary_material_id: design.secondary_material_id.as_deref(),
            nom: design.name.as_deref(),
        };
        let response = self
            .client
            .post(self.records_url(DESIGN_COLLECTION))
            .json(&body)
            .send()
            .await
            .map_err(|source| StoreError::Transport {
                operation: OPERATION,
                source,
            })?;
        let record: CreatedDesign = decode(OPERATION, response).await?;

        Ok(DesignRecord {
            id: record.id,
            name: record.nom,
        })
    }

    async fn link_owner(&self, user_id: &str, design_id: &str) -> StoreResult<()> {
        const OPERATION: &str = "link owner";

        let body = OwnershipBody { user_id, design_id };
        let response = self
            .client
            .post(self.records_url(OWNERSHIP_COLLECTION))
            .json(&body)
            .send()
            .await
            .map_err(|source| StoreError::Transport {
                operation: OPERATION,
                source,
            })?;
        ensure_success(OPERATION, response).await?;

        Ok(())
    }

    async fn list_materials(&self) -> StoreResult<Vec<MaterialRecord>> {
        const OPERATION: &str = "list materials";

        let url = format!(
            "{}?page=1&perPage={MATERIAL_PAGE_SIZE}",
            self.records_url(MATERIAL_COLLECTION)
        );
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| StoreError::Transport {
                    operation: OPERATION,
                    source,
                })?;
        let page: MaterialPage = decode(OPERATION, response).await?;

        page.items
            .into_iter()
            .map(|raw| {
                let item: MaterialItem = serde_json::from_value(raw.clone())
                    .map_err(|source| StoreError::Decode {
                        operation: OPERATION,
                        source,
                    })?;
                // The file field is a list; the gallery only shows the first image.
                let image_url = item
                    .materiau
                    .first()
                    .filter(|file| !file.is_empty())
                    .map(|file| {
                        let collection = item.collection_id.as_deref().unwrap_or(MATERIAL_COLLECTION);
                        self.file_url(collection, &item.id, file)
                    });
                Ok(MaterialRecord {
                    id: item.id,
                    label: item.label,
                    image_url,
                    raw,
                })
            })
            .collect()
    }
}

async fn ensure_success(operation: &'static str, response: Response) -> StoreResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(classify_rejection(operation, response).await)
}

async fn decode<T>(operation: &'static str, response: Response) -> StoreResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let response = ensure_success(operation, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| StoreError::Transport { operation, source })?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode { operation, source })
}

/// Decode a backend rejection into a structured error, keeping any field issues.
async fn classify_rejection(operation: &'static str, response: Response) -> StoreError {
    let status = response.status().as_u16();
    let bytes = response.bytes().await.unwrap_or_default();
    let decoded = serde_json::from_slice::<BackendError>(&bytes).ok();

    let message = decoded
        .as_ref()
        .filter(|payload| !payload.message.is_empty())
        .map_or_else(
            || String::from_utf8_lossy(&bytes).trim().to_string(),
            |payload| payload.message.clone(),
        );
    let field_errors = decoded
        .map(|payload| {
            payload
                .data
                .into_iter()
                .map(|(field, issue)| (field, issue.message))
                .collect()
        })
        .unwrap_or_default();
    tracing::debug!(operation, status, "backend rejected request");

    StoreError::Rejected {
        operation,
        status,
        message,
        field_errors,
    }
}

#[derive(Serialize)]
struct CreateDesignBody<'a> {
    code_svg: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    largeur_pont: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    taille_verre: Option<f64>,
    #[serde(rename = "IdMateriaux", skip_serializing_if = "Option::is_none")]
    material_id: Option<&'a str>,
    #[serde(rename = "IdMateriaux_1", skip_serializing_if = "Option::is_none")]
    secondary_material_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nom: Option<&'a str>,
}

#[derive(Serialize)]
struct OwnershipBody<'a> {
    #[serde(rename = "IdUtilisateur")]
    user_id: &'a str,
    #[serde(rename = "IdLunette")]
    design_id: &'a str,
}

#[derive(Deserialize)]
struct CreatedDesign {
    id: String,
    #[serde(default)]
    nom: Option<String>,
}

#[derive(Deserialize)]
struct MaterialPage {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Deserialize)]
struct MaterialItem {
    id: String,
    #[serde(rename = "collectionId", default)]
    collection_id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    materiau: Vec<String>,
}

#[derive(Deserialize)]
struct BackendError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: BTreeMap<String, FieldIssue>,
}

#[derive(Deserialize)]
struct FieldIssue {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    fn store_for(server: &MockServer) -> Result<HttpRecordStore> {
        let base: Url = server.base_url().parse()?;
        Ok(HttpRecordStore::with_client(Client::new(), &base))
    }

    fn draft() -> NewDesign {
        NewDesign {
            name: Some("Aviateur".to_string()),
            svg_markup: "<svg viewBox=\"0 0 400 150\"></svg>".to_string(),
            bridge_mm: Some(22.0),
            lens_size_mm: Some(48.0),
            material_id: Some("mat_1".to_string()),
            secondary_material_id: None,
        }
    }

    #[tokio::test]
    async fn create_design_round_trips_the_stored_record() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/lunette/records")
                .json_body(json!({
                    "code_svg": "<svg viewBox=\"0 0 400 150\"></svg>",
                    "largeur_pont": 22.0,
                    "taille_verre": 48.0,
                    "IdMateriaux": "mat_1",
                    "nom": "Aviateur"
                }));
            then.status(200)
                .json_body(json!({"id": "rec_1", "nom": "Aviateur"}));
        });

        let store = store_for(&server)?;
        let record = store.create_design(&draft()).await?;

        mock.assert();
        assert_eq!(record.id, "rec_1");
        assert_eq!(record.name.as_deref(), Some("Aviateur"));
        Ok(())
    }

    #[tokio::test]
    async fn nameless_design_omits_the_name_field() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/lunette/records")
                .json_body(json!({"code_svg": "<svg></svg>"}));
            then.status(200).json_body(json!({"id": "rec_2"}));
        });

        let store = store_for(&server)?;
        let record = store
            .create_design(&NewDesign {
                name: None,
                svg_markup: "<svg></svg>".to_string(),
                bridge_mm: None,
                lens_size_mm: None,
                material_id: None,
                secondary_material_id: None,
            })
            .await?;

        mock.assert();
        assert_eq!(record.id, "rec_2");
        assert_eq!(record.name, None);
        Ok(())
    }

    #[tokio::test]
    async fn rejection_exposes_field_errors() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/collections/lunette/records");
            then.status(400).json_body(json!({
                "code": 400,
                "message": "Failed to create record.",
                "data": {"nom": {"code": "validation_invalid_value", "message": "Invalid value."}}
            }));
        });

        let store = store_for(&server)?;
        let error = store
            .create_design(&draft())
            .await
            .expect_err("rejection expected");

        assert!(error.rejects_field("nom"));
        assert!(!error.rejects_field("code_svg"));
        match error {
            StoreError::Rejected {
                status, message, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Failed to create record.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn link_owner_targets_the_ownership_collection() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/collections/Compose/records")
                .json_body(json!({"IdUtilisateur": "user_9", "IdLunette": "rec_1"}));
            then.status(200).json_body(json!({"id": "comp_1"}));
        });

        let store = store_for(&server)?;
        store.link_owner("user_9", "rec_1").await?;

        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn materials_resolve_image_urls_against_the_backend() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/collections/Materiaux/records")
                .query_param("perPage", "200");
            then.status(200).json_body(json!({
                "page": 1,
                "perPage": 200,
                "totalItems": 2,
                "items": [
                    {
                        "id": "mat_1",
                        "collectionId": "col_7",
                        "label": "Écaille",
                        "libelle": "Écaille dorée",
                        "materiau": ["ecaille.png"]
                    },
                    {"id": "mat_2", "label": "Acétate"}
                ]
            }));
        });

        let store = store_for(&server)?;
        let materials = store.list_materials().await?;

        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].label.as_deref(), Some("Écaille"));
        assert_eq!(
            materials[0].image_url.as_deref(),
            Some(format!("{}/api/files/col_7/mat_1/ecaille.png", server.base_url()).as_str())
        );
        assert_eq!(materials[0].raw["libelle"], json!("Écaille dorée"));
        assert_eq!(materials[1].image_url, None);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_payload_surfaces_a_decode_error() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/collections/Materiaux/records");
            then.status(200).body("not json");
        });

        let store = store_for(&server)?;
        let error = store
            .list_materials()
            .await
            .expect_err("decode failure expected");

        assert!(matches!(
            error,
            StoreError::Decode {
                operation: "list materials",
                ..
            }
        ));
        Ok(())
    }
}
