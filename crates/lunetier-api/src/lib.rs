pub mod error;
pub mod models;

pub use error::{ApiServerError, ApiServerResult};

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{MatchedPath, State},
    http::{HeaderMap, Request, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lunetier_core::SuggestedPalette;
use lunetier_store::{NewDesign, RecordStore, StoreError};
use lunetier_suggest::{CurrentColors, SuggestError, SuggestionService};
use lunetier_telemetry::{Metrics, build_sha, set_request_context, with_request_context};
use models::{ErrorReply, MaterialView, MaterialsReply, SaveReply, SuggestReply, SuggestRequest};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tower::{Service, ServiceBuilder, layer::Layer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{Span, debug, error, info, warn};
use url::form_urlencoded;

const HEADER_REQUEST_ID: &str = "x-request-id";

const MSG_NAME_REQUIRED: &str = "Le nom de la création est requis.";
const MSG_SVG_INVALID: &str = "Le visuel SVG est manquant ou invalide.";
const MSG_USER_REQUIRED: &str = "Utilisateur non identifié. Connectez-vous pour sauvegarder.";
const MSG_SAVE_FAILED: &str = "Impossible d'enregistrer la création pour le moment.";
const MSG_NO_API_KEY: &str =
    "Aucune clé OpenRouter configurée. Ajoutez OPENROUTER_API_KEY à votre environnement serveur.";
const MSG_INVALID_REQUEST: &str = "Requête invalide.";
const MSG_PROMPT_REQUIRED: &str = "Merci de renseigner une description avant de lancer l'IA.";
const MSG_GENERATION_FAILED: &str = "La génération IA a échoué. Réessayez plus tard.";
const MSG_EMPTY_REPLY: &str = "Réponse de l'IA vide.";
const MSG_UNREADABLE_REPLY: &str = "Réponse IA illisible.";
const MSG_OUT_OF_PALETTE: &str =
    "L'IA a proposé des couleurs hors palette. Reformulez la demande.";
const MSG_GENERATION_UNEXPECTED: &str = "Erreur inattendue pendant la génération.";

// Submitted field spellings, camelCase first. The storefront sent snake_case
// for a while and saved pages may still replay the old payloads.
const NAME_FIELDS: &[&str] = &["name", "nom"];
const SVG_FIELDS: &[&str] = &["codeSvg", "code_svg"];
const USER_FIELDS: &[&str] = &["userId", "user_id"];
const BRIDGE_FIELDS: &[&str] = &["largeurPont", "largeur_pont", "bridgeWidth"];
const LENS_FIELDS: &[&str] = &["tailleVerre", "taille_verre", "lensSize"];
const MATERIAL_FIELDS: &[&str] = &["materiauId", "IdMateriaux", "materialId"];
const SECONDARY_MATERIAL_FIELDS: &[&str] =
    &["materiauSecondaireId", "IdMateriaux_1", "secondaryMaterialId"];

pub struct ApiServer {
    router: Router,
}

struct ApiState {
    store: Arc<dyn RecordStore>,
    suggestions: Option<SuggestionService>,
    telemetry: Metrics,
    store_healthy: AtomicBool,
}

impl ApiState {
    fn new(
        store: Arc<dyn RecordStore>,
        suggestions: Option<SuggestionService>,
        telemetry: Metrics,
    ) -> Self {
        Self {
            store,
            suggestions,
            telemetry,
            store_healthy: AtomicBool::new(true),
        }
    }

    fn mark_store(&self, healthy: bool) {
        self.store_healthy.store(healthy, Ordering::Relaxed);
    }

    fn store_component(&self) -> &'static str {
        if self.store_healthy.load(Ordering::Relaxed) {
            "up"
        } else {
            "degraded"
        }
    }
}

#[derive(Clone)]
struct HttpMetricsLayer {
    telemetry: Metrics,
}

impl HttpMetricsLayer {
    const fn new(telemetry: Metrics) -> Self {
        Self { telemetry }
    }
}

impl<S> Layer<S> for HttpMetricsLayer {
    type Service = HttpMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpMetricsService {
            inner,
            telemetry: self.telemetry.clone(),
        }
    }
}

#[derive(Clone)]
struct HttpMetricsService<S> {
    inner: S,
    telemetry: Metrics,
}

impl<S, B> Service<Request<B>> for HttpMetricsService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let route = req.extensions().get::<MatchedPath>().map_or_else(
            || req.uri().path().to_string(),
            |matched| matched.as_str().to_string(),
        );
        let request_id = req
            .headers()
            .get(HEADER_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let telemetry = self.telemetry.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            with_request_context(request_id, route.clone(), async move {
                let response = fut.await?;
                telemetry.inc_http_request(&route, response.status().as_u16());
                Ok(response)
            })
            .await
        })
    }
}

/// Terminal handler error: an HTTP status plus the curated storefront-facing
/// message. Raw upstream detail is logged, never serialized.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorReply {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct HealthReply {
    status: &'static str,
    build: String,
    components: HealthComponents,
}

#[derive(Serialize)]
struct HealthComponents {
    store: &'static str,
}

impl ApiServer {
    /// Construct the API server with shared dependencies wired through
    /// application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        suggestions: Option<SuggestionService>,
        telemetry: Metrics,
    ) -> Self {
        let telemetry_for_state = telemetry.clone();
        let state = Arc::new(ApiState::new(store, suggestions, telemetry_for_state));

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(move |request: &Request<_>| {
                let method = request.method().clone();
                let uri_path = request.uri().path();
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                let span = tracing::info_span!(
                    "http.request",
                    method = %method,
                    route = %uri_path,
                    request_id = tracing::field::Empty,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                );
                set_request_context(&span, request_id, uri_path.to_string());
                span
            })
            .on_request(|request: &Request<_>, span: &Span| {
                if let Some(matched) = request.extensions().get::<MatchedPath>() {
                    let request_id = request
                        .headers()
                        .get(HEADER_REQUEST_ID)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    set_request_context(span, request_id, matched.as_str().to_string());
                }
            })
            .on_response(|response: &Response, latency: Duration, span: &Span| {
                let status = response.status().as_u16();
                span.record("status_code", status);
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                span.record("latency_ms", latency_ms);
            });

        let layered = ServiceBuilder::new()
            .layer(lunetier_telemetry::propagate_request_id_layer())
            .layer(lunetier_telemetry::set_request_id_layer())
            .layer(trace_layer)
            .layer(HttpMetricsLayer::new(telemetry))
            .layer(CorsLayer::permissive());

        let router = Router::new()
            .route("/api/save-lunette", post(save_design))
            .route("/api/materiaux", get(list_materials))
            .route("/api/generate-colors", post(generate_colors))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .route_layer(layered)
            .with_state(state);

        Self { router }
    }

    /// Bind `addr` and serve requests until the listener shuts down.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server
    /// terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        info!("Serving the configurator API on {}", addr);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })?;
        Ok(())
    }
}

async fn save_design(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SaveReply>, ApiError> {
    debug!(length = body.len(), "save payload received");
    let Some(fields) = parse_save_body(&headers, &body) else {
        return Err(ApiError::bad_request(format!(
            "Corps de requête vide (longueur {}).",
            body.len()
        )));
    };

    let name = string_field(&fields, NAME_FIELDS)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request(MSG_NAME_REQUIRED))?;

    let svg_markup = string_field(&fields, SVG_FIELDS)
        .and_then(|value| normalize_svg(&value))
        .ok_or_else(|| ApiError::bad_request(MSG_SVG_INVALID))?;

    let user_id = string_field(&fields, USER_FIELDS)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized(MSG_USER_REQUIRED))?;

    let draft = NewDesign {
        name: Some(name.clone()),
        svg_markup,
        bridge_mm: numeric_field(&fields, BRIDGE_FIELDS),
        lens_size_mm: numeric_field(&fields, LENS_FIELDS),
        material_id: string_field(&fields, MATERIAL_FIELDS).filter(|id| !id.is_empty()),
        secondary_material_id: string_field(&fields, SECONDARY_MATERIAL_FIELDS)
            .filter(|id| !id.is_empty()),
    };

    let record = match state.store.create_design(&draft).await {
        Ok(record) => record,
        Err(err) if err.rejects_field("nom") => {
            // Some deployments constrain the nom column; the design still
            // saves, it just loses its label.
            warn!("store rejected the design name; retrying without it");
            state.telemetry.inc_design_name_retry();
            let nameless = NewDesign { name: None, ..draft };
            state
                .store
                .create_design(&nameless)
                .await
                .map_err(|err| save_failure(&state, "create design", &err))?
        }
        Err(err) => return Err(save_failure(&state, "create design", &err)),
    };

    state
        .store
        .link_owner(&user_id, &record.id)
        .await
        .map_err(|err| save_failure(&state, "link owner", &err))?;

    state.telemetry.inc_design_saved();
    state.mark_store(true);
    info!(design_id = %record.id, "design saved");
    Ok(Json(SaveReply {
        success: true,
        lunette_id: record.id,
        name: record.name.unwrap_or(name),
    }))
}

fn save_failure(state: &ApiState, operation: &'static str, err: &StoreError) -> ApiError {
    error!(operation, error = %err, "design save failed");
    state.telemetry.inc_design_save_failure();
    // A rejection still proves the store answered; only transport or decode
    // trouble degrades the health component.
    state.mark_store(matches!(err, StoreError::Rejected { .. }));
    ApiError::internal(MSG_SAVE_FAILED)
}

async fn list_materials(State(state): State<Arc<ApiState>>) -> Json<MaterialsReply> {
    match state.store.list_materials().await {
        Ok(records) => {
            state.mark_store(true);
            let items = records.into_iter().map(MaterialView::from).collect();
            Json(MaterialsReply {
                success: true,
                items,
            })
        }
        Err(err) => {
            // The gallery falls back to its built-in material instead of
            // erroring the whole page.
            warn!(error = %err, "materials lookup failed; serving the empty list");
            state.telemetry.inc_materials_fallback();
            state.mark_store(false);
            Json(MaterialsReply {
                success: false,
                items: Vec::new(),
            })
        }
    }
}

async fn generate_colors(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<SuggestReply>, ApiError> {
    let Some(service) = state.suggestions.as_ref() else {
        return Err(suggestion_error(SuggestError::MissingCredentials));
    };

    let request: SuggestRequest =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request(MSG_INVALID_REQUEST))?;
    let prompt = request.prompt.unwrap_or_default();
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::bad_request(MSG_PROMPT_REQUIRED));
    }

    let current = CurrentColors::from(request.current);
    match service.suggest_palette(prompt, &current).await {
        Ok(palette) => {
            state.telemetry.inc_suggestion(palette_outcome(&palette));
            Ok(Json(SuggestReply::from(palette)))
        }
        Err(err) => {
            state.telemetry.inc_suggestion(failure_outcome(&err));
            Err(suggestion_error(err))
        }
    }
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthReply> {
    Json(HealthReply {
        status: "ok",
        build: build_sha().to_string(),
        components: HealthComponents {
            store: state.store_component(),
        },
    })
}

async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "metrics response could not be built");
                ApiError::internal("metrics response could not be built")
            }),
        Err(err) => {
            error!(error = %err, "metrics rendering failed");
            Err(ApiError::internal("metrics rendering failed"))
        }
    }
}

/// Body decoding mirrors the storefront's looser client behaviours: a JSON
/// object, JSON wrapped in stray whitespace, or a urlencoded form post.
fn parse_save_body(headers: &HeaderMap, body: &Bytes) -> Option<Map<String, Value>> {
    if let Ok(fields) = serde_json::from_slice::<Map<String, Value>>(body) {
        return Some(fields);
    }
    if let Ok(text) = std::str::from_utf8(body) {
        if let Ok(fields) = serde_json::from_str::<Map<String, Value>>(text.trim()) {
            return Some(fields);
        }
    }
    if is_form_request(headers) {
        let fields: Map<String, Value> = form_urlencoded::parse(body)
            .into_owned()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        if !fields.is_empty() {
            return Some(fields);
        }
    }
    None
}

fn is_form_request(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/x-www-form-urlencoded"))
}

fn string_field(fields: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| fields.get(*name).and_then(Value::as_str))
        .map(str::to_string)
}

fn numeric_field(fields: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    names
        .iter()
        .find_map(|name| fields.get(*name).and_then(numeric_value))
}

/// Accepts JSON numbers and numeric strings, the two shapes the storefront
/// has historically submitted for the slider values.
fn numeric_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|number| number.is_finite())
}

/// The configurator submits percent-encoded markup; older clients sent it
/// raw. Either way the stored value must be the decoded `<svg` document.
fn normalize_svg(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let markup = if trimmed.starts_with("<svg") {
        trimmed.to_string()
    } else {
        match urlencoding::decode(trimmed) {
            Ok(decoded) => decoded.trim().to_string(),
            Err(_) => trimmed.to_string(),
        }
    };
    if markup.starts_with("<svg") {
        Some(markup)
    } else {
        None
    }
}

fn palette_outcome(palette: &SuggestedPalette) -> &'static str {
    if palette.branches.is_some() && palette.frame.is_some() && palette.lenses.is_some() {
        "applied"
    } else {
        "partial"
    }
}

fn failure_outcome(err: &SuggestError) -> &'static str {
    match err {
        SuggestError::OutOfPalette => "rejected",
        _ => "failed",
    }
}

fn suggestion_error(err: SuggestError) -> ApiError {
    match err {
        SuggestError::MissingCredentials => ApiError::service_unavailable(MSG_NO_API_KEY),
        SuggestError::Upstream { source } => {
            error!(error = %source, "suggestion engine call failed");
            ApiError::internal(MSG_GENERATION_UNEXPECTED)
        }
        SuggestError::Rejected { .. } => ApiError::bad_gateway(MSG_GENERATION_FAILED),
        SuggestError::EmptyReply => ApiError::bad_gateway(MSG_EMPTY_REPLY),
        SuggestError::Unreadable => ApiError::bad_gateway(MSG_UNREADABLE_REPLY),
        SuggestError::OutOfPalette => ApiError::unprocessable(MSG_OUT_OF_PALETTE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lunetier_store::{DesignRecord, MaterialRecord, StoreResult};
    use lunetier_suggest::{SuggestResult, SuggestionEngine};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        created: Mutex<Vec<NewDesign>>,
        links: Mutex<Vec<(String, String)>>,
        reject_name_once: AtomicBool,
        reject_bridge: bool,
        fail_create: bool,
        fail_link: bool,
        fail_materials: bool,
        materials: Vec<MaterialRecord>,
    }

    impl RecordingStore {
        fn broken(operation: &'static str) -> StoreError {
            StoreError::Decode {
                operation,
                source: serde_json::from_str::<Value>("broken").expect_err("invalid json"),
            }
        }
    }

    #[async_trait]
    impl RecordStore for RecordingStore {
        async fn create_design(&self, design: &NewDesign) -> StoreResult<DesignRecord> {
            if self.fail_create {
                return Err(Self::broken("create design"));
            }
            if self.reject_bridge {
                let mut field_errors = BTreeMap::new();
                field_errors.insert("largeur_pont".to_string(), "Invalid value.".to_string());
                return Err(StoreError::Rejected {
                    operation: "create design",
                    status: 400,
                    message: "Failed to create record.".to_string(),
                    field_errors,
                });
            }
            if design.name.is_some() && self.reject_name_once.swap(false, Ordering::SeqCst) {
                let mut field_errors = BTreeMap::new();
                field_errors.insert("nom".to_string(), "Invalid value.".to_string());
                return Err(StoreError::Rejected {
                    operation: "create design",
                    status: 400,
                    message: "Failed to create record.".to_string(),
                    field_errors,
                });
            }
            self.created.lock().await.push(design.clone());
            Ok(DesignRecord {
                id: "rec_1".to_string(),
                name: design.name.clone(),
            })
        }

        async fn link_owner(&self, user_id: &str, design_id: &str) -> StoreResult<()> {
            if self.fail_link {
                return Err(Self::broken("link owner"));
            }
            self.links
                .lock()
                .await
                .push((user_id.to_string(), design_id.to_string()));
            Ok(())
        }

        async fn list_materials(&self) -> StoreResult<Vec<MaterialRecord>> {
            if self.fail_materials {
                return Err(Self::broken("list materials"));
            }
            Ok(self.materials.clone())
        }
    }

    struct ScriptedEngine {
        reply: &'static str,
    }

    #[async_trait]
    impl SuggestionEngine for ScriptedEngine {
        async fn complete(&self, _system: &str, _user: &str) -> SuggestResult<String> {
            Ok(self.reply.to_string())
        }
    }

    struct FailingEngine {
        build: fn() -> SuggestError,
    }

    #[async_trait]
    impl SuggestionEngine for FailingEngine {
        async fn complete(&self, _system: &str, _user: &str) -> SuggestResult<String> {
            Err((self.build)())
        }
    }

    fn state_with(store: Arc<RecordingStore>) -> Arc<ApiState> {
        Arc::new(ApiState::new(store, None, Metrics::new().expect("metrics")))
    }

    fn state_with_engine(
        store: Arc<RecordingStore>,
        engine: Arc<dyn SuggestionEngine>,
    ) -> Arc<ApiState> {
        Arc::new(ApiState::new(
            store,
            Some(SuggestionService::new(engine)),
            Metrics::new().expect("metrics"),
        ))
    }

    fn save_body() -> Bytes {
        Bytes::from(
            json!({
                "name": "Aviateur",
                "codeSvg": "<svg viewBox=\"0 0 400 150\"></svg>",
                "userId": "user_9",
                "largeurPont": 22.0,
                "tailleVerre": 48.0,
                "materiauId": "mat_1"
            })
            .to_string(),
        )
    }

    #[tokio::test]
    async fn save_design_persists_and_links_the_owner() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());

        let Json(reply) = save_design(State(state.clone()), HeaderMap::new(), save_body())
            .await
            .expect("save");

        assert!(reply.success);
        assert_eq!(reply.lunette_id, "rec_1");
        assert_eq!(reply.name, "Aviateur");
        let created = store.created.lock().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name.as_deref(), Some("Aviateur"));
        assert_eq!(created[0].bridge_mm, Some(22.0));
        assert_eq!(created[0].material_id.as_deref(), Some("mat_1"));
        drop(created);
        let links = store.links.lock().await;
        assert_eq!(
            links.as_slice(),
            &[("user_9".to_string(), "rec_1".to_string())]
        );
        drop(links);
        assert_eq!(state.telemetry.snapshot().designs_saved_total, 1);
    }

    #[tokio::test]
    async fn save_rejects_a_missing_name_first() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());
        let body = Bytes::from(json!({"codeSvg": "<svg></svg>", "userId": "u"}).to_string());

        let err = save_design(State(state), HeaderMap::new(), body)
            .await
            .expect_err("missing name");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, MSG_NAME_REQUIRED);
        assert!(store.created.lock().await.is_empty());
    }

    #[tokio::test]
    async fn save_requires_a_user_after_validating_the_drawing() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());
        let body =
            Bytes::from(json!({"name": "Aviateur", "codeSvg": "<svg></svg>"}).to_string());

        let err = save_design(State(state), HeaderMap::new(), body)
            .await
            .expect_err("missing user");

        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, MSG_USER_REQUIRED);
        assert!(store.created.lock().await.is_empty());
    }

    #[tokio::test]
    async fn save_normalizes_percent_encoded_markup_and_numeric_strings() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());
        let body = Bytes::from(
            json!({
                "nom": "Papillon",
                "code_svg": "%3Csvg%20viewBox%3D%220%200%20400%20150%22%3E%3C%2Fsvg%3E",
                "user_id": "user_3",
                "largeur_pont": "23.5",
                "taille_verre": "not a number"
            })
            .to_string(),
        );

        save_design(State(state), HeaderMap::new(), body)
            .await
            .expect("save");

        let created = store.created.lock().await;
        assert_eq!(
            created[0].svg_markup,
            "<svg viewBox=\"0 0 400 150\"></svg>"
        );
        assert_eq!(created[0].bridge_mm, Some(23.5));
        assert_eq!(created[0].lens_size_mm, None);
    }

    #[tokio::test]
    async fn save_rejects_markup_that_never_becomes_svg() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());
        let body = Bytes::from(
            json!({"name": "Ovale", "codeSvg": "<div>nope</div>", "userId": "u"}).to_string(),
        );

        let err = save_design(State(state), HeaderMap::new(), body)
            .await
            .expect_err("invalid markup");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, MSG_SVG_INVALID);
        assert!(store.created.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_body_reports_its_length() {
        let state = state_with(Arc::new(RecordingStore::default()));

        let err = save_design(State(state), HeaderMap::new(), Bytes::new())
            .await
            .expect_err("empty body");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Corps de requête vide (longueur 0).");
    }

    #[tokio::test]
    async fn form_posts_fall_back_to_urlencoded_fields() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            "application/x-www-form-urlencoded"
                .parse()
                .expect("header value"),
        );
        let body = Bytes::from_static(
            b"name=Ronde&code_svg=%3Csvg%3E%3C%2Fsvg%3E&user_id=user_5&largeurPont=21",
        );

        let Json(reply) = save_design(State(state), headers, body)
            .await
            .expect("form save");

        assert_eq!(reply.name, "Ronde");
        let created = store.created.lock().await;
        assert_eq!(created[0].svg_markup, "<svg></svg>");
        assert_eq!(created[0].bridge_mm, Some(21.0));
    }

    #[tokio::test]
    async fn json_wrapped_in_unicode_whitespace_still_parses() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());
        // A leading no-break space defeats serde's reader but not str::trim.
        let mut payload = String::from("\u{a0}");
        payload.push_str(
            &json!({"name": "Ronde", "codeSvg": "<svg></svg>", "userId": "user_2"}).to_string(),
        );

        let Json(reply) = save_design(State(state), HeaderMap::new(), Bytes::from(payload))
            .await
            .expect("save");

        assert_eq!(reply.lunette_id, "rec_1");
        assert_eq!(store.created.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn camel_case_fields_win_when_both_spellings_arrive() {
        let store = Arc::new(RecordingStore::default());
        let state = state_with(store.clone());
        let body = Bytes::from(
            json!({
                "name": "Aviateur",
                "nom": "Ancien nom",
                "codeSvg": "<svg viewBox=\"0 0 400 150\"></svg>",
                "code_svg": "<div>legacy</div>",
                "userId": "user_9",
                "largeurPont": 24.0,
                "largeur_pont": "99"
            })
            .to_string(),
        );

        let Json(reply) = save_design(State(state), HeaderMap::new(), body)
            .await
            .expect("save");

        assert_eq!(reply.name, "Aviateur");
        let created = store.created.lock().await;
        assert_eq!(
            created[0].svg_markup,
            "<svg viewBox=\"0 0 400 150\"></svg>"
        );
        assert_eq!(created[0].bridge_mm, Some(24.0));
    }

    #[tokio::test]
    async fn save_retries_without_the_rejected_name() {
        let store = Arc::new(RecordingStore::default());
        store.reject_name_once.store(true, Ordering::SeqCst);
        let state = state_with(store.clone());

        let Json(reply) = save_design(State(state.clone()), HeaderMap::new(), save_body())
            .await
            .expect("retried save");

        // The retry stores no name, so the submitted one is echoed back.
        assert_eq!(reply.name, "Aviateur");
        let created = store.created.lock().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, None);
        drop(created);
        let snapshot = state.telemetry.snapshot();
        assert_eq!(snapshot.design_name_retries_total, 1);
        assert_eq!(snapshot.designs_saved_total, 1);
        assert_eq!(snapshot.design_save_failures_total, 0);
    }

    #[tokio::test]
    async fn rejections_outside_the_name_field_are_terminal() {
        let store = Arc::new(RecordingStore {
            reject_bridge: true,
            ..RecordingStore::default()
        });
        let state = state_with(store.clone());

        let err = save_design(State(state.clone()), HeaderMap::new(), save_body())
            .await
            .expect_err("rejected save");

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, MSG_SAVE_FAILED);
        assert!(store.created.lock().await.is_empty());
        let snapshot = state.telemetry.snapshot();
        assert_eq!(snapshot.design_name_retries_total, 0);
        assert_eq!(snapshot.design_save_failures_total, 1);
    }

    #[tokio::test]
    async fn store_failures_surface_the_curated_message() {
        let state = state_with(Arc::new(RecordingStore {
            fail_create: true,
            ..RecordingStore::default()
        }));

        let err = save_design(State(state.clone()), HeaderMap::new(), save_body())
            .await
            .expect_err("store down");

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, MSG_SAVE_FAILED);
        assert_eq!(state.telemetry.snapshot().design_save_failures_total, 1);
    }

    #[tokio::test]
    async fn ownership_link_failures_fail_the_save() {
        let state = state_with(Arc::new(RecordingStore {
            fail_link: true,
            ..RecordingStore::default()
        }));

        let err = save_design(State(state.clone()), HeaderMap::new(), save_body())
            .await
            .expect_err("link down");

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(state.telemetry.snapshot().designs_saved_total, 0);
    }

    #[tokio::test]
    async fn materials_map_records_into_the_gallery_shape() {
        let state = state_with(Arc::new(RecordingStore {
            materials: vec![
                MaterialRecord {
                    id: "mat_1".to_string(),
                    label: Some("Écaille".to_string()),
                    image_url: Some("https://store.test/api/files/m/mat_1/e.png".to_string()),
                    raw: json!({"id": "mat_1", "libelle": "Écaille dorée"}),
                },
                MaterialRecord {
                    id: "mat_2".to_string(),
                    label: None,
                    image_url: None,
                    raw: json!({"id": "mat_2"}),
                },
            ],
            ..RecordingStore::default()
        }));

        let Json(reply) = list_materials(State(state)).await;

        assert!(reply.success);
        assert_eq!(reply.items.len(), 2);
        assert_eq!(reply.items[0].label, "Écaille");
        assert_eq!(reply.items[0].data["libelle"], json!("Écaille dorée"));
        // Label falls back to the record id when the store has none.
        assert_eq!(reply.items[1].label, "mat_2");
        assert_eq!(reply.items[1].image_url, None);
    }

    #[tokio::test]
    async fn materials_failures_soft_fail_to_an_empty_list() {
        let state = state_with(Arc::new(RecordingStore {
            fail_materials: true,
            ..RecordingStore::default()
        }));

        let Json(reply) = list_materials(State(state.clone())).await;

        assert!(!reply.success);
        assert!(reply.items.is_empty());
        assert_eq!(state.telemetry.snapshot().materials_fallbacks_total, 1);
    }

    #[tokio::test]
    async fn suggestions_require_a_configured_key() {
        let state = state_with(Arc::new(RecordingStore::default()));
        let body = Bytes::from(json!({"prompt": "plage"}).to_string());

        let err = generate_colors(State(state), body)
            .await
            .expect_err("no key");

        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message, MSG_NO_API_KEY);
    }

    #[tokio::test]
    async fn suggestion_round_trips_a_full_palette() {
        let engine = Arc::new(ScriptedEngine {
            reply: r#"Voici : {"branches":"Noir","frame":"Écaille","lenses":"Bleu","reason":"Un contraste estival."}"#,
        });
        let state = state_with_engine(Arc::new(RecordingStore::default()), engine);
        let body = Bytes::from(
            json!({"prompt": "été à la plage", "current": {"branches": "Noir"}}).to_string(),
        );

        let Json(reply) = generate_colors(State(state), body).await.expect("palette");

        assert!(reply.success);
        assert_eq!(
            reply.colors.branches.as_ref().map(|c| c.value.as_str()),
            Some("#1f1f1f")
        );
        assert_eq!(
            reply.colors.lenses.as_ref().map(|c| c.name.as_str()),
            Some("Bleu")
        );
        assert_eq!(reply.reason.as_deref(), Some("Un contraste estival."));
    }

    #[tokio::test]
    async fn partial_matches_serialize_role_nulls() {
        let engine = Arc::new(ScriptedEngine {
            reply: r#"{"branches":"Noir","frame":"Turquoise","lenses":"Bleu"}"#,
        });
        let state = state_with_engine(Arc::new(RecordingStore::default()), engine);
        let body = Bytes::from(json!({"prompt": "contraste"}).to_string());

        let Json(reply) = generate_colors(State(state), body).await.expect("partial");

        let wire = serde_json::to_value(&reply).expect("serialize");
        assert_eq!(wire["colors"]["frame"], Value::Null);
        assert_eq!(wire["colors"]["branches"]["name"], json!("Noir"));
        assert_eq!(wire["reason"], Value::Null);
    }

    #[tokio::test]
    async fn out_of_palette_replies_map_to_422() {
        let engine = Arc::new(ScriptedEngine {
            reply: r#"{"branches":"Cyan","frame":"Magenta","lenses":"Turquoise"}"#,
        });
        let state = state_with_engine(Arc::new(RecordingStore::default()), engine);
        let body = Bytes::from(json!({"prompt": "fluo"}).to_string());

        let err = generate_colors(State(state), body)
            .await
            .expect_err("out of palette");

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message, MSG_OUT_OF_PALETTE);
    }

    #[tokio::test]
    async fn engine_failures_map_to_curated_messages() {
        let cases: &[(fn() -> SuggestError, StatusCode, &str)] = &[
            (
                || SuggestError::EmptyReply,
                StatusCode::BAD_GATEWAY,
                MSG_EMPTY_REPLY,
            ),
            (
                || SuggestError::Unreadable,
                StatusCode::BAD_GATEWAY,
                MSG_UNREADABLE_REPLY,
            ),
            (
                || SuggestError::Rejected { status: 500 },
                StatusCode::BAD_GATEWAY,
                MSG_GENERATION_FAILED,
            ),
        ];

        for (build, status, message) in cases {
            let state = state_with_engine(
                Arc::new(RecordingStore::default()),
                Arc::new(FailingEngine { build: *build }),
            );
            let body = Bytes::from(json!({"prompt": "plage"}).to_string());

            let err = generate_colors(State(state), body)
                .await
                .expect_err("engine failure");

            assert_eq!(err.status, *status);
            assert_eq!(err.message, *message);
        }
    }

    #[tokio::test]
    async fn blank_prompts_are_rejected_before_the_engine_runs() {
        let engine = Arc::new(ScriptedEngine { reply: "{}" });
        let state = state_with_engine(Arc::new(RecordingStore::default()), engine);
        let body = Bytes::from(json!({"prompt": "   "}).to_string());

        let err = generate_colors(State(state), body)
            .await
            .expect_err("blank prompt");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, MSG_PROMPT_REQUIRED);
    }

    #[tokio::test]
    async fn undeserializable_suggestion_bodies_are_a_400() {
        let engine = Arc::new(ScriptedEngine { reply: "{}" });
        let state = state_with_engine(Arc::new(RecordingStore::default()), engine);

        let err = generate_colors(State(state), Bytes::from_static(b"not json"))
            .await
            .expect_err("bad body");

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, MSG_INVALID_REQUEST);
    }

    #[tokio::test]
    async fn health_tracks_the_last_store_outcome() {
        let state = state_with(Arc::new(RecordingStore {
            fail_materials: true,
            ..RecordingStore::default()
        }));

        let Json(healthy) = health(State(state.clone())).await;
        assert_eq!(healthy.status, "ok");
        assert_eq!(healthy.components.store, "up");

        let _ = list_materials(State(state.clone())).await;
        let Json(degraded) = health(State(state.clone())).await;
        assert_eq!(degraded.components.store, "degraded");
    }

    #[tokio::test]
    async fn metrics_render_the_exposition_format() {
        let state = state_with(Arc::new(RecordingStore::default()));
        state.telemetry.inc_design_saved();

        let response = metrics(State(state)).await.expect("metrics");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/plain; version=0.0.4")
        );
    }
}
