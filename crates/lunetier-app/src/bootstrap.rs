use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use lunetier_api::ApiServer;
use lunetier_config::{AppConfig, SuggestionConfig};
use lunetier_store::{HttpRecordStore, RecordStore};
use lunetier_suggest::{OpenRouterClient, OpenRouterSettings, SuggestionEngine, SuggestionService};
use lunetier_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};

/// Dependencies required to bootstrap the configurator service.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    http_addr: SocketAddr,
    store: Arc<dyn RecordStore>,
    suggestions: Option<SuggestionService>,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Assemble the production dependency set from the process environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            AppConfig::from_env().map_err(|err| AppError::config("app_config.from_env", err))?;

        let logging = logging_config_for(config.log_format.as_deref(), config.build_sha.clone());

        let store = HttpRecordStore::new(&config.pocketbase_url)
            .map_err(|err| AppError::store("record_store.new", err))?;

        let suggestions = suggestion_service_for(&config.suggestion)?;

        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            logging,
            http_addr: config.http_addr,
            store: Arc::new(store),
            suggestions,
            telemetry,
        })
    }
}

/// Entry point for the configurator service boot sequence.
///
/// # Errors
///
/// Returns an error when reading the environment or starting a phase fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(dependencies)).await
}

/// Boot sequence driven entirely by the injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    lunetier_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("bootstrap");

    info!("Configurator service bootstrap starting");

    let BootstrapDependencies {
        logging: _,
        http_addr,
        store,
        suggestions,
        telemetry,
    } = dependencies;

    if suggestions.is_none() {
        warn!("no completion API key configured; palette suggestions disabled");
    }

    let api = ApiServer::new(store, suggestions, telemetry);

    info!(addr = %http_addr, "Launching API listener");
    api.serve(http_addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("Configurator shutdown complete");
    Ok(())
}

fn logging_config_for(log_format: Option<&str>, build_sha: Option<String>) -> LoggingConfig<'static> {
    let mut logging = LoggingConfig::default();
    if let Some(format) = log_format.and_then(LogFormat::parse) {
        logging.format = format;
    }
    if let Some(sha) = build_sha {
        // Leaked once at startup; the logging layer keeps it for the process lifetime.
        logging.build_sha = Box::leak(sha.into_boxed_str());
    }
    logging
}

fn suggestion_service_for(config: &SuggestionConfig) -> AppResult<Option<SuggestionService>> {
    let Some(api_key) = config.api_key.clone() else {
        return Ok(None);
    };
    let client = OpenRouterClient::new(OpenRouterSettings {
        api_key,
        model: config.model.clone(),
        referer: config.site.clone(),
        title: config.title.clone(),
    })
    .map_err(|err| AppError::suggest("openrouter_client.new", err))?;
    let engine: Arc<dyn SuggestionEngine> = Arc::new(client);
    Ok(Some(SuggestionService::new(engine)))
}
