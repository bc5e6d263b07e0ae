use std::sync::Arc;

use musegen_modelscope::client::ModelScopeClient;
use musegen_modelscope::vision::VisionClient;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Client for the generation service.
    pub modelscope: Arc<ModelScopeClient>,
    /// Client for the vision captioning service.
    pub vision: Arc<VisionClient>,
    /// Pooled HTTP client for image downloads.
    pub http: reqwest::Client,
    /// Server-wide shutdown token; in-flight poll loops watch a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build state from configuration, sharing one connection pool across
    /// all outbound clients.
    pub fn new(config: AppConfig) -> Self {
        let http = reqwest::Client::new();
        let modelscope = Arc::new(ModelScopeClient::with_client(
            http.clone(),
            config.modelscope_base_url.clone(),
        ));
        let vision = Arc::new(
            VisionClient::with_client(
                http.clone(),
                config.vision_base_url.clone(),
                config.vision_api_key.clone(),
            )
            .with_model(config.vision_model.clone()),
        );

        Self {
            config: Arc::new(config),
            modelscope,
            vision,
            http,
            shutdown: CancellationToken::new(),
        }
    }
}
