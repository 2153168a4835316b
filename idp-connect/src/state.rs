use crate::config::AppConfig;
use crate::providers::{create_provider, Provider, ProviderError};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub provider: Arc<Provider>,
}

impl AppState {
    /// Connects to the configured provider and builds the shared state
    pub async fn new(config: AppConfig) -> Result<Self, ProviderError> {
        let provider = create_provider(&config).await?;
        Ok(Self::with_provider(config, provider))
    }

    pub fn with_provider(config: AppConfig, provider: Provider) -> Self {
        Self {
            config: Arc::new(config),
            provider: Arc::new(provider),
        }
    }
}
