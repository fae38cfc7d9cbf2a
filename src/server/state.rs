//! Application state shared across handlers

use crate::config::AppConfig;
use crate::service::AutoMlService;

pub struct AppState {
    pub config: AppConfig,
    pub service: AutoMlService,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let service = AutoMlService::from_config(&config);
        Self { config, service }
    }

    /// State around a pre-built service, e.g. one with a custom agent.
    pub fn with_service(config: AppConfig, service: AutoMlService) -> Self {
        Self { config, service }
    }
}
