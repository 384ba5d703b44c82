//! Shared server state

use super::ServerConfig;
use crate::dataset::{CsvDatasetProvider, DatasetProvider, SyntheticDatasetProvider};
use crate::pipeline::{PipelineConfig, RiskPipeline};

/// State shared by all handlers.
///
/// The pipeline itself is rebuilt per request; the state only carries the
/// configuration needed to construct it.
pub struct AppState {
    pub config: ServerConfig,
    pub pipeline_config: PipelineConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            pipeline_config: PipelineConfig::default(),
        }
    }

    /// Build a pipeline for one request.
    ///
    /// Uses the configured CSV when the file exists, otherwise falls back
    /// to the synthetic provider so the service stays usable without a
    /// dataset on disk.
    pub fn pipeline(&self) -> RiskPipeline {
        let provider: Box<dyn DatasetProvider> =
            if std::path::Path::new(&self.config.data_path).exists() {
                Box::new(CsvDatasetProvider::new(&self.config.data_path))
            } else {
                Box::new(SyntheticDatasetProvider::new(self.config.synthetic_samples))
            };
        RiskPipeline::new(provider, self.pipeline_config.clone())
    }
}
