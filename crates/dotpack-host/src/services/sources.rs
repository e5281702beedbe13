use super::SourceProvider;
use async_trait::async_trait;
use dotpack_core::config::SourceConfig;
use dotpack_core::AppResult;
use dotpack_proto::PackageSource;

/// Sources listed in the host configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredSources {
    sources: Vec<SourceConfig>,
}

impl ConfiguredSources {
    #[must_use]
    pub fn new(sources: Vec<SourceConfig>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl SourceProvider for ConfiguredSources {
    async fn list_sources(&self) -> AppResult<Vec<PackageSource>> {
        Ok(self.sources.iter().map(SourceConfig::to_source).collect())
    }
}
