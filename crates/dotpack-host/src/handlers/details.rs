use crate::context::{require, HostContext};
use crate::services::DetailsService;
use crate::sink::MessageSink;
use dotpack_core::state::{DetailsCache, DetailsKey};
use dotpack_proto::{Notification, PackageDetails, PackageDetailsRequest, PackageDetailsResponse};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Values the UI already knows from the search result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsHints {
    pub total_downloads: Option<u64>,
    pub icon_url: Option<String>,
}

impl DetailsHints {
    /// Fill fields the details service left empty.
    pub fn apply(&self, details: &mut PackageDetails) {
        if details.total_downloads.is_none() {
            details.total_downloads = self.total_downloads;
        }
        if details.icon_url.is_none() {
            details.icon_url.clone_from(&self.icon_url);
        }
    }
}

/// One details fetch, carried through the details controller.
pub struct DetailsJob {
    pub service: Arc<dyn DetailsService>,
    pub sink: Arc<dyn MessageSink>,
    pub cache: Arc<DetailsCache>,
    pub package_id: String,
    pub version: Option<String>,
    pub source_id: Option<String>,
    pub request_id: Option<String>,
    pub hints: DetailsHints,
}

impl DetailsJob {
    pub async fn run(self, cancel: CancellationToken) {
        let result = self
            .service
            .get_package_details(
                &self.package_id,
                self.version.as_deref(),
                cancel.clone(),
                self.source_id.as_deref(),
            )
            .await;

        if cancel.is_cancelled() {
            debug!(package_id = %self.package_id, "details superseded, dropping result");
            return;
        }

        let response = match result {
            Ok(mut details) => {
                self.hints.apply(&mut details);
                let key = DetailsKey::new(
                    &self.package_id,
                    self.version.as_deref(),
                    self.source_id.as_deref(),
                );
                let details = self.cache.put(key, details);
                PackageDetailsResponse {
                    package_id: self.package_id,
                    version: self.version,
                    request_id: self.request_id,
                    data: Some((*details).clone()),
                    error: None,
                }
            }
            Err(err) if err.is_cancelled() => {
                debug!(package_id = %self.package_id, "details cancelled");
                return;
            }
            Err(err) => {
                warn!(package_id = %self.package_id, error = %err, "details fetch failed");
                PackageDetailsResponse {
                    package_id: self.package_id,
                    version: self.version,
                    request_id: self.request_id,
                    data: None,
                    error: Some(err.to_info()),
                }
            }
        };

        self.sink.post(Notification::PackageDetails(response));
    }
}

/// Single-flight details fetch, answered from the cache when possible.
pub fn handle_package_details(ctx: &HostContext, request: PackageDetailsRequest) {
    let Some(service) = require(ctx.services.details.as_ref(), "details") else {
        return;
    };

    let key = DetailsKey::new(
        &request.package_id,
        request.version.as_deref(),
        request.source_id.as_deref(),
    );

    if let Some(cached) = ctx.state.details_cache.get(&key) {
        // The older fetch must not answer after this one.
        ctx.state.details.cancel();
        debug!(package_id = %request.package_id, "details cache hit");
        ctx.post(Notification::PackageDetails(PackageDetailsResponse {
            package_id: request.package_id,
            version: request.version,
            request_id: request.request_id,
            data: Some((*cached).clone()),
            error: None,
        }));
        return;
    }

    ctx.state.details.trigger(DetailsJob {
        service,
        sink: Arc::clone(&ctx.sink),
        cache: Arc::clone(&ctx.state.details_cache),
        package_id: request.package_id,
        version: request.version,
        source_id: request.source_id,
        request_id: request.request_id,
        hints: DetailsHints {
            total_downloads: request.total_downloads,
            icon_url: request.icon_url,
        },
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_only_fill_missing_fields() {
        let hints = DetailsHints {
            total_downloads: Some(42),
            icon_url: Some("https://example.org/icon.png".to_string()),
        };

        let mut empty = PackageDetails::default();
        hints.apply(&mut empty);
        assert_eq!(empty.total_downloads, Some(42));
        assert_eq!(empty.icon_url.as_deref(), Some("https://example.org/icon.png"));

        let mut full = PackageDetails {
            total_downloads: Some(7),
            icon_url: Some("https://feed/icon.png".to_string()),
            ..Default::default()
        };
        hints.apply(&mut full);
        assert_eq!(full.total_downloads, Some(7));
        assert_eq!(full.icon_url.as_deref(), Some("https://feed/icon.png"));
    }
}
