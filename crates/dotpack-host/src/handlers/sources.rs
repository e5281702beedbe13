use crate::context::{require, HostContext};
use dotpack_proto::{GetPackageSourcesRequest, Notification, PackageSourcesResponse};
use tracing::warn;

pub async fn handle_get_package_sources(ctx: &HostContext, request: GetPackageSourcesRequest) {
    post_sources(ctx, request.request_id).await;
}

/// List sources, refresh the cache and post one `packageSourcesResponse`.
///
/// Falls back to the last known list when the provider fails.
pub(crate) async fn post_sources(ctx: &HostContext, request_id: Option<String>) {
    let Some(provider) = require(ctx.services.sources.as_ref(), "sources") else {
        return;
    };

    let sources = match provider.list_sources().await {
        Ok(sources) => {
            ctx.state.sources.replace(sources.clone());
            sources
        }
        Err(err) => {
            warn!(error = %err, "listing package sources failed");
            ctx.state.sources.get().unwrap_or_default()
        }
    };

    ctx.post(Notification::PackageSources(PackageSourcesResponse {
        request_id,
        sources,
    }));
}
