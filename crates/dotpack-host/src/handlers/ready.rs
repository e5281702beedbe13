use super::sources::post_sources;
use crate::context::HostContext;
use tracing::info;

/// The UI finished loading; send it the source list.
pub async fn handle_ready(ctx: &HostContext) {
    info!("ui ready");
    post_sources(ctx, None).await;
}
