//! Admission and dispatch.
//!
//! A raw message is admitted through [`Request::admit`] (tag lookup, then the
//! type guard for that tag, then payload decoding). Rejections are logged and
//! dropped without a response. Admitted requests go through an exhaustive
//! match, so every request type has exactly one handler.

use crate::context::HostContext;
use crate::handlers;
use dotpack_proto::{Rejection, Request};
use serde_json::Value;
use tracing::{debug, warn};

/// Routes raw UI messages to their handlers.
#[derive(Debug, Clone)]
pub struct Mediator {
    ctx: HostContext,
}

impl Mediator {
    #[must_use]
    pub fn new(ctx: HostContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &HostContext {
        &self.ctx
    }

    /// Admit and handle one raw message.
    ///
    /// Returns once the handler has finished. Debounced work (search,
    /// details) is scheduled on the controllers and completes later.
    pub async fn dispatch(&self, raw: &Value) {
        match Request::admit(raw) {
            Ok(request) => dispatch_request(&self.ctx, request).await,
            Err(Rejection::UnknownType(tag)) => {
                debug!(message_type = ?tag, "no handler for message type, ignoring");
            }
            Err(rejection @ Rejection::Malformed { .. }) => {
                warn!(reason = %rejection, message = %raw, "rejected malformed message");
            }
        }
    }
}

/// Hand an admitted request to its handler.
pub async fn dispatch_request(ctx: &HostContext, request: Request) {
    let message_type = request.message_type();
    debug!(message_type = %message_type, request_id = ?request.request_id(), "dispatching");

    match request {
        Request::Ready => handlers::handle_ready(ctx).await,
        Request::Search(req) => handlers::handle_search(ctx, req),
        Request::LoadMore(req) => handlers::handle_load_more(ctx, req),
        Request::PackageDetails(req) => handlers::handle_package_details(ctx, req),
        Request::GetProjects(req) => handlers::handle_get_projects(ctx, req).await,
        Request::RefreshProjectCache(req) => {
            handlers::handle_refresh_project_cache(ctx, req).await;
        }
        Request::InstallPackage(req) => handlers::handle_install(ctx, req).await,
        Request::UninstallPackage(req) => handlers::handle_uninstall(ctx, req).await,
        Request::GetPackageSources(req) => handlers::handle_get_package_sources(ctx, req).await,
    }
}
