use crate::context::{require, HostContext};
use crate::lifecycle::Phase;
use crate::services::{SearchOptions, SearchPage, SearchService};
use crate::sink::MessageSink;
use dotpack_core::{AppError, AppResult};
use dotpack_proto::{LoadMoreRequest, Notification, SearchRequest, SearchResponse};
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKind {
    Query(SearchOptions),
    NextPage,
}

/// One search attempt, carried through the search controller.
pub struct SearchJob {
    pub service: Arc<dyn SearchService>,
    pub sink: Arc<dyn MessageSink>,
    pub query: String,
    pub kind: SearchKind,
    pub request_id: Option<String>,
    /// Query the service's paging cursor belongs to.
    pub last_query: Arc<RwLock<String>>,
}

impl SearchJob {
    pub async fn run(self, cancel: CancellationToken) {
        let result: AppResult<SearchPage> = match &self.kind {
            SearchKind::Query(options) => {
                self.service
                    .search(&self.query, options, cancel.clone())
                    .await
            }
            SearchKind::NextPage => self.service.load_next_page(cancel.clone()).await,
        };

        // The cursor moved even if this attempt was superseded meanwhile.
        if matches!(self.kind, SearchKind::Query(_)) && result.is_ok() {
            *self
                .last_query
                .write()
                .unwrap_or_else(PoisonError::into_inner) = self.query.clone();
        }

        if cancel.is_cancelled() {
            debug!(query = %self.query, request_id = ?self.request_id, "search superseded, dropping result");
            return;
        }

        let response = match result {
            Ok(page) => SearchResponse {
                total_count: page.packages.len(),
                total_hits: page.total_hits,
                has_more: page.has_more,
                results: page.packages,
                request_id: self.request_id,
                query: self.query,
                error: None,
            },
            Err(err) if err.is_cancelled() => {
                debug!(query = %self.query, "search cancelled");
                return;
            }
            Err(err) => {
                warn!(query = %self.query, error = %err, "search failed");
                SearchResponse {
                    request_id: self.request_id,
                    query: self.query,
                    error: Some(err.to_info()),
                    ..SearchResponse::default()
                }
            }
        };

        self.sink.post(Notification::Search(response));
    }
}

/// Debounced search. A newer search supersedes this one.
pub fn handle_search(ctx: &HostContext, request: SearchRequest) {
    let Some(service) = require(ctx.services.search.as_ref(), "search") else {
        return;
    };

    let options = SearchOptions {
        prerelease: request
            .include_prerelease
            .unwrap_or(ctx.config.include_prerelease),
        source_id: request.source_id,
        skip: request.skip.unwrap_or(0),
        take: request.take.unwrap_or(ctx.config.page_size),
    };

    debug!(query = %request.query, request_id = ?request.request_id, "search scheduled");
    ctx.state.search.trigger(SearchJob {
        service,
        sink: Arc::clone(&ctx.sink),
        query: request.query,
        kind: SearchKind::Query(options),
        request_id: request.request_id,
        last_query: Arc::clone(&ctx.state.last_query),
    });
}

/// Next page of the last completed search, without debounce.
///
/// Refused while a search is scheduled or running: starting now would
/// supersede it and page through a cursor that is about to move.
pub fn handle_load_more(ctx: &HostContext, request: LoadMoreRequest) {
    let Some(service) = require(ctx.services.search.as_ref(), "search") else {
        return;
    };

    if matches!(ctx.state.search.phase(), Phase::Pending | Phase::InFlight) {
        debug!(request_id = ?request.request_id, "load more while a search is running");
        ctx.post(Notification::Search(SearchResponse {
            request_id: request.request_id,
            error: Some(AppError::validation("query", "a search is still running").to_info()),
            ..SearchResponse::default()
        }));
        return;
    }

    let query = ctx
        .state
        .last_query
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();

    if query.is_empty() {
        warn!("load more without a prior search");
        ctx.post(Notification::Search(SearchResponse {
            request_id: request.request_id,
            error: Some(AppError::validation("query", "no search to continue").to_info()),
            ..SearchResponse::default()
        }));
        return;
    }

    ctx.state.search.trigger_now(SearchJob {
        service,
        sink: Arc::clone(&ctx.sink),
        query,
        kind: SearchKind::NextPage,
        request_id: request.request_id,
        last_query: Arc::clone(&ctx.state.last_query),
    });
}
