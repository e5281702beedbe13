//! `dotpack serve`: the stdio bridge.
//!
//! Each stdin line is one raw UI message. Every line is dispatched on its own
//! task so a long install does not hold up searches; the runtime is
//! single-threaded, so dispatches start in arrival order. Notifications are
//! written to stdout as one envelope per line by a single writer task.

use dotpack_core::Config;
use dotpack_host::services::{ConfiguredSources, DotnetExecutor, NuGetFeed, WorkspaceDiscovery};
use dotpack_host::{ChannelSink, HostContext, Mediator, Services};
use dotpack_proto::{decode_line, encode_line, Notification};
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How long queued notifications may take to drain after stdin closes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(config: Config, dotnet: PathBuf) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(serve(config, dotnet))
}

/// Wire the concrete collaborators from config.
fn services(config: &Config, dotnet: PathBuf) -> Result<Services> {
    let feed = Arc::new(NuGetFeed::new(config.sources.clone()).into_diagnostic()?);

    Ok(Services::new()
        .with_search(feed.clone())
        .with_details(feed)
        .with_discovery(Arc::new(WorkspaceDiscovery::new(
            config.workspace_root.clone(),
        )))
        .with_executor(Arc::new(DotnetExecutor::new(dotnet)))
        .with_sources(Arc::new(ConfiguredSources::new(config.sources.clone()))))
}

async fn serve(config: Config, dotnet: PathBuf) -> Result<()> {
    let services = services(&config, dotnet)?;
    info!(root = %config.workspace_root.display(), "serving on stdio");

    let (sink, outbox) = ChannelSink::new();
    let ctx = HostContext::new(config, Arc::new(sink), services);
    let mediator = Mediator::new(ctx.clone());
    let writer = tokio::spawn(write_notifications(outbox));

    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.into_diagnostic()? {
        while tasks.try_join_next().is_some() {}

        if line.trim().is_empty() {
            continue;
        }
        let raw = match decode_line(&line) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "skipping undecodable line");
                continue;
            }
        };

        let mediator = mediator.clone();
        tasks.spawn(async move { mediator.dispatch(&raw).await });
    }

    debug!(pending = tasks.len(), "stdin closed, finishing dispatches");
    while tasks.join_next().await.is_some() {}

    ctx.shutdown();
    drop(mediator);
    drop(ctx);

    match tokio::time::timeout(DRAIN_TIMEOUT, writer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => warn!(error = %err, "writing notifications failed"),
        Ok(Err(err)) => warn!(error = %err, "notification writer panicked"),
        Err(_) => warn!("timed out draining notifications"),
    }

    info!("host stopped");
    Ok(())
}

async fn write_notifications(mut outbox: UnboundedReceiver<Notification>) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(notification) = outbox.recv().await {
        let line = match notification.to_envelope() {
            Ok(envelope) => encode_line(&envelope)?,
            Err(err) => {
                warn!(name = %notification.name(), error = %err, "cannot encode notification");
                continue;
            }
        };
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }

    Ok(())
}
