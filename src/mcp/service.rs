//! MCP server construction and stdio serving.

use std::sync::Arc;

use miette::Diagnostic;
use rmcp::{ServiceExt, transport::stdio};
use thiserror::Error;
use tracing::info;

use crate::backend::{BackendError, HttpJobBackend, JobBackend};
use crate::config::Settings;
use crate::coverage::ProfileError;

use super::server::McpServer;

#[derive(Error, Diagnostic, Debug)]
pub enum ServeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Profiles(#[from] ProfileError),

    #[error("MCP transport error: {message}")]
    #[diagnostic(code(qbank::mcp::transport))]
    Transport { message: String },
}

/// Build a server for an arbitrary backend from resolved settings.
pub fn create_mcp_server<B: JobBackend + 'static>(
    backend: Arc<B>,
    settings: &Settings,
) -> Result<McpServer<B>, ServeError> {
    let profiles = settings.load_profiles()?;
    let orchestrator = settings.build_orchestrator(Arc::clone(&backend));

    Ok(McpServer::new(
        backend,
        orchestrator,
        settings.output_sink(),
        settings.poll,
        profiles,
    ))
}

/// Build the production server talking HTTP to the configured backend.
pub fn build_server(settings: &Settings) -> Result<McpServer<HttpJobBackend>, ServeError> {
    let backend = settings.build_backend()?;
    create_mcp_server(Arc::new(backend), settings)
}

/// Serve over stdin/stdout until the client disconnects.
pub async fn serve_stdio<B: JobBackend + 'static>(server: McpServer<B>) -> Result<(), ServeError> {
    info!("starting MCP server on stdio");
    let service = server
        .serve(stdio())
        .await
        .map_err(|e| ServeError::Transport {
            message: e.to_string(),
        })?;
    service.waiting().await.map_err(|e| ServeError::Transport {
        message: e.to_string(),
    })?;
    info!("MCP client disconnected");
    Ok(())
}
