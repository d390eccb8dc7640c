//! MCP server implementation
//!
//! The server owns the tool router and delegates each tool to the struct
//! for its area.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::backend::{BackendRoutes, JobBackend};
use crate::batch::{BatchOrchestrator, OutputSink, PollPolicy};
use crate::coverage::ProfileRegistry;

use super::tools::{
    AnalyzeCoverageParams, BatchTools, CheckBatchStatusParams, CoverageTools,
    GenerateBatchParams, ResumeBatchParams,
};

/// Main MCP server coordinator
///
/// Generic over `B: JobBackend` so tests can run it against a scripted
/// backend.
pub struct McpServer<B: JobBackend> {
    batch_tools: BatchTools<B>,
    coverage_tools: CoverageTools<B>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl<B: JobBackend + 'static> McpServer<B> {
    pub fn new(
        backend: Arc<B>,
        orchestrator: BatchOrchestrator<B>,
        sink: OutputSink,
        policy: PollPolicy,
        profiles: ProfileRegistry,
    ) -> Self {
        let routes: BackendRoutes = orchestrator.routes().clone();
        Self {
            batch_tools: BatchTools::new(Arc::new(orchestrator), Arc::new(sink), policy),
            coverage_tools: CoverageTools::new(backend, routes, Arc::new(profiles)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Generate certification questions as a batch job, wait for completion (with fallbacks when the status endpoint misbehaves) and save them as JSON or SQL. Returns the output path and a per-domain summary."
    )]
    pub async fn generate_questions_batch(
        &self,
        params: Parameters<GenerateBatchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.batch_tools.generate_questions_batch(params).await
    }

    #[tool(description = "Check the status of a batch generation job once, without waiting.")]
    pub async fn check_batch_status(
        &self,
        params: Parameters<CheckBatchStatusParams>,
    ) -> Result<CallToolResult, McpError> {
        self.batch_tools.check_batch_status(params).await
    }

    #[tool(
        description = "Keep waiting on an existing batch job (e.g. after a timeout) and save its questions."
    )]
    pub async fn resume_batch(
        &self,
        params: Parameters<ResumeBatchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.batch_tools.resume_batch(params).await
    }

    #[tool(
        description = "Compare per-domain question counts against a certification's exam-guide weights and report under/over-covered domains."
    )]
    pub async fn analyze_coverage(
        &self,
        params: Parameters<AnalyzeCoverageParams>,
    ) -> Result<CallToolResult, McpError> {
        self.coverage_tools.analyze_coverage(params).await
    }

    #[tool(description = "List the available coverage profiles and their domain weights.")]
    pub async fn list_coverage_profiles(&self) -> Result<CallToolResult, McpError> {
        self.coverage_tools.list_coverage_profiles().await
    }
}

#[tool_handler]
impl<B: JobBackend + 'static> ServerHandler for McpServer<B> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "qbank MCP Server - Generate certification question batches and analyze domain coverage",
        )
    }
}
