//! MCP tool implementations
//!
//! One struct per area, each generic over the job backend. The server's
//! router delegates to these.

mod batch;
mod coverage;

#[cfg(test)]
mod batch_test;
#[cfg(test)]
mod coverage_test;

pub use batch::{BatchTools, CheckBatchStatusParams, GenerateBatchParams, ResumeBatchParams};
pub use coverage::{AnalyzeCoverageParams, CoverageTools};

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};

fn text_result(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}
