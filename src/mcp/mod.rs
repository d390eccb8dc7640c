//! Model Context Protocol (MCP) server implementation
//!
//! Exposes batch generation and coverage analysis as MCP tools over the
//! stdio transport.
//!
//! - **server**: tool router and `ServerHandler`
//! - **tools**: one struct per area, generic over `B: JobBackend`
//!   - BatchTools: generate, check status, resume
//!   - CoverageTools: analyze coverage, list profiles
//! - **service**: construction from settings and stdio serving

pub mod server;
mod service;
pub mod tools;


pub use server::McpServer;
pub use service::{ServeError, build_server, create_mcp_server, serve_stdio};
