pub mod backend;
pub mod batch;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod logging;
pub mod mcp;
