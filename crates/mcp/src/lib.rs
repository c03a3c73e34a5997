//! Remote tools over the Model Context Protocol.
//!
//! Only the streamable HTTP transport is supported: every message is a
//! JSON-RPC 2.0 `POST`, answered with either a JSON body or a short
//! server-sent event stream.

#[macro_use]
extern crate tracing;

mod client;
mod config;
mod io;
mod manager;
mod proto;
mod tool;

pub use client::{Error, McpClient};
pub use config::McpServerConfig;
pub use manager::McpManager;
pub use proto::{CallToolResult, Content, Implementation, ToolInfo};
pub use tool::RemoteTool;
