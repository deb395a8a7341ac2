//! MCP (Model Context Protocol) server for Engram

mod handler;
mod protocol;
mod tools;

pub use handler::EngramHandler;
pub use protocol::{
    methods, InitializeResult, McpError, McpHandler, McpRequest, McpResponse, McpServer,
    ServerCapabilities, ServerInfo, ToolCallResult, ToolContent, ToolDefinition, ToolsCapability,
};
pub use tools::get_tool_definitions;
