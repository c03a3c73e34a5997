use react_agent_core::Tool;
use react_agent_core::tool::{Error, ToolResult};
use serde_json::Value;

use crate::McpClient;
use crate::proto::{CallToolResult, ToolInfo};

const UNKNOWN_ERROR: &str = "unknown error from the tool";

/// A tool that lives on an MCP server.
///
/// Its name, description and schema are whatever the server advertised, and
/// arguments are forwarded untouched. Input validation is up to the server.
pub struct RemoteTool {
    client: McpClient,
    name: String,
    description: String,
    input_schema: Value,
}

impl RemoteTool {
    pub(crate) fn new(client: McpClient, info: ToolInfo) -> Self {
        Self {
            client,
            description: info
                .description
                .unwrap_or_else(|| "No description".to_owned()),
            name: info.name,
            input_schema: info.input_schema,
        }
    }
}

impl Tool for RemoteTool {
    type Input = Value;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.input_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let name = self.name.clone();
        async move {
            match client.call_tool(&name, &input).await {
                Ok(result) => into_tool_result(result),
                Err(err) => Err(Error::execution_error()
                    .with_reason(format!("MCP call failed: {err}"))),
            }
        }
    }
}

fn into_tool_result(result: CallToolResult) -> ToolResult {
    if result.is_error {
        let reason = result.texts().next().unwrap_or(UNKNOWN_ERROR).to_owned();
        return Err(Error::execution_error().with_reason(reason));
    }
    if let Some(structured) = result.structured_content {
        return Ok(structured.to_string());
    }
    Ok(result.texts().collect::<Vec<_>>().join("\n"))
}
