use async_trait::async_trait;
use react_agent_core::tool::DiscoveryError;
use react_agent_core::{Registry, ToolSource};

use crate::{McpClient, McpServerConfig, RemoteTool};

/// A set of connected MCP servers acting as one [`ToolSource`].
///
/// Servers that can't be reached are left out, so the agent keeps working
/// with whatever tools are available.
#[derive(Clone, Default)]
pub struct McpManager {
    servers: Vec<(String, McpClient)>,
}

impl McpManager {
    /// Connects to every server in `configs`, skipping the ones that fail.
    pub async fn connect_all(configs: &[McpServerConfig]) -> Self {
        let mut servers = Vec::with_capacity(configs.len());
        for config in configs {
            let client = match McpClient::connect(config).await {
                Ok(client) => client,
                Err(err) => {
                    warn!("failed to connect to MCP server {}: {err}", config.name);
                    continue;
                }
            };
            if let Err(err) = client.ping().await {
                warn!("MCP server {} did not answer ping: {err}", config.name);
                continue;
            }
            servers.push((config.name.clone(), client));
        }
        Self { servers }
    }

    /// Returns the names of the connected servers.
    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.servers.iter().map(|(name, _)| name.as_str())
    }

    /// Registers every tool of every connected server into `registry`.
    ///
    /// A server whose tools can't be listed is skipped. Returns the number
    /// of registered tools.
    pub async fn discover_into(&self, registry: &Registry) -> usize {
        let mut count = 0;
        for (name, client) in &self.servers {
            let tools = match client.list_tools().await {
                Ok(tools) => tools,
                Err(err) => {
                    warn!("failed to list tools of MCP server {name}: {err}");
                    continue;
                }
            };
            for info in tools {
                debug!("registering MCP tool {} from {name}", info.name);
                registry.register(RemoteTool::new(client.clone(), info));
                count += 1;
            }
        }
        count
    }

    /// Closes every session.
    pub async fn close_all(&self) {
        for (_, client) in &self.servers {
            client.close().await;
        }
    }
}

#[async_trait]
impl ToolSource for McpManager {
    fn label(&self) -> &str {
        "mcp"
    }

    async fn discover(
        &self,
        registry: &Registry,
    ) -> Result<usize, DiscoveryError> {
        Ok(self.discover_into(registry).await)
    }
}
