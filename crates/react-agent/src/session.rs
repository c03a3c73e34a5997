use std::sync::Arc;

use react_agent_core::{
    Agent, AgentBuilder, Registry, RunError, StepSink, Tool, ToolSource,
};
use react_agent_mcp::{McpManager, McpServerConfig};
use react_agent_model::ModelProvider;

use crate::config::AgentConfig;
use crate::tools::*;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    registry: Arc<Registry>,
    mcp_servers: Vec<McpServerConfig>,
    builtin_tools: bool,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            registry: Default::default(),
            mcp_servers: vec![],
            builtin_tools: true,
        }
    }

    /// Applies the `[agent]` section of a configuration file.
    pub fn with_agent_config(mut self, config: &AgentConfig) -> Self {
        self.agent_builder = self
            .agent_builder
            .with_max_iterations(config.max_iterations)
            .with_tool_timeout(config.tool_timeout());
        if let Some(instructions) = &config.instructions {
            self.agent_builder =
                self.agent_builder.with_instructions(instructions.as_str());
        }
        self
    }

    /// Sets the maximum number of model calls per task.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.agent_builder =
            self.agent_builder.with_max_iterations(max_iterations);
        self
    }

    /// Registers an additional tool.
    #[inline]
    pub fn with_tool<T: Tool>(self, tool: T) -> Self {
        self.registry.register(tool);
        self
    }

    /// Adds remote MCP servers to discover tools from.
    #[inline]
    pub fn with_mcp_servers(
        mut self,
        servers: impl IntoIterator<Item = McpServerConfig>,
    ) -> Self {
        self.mcp_servers.extend(servers);
        self
    }

    /// Leaves out the built-in tools.
    #[inline]
    pub fn without_builtin_tools(mut self) -> Self {
        self.builtin_tools = false;
        self
    }

    /// Builds a new session.
    ///
    /// Connects to the MCP servers and registers their tools. Servers that
    /// can't be reached are skipped.
    pub async fn build(self) -> Session {
        let registry = self.registry;
        if self.builtin_tools {
            registry.register(CalculatorTool::new());
        }

        let mcp = McpManager::connect_all(&self.mcp_servers).await;
        match mcp.discover(&registry).await {
            Ok(count) => debug!("discovered {count} tool(s) from {}", mcp.label()),
            Err(err) => warn!("tool discovery from {} failed: {err}", mcp.label()),
        }

        let agent = self.agent_builder.with_registry(registry).build();
        Session { agent, mcp }
    }
}

/// A task-solving session.
///
/// The session holds a fully configured agent that you can use directly,
/// along with the connections to the tool servers it uses.
pub struct Session {
    agent: Agent,
    mcp: McpManager,
}

impl Session {
    /// Solves one task. See [`Agent::run`].
    #[inline]
    pub async fn ask(
        &self,
        prompt: &str,
        sink: Option<&dyn StepSink>,
    ) -> Result<String, RunError> {
        self.agent.run(prompt, sink).await
    }

    /// Returns the names of every available tool.
    #[inline]
    pub fn tool_names(&self) -> Vec<String> {
        self.agent.registry().names()
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Closes the sessions with the tool servers.
    pub async fn close(&self) {
        self.mcp.close_all().await;
    }
}
