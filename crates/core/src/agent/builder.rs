use std::sync::Arc;
use std::time::Duration;

use react_agent_model::ModelProvider;

use super::Agent;
use crate::model_client::ModelClient;
use crate::tool::{Dispatcher, Registry, Tool};

/// The iteration cap used unless configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// The tool deadline used unless configured otherwise.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    registry: Arc<Registry>,
    max_iterations: usize,
    model_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    instructions: Option<Arc<str>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            registry: Default::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: None,
            tool_timeout: Some(DEFAULT_TOOL_TIMEOUT),
            instructions: None,
        }
    }

    /// Uses an existing, possibly shared, registry.
    ///
    /// Tools registered before this call are replaced along with the
    /// registry.
    #[inline]
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(self, tool: T) -> Self {
        self.registry.register(tool);
        self
    }

    /// Sets the maximum number of model calls per run.
    #[inline]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Bounds every model call. `None` waits forever.
    #[inline]
    pub fn with_model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Bounds every tool call. `None` waits forever.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Replaces the default persona at the top of the system prompt.
    #[inline]
    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = Some(Arc::from(instructions.into()));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Agent {
        let AgentBuilder {
            model_client,
            registry,
            max_iterations,
            model_timeout,
            tool_timeout,
            instructions,
        } = self;

        Agent {
            model_client: model_client.with_timeout(model_timeout),
            dispatcher: Dispatcher::new(Arc::clone(&registry), tool_timeout),
            registry,
            max_iterations,
            instructions,
        }
    }
}
