//! Tool call supports.

mod dispatcher;
mod error;
mod object;
mod registry;
mod source;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use dispatcher::Dispatcher;
pub use error::{Error, ErrorKind};
pub use object::ToolHandle;
pub use registry::{Registry, UnknownToolError};
pub use source::{DiscoveryError, ToolSource};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as a connection to a remote tool
/// server. To do this, make the context an immutable state of the tool, which
/// can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    ///
    /// Arguments chosen by the model are decoded into this type before
    /// [`Tool::execute`] is called, a decoding failure is reported back to
    /// the model as an [`ErrorKind::InvalidInput`] error. Use
    /// [`serde_json::Value`] to accept anything.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// Describes a registered tool, as shown to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Name of the tool, unique within a registry.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool, typically a
    /// [JSON schema](https://json-schema.org/).
    pub parameter_schema: Value,
}

impl ToolDescriptor {
    /// Renders the descriptor as a text block for the system prompt.
    pub fn render(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.parameter_schema)
            .unwrap_or_else(|_| self.parameter_schema.to_string());
        format!(
            "Tool: {}\nDescription: {}\nParameters (JSON Schema): {}\n",
            self.name, self.description, schema
        )
    }
}
