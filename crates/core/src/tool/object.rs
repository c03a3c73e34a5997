use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolDescriptor, ToolResult};

pub(crate) type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(self: Arc<Self>, arguments: Value) -> BoxedToolFuture;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameter_schema: self.parameter_schema().clone(),
        }
    }
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(self: Arc<Self>, arguments: Value) -> BoxedToolFuture {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolResult::Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };

        let name = self.0.name().to_owned();
        Box::pin(
            self.0
                .execute(input)
                .instrument(debug_span!("tool execute", tool = %name)),
        )
    }
}

/// An executable handle to a registered tool.
///
/// Handles are cheap to clone and stay valid even if the tool is replaced
/// in the registry afterwards.
#[derive(Clone)]
pub struct ToolHandle(pub(crate) Arc<dyn ToolObject>);

impl ToolHandle {
    /// Returns the name of the tool.
    #[inline]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Returns the descriptor of the tool.
    #[inline]
    pub fn descriptor(&self) -> ToolDescriptor {
        self.0.descriptor()
    }

    /// Executes the tool with raw arguments chosen by the model.
    ///
    /// The arguments are decoded into the tool's input type first. Nothing
    /// here guards against a misbehaving tool; use a
    /// [`Dispatcher`](super::Dispatcher) for that.
    #[inline]
    pub fn execute(
        &self,
        arguments: Value,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        Arc::clone(&self.0).execute(arguments)
    }
}

impl Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolHandle")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
