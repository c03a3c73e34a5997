use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use super::object::{ToolObject, ToolObjectImpl};
use super::{Tool, ToolDescriptor, ToolHandle};

/// The requested tool is not registered.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown tool `{name}`")]
pub struct UnknownToolError {
    /// The name that failed to resolve.
    pub name: String,
}

#[derive(Default)]
struct Slots {
    tools: Vec<Arc<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

/// The set of tools known to an agent.
///
/// Tools are keyed by name. Registering a tool under an existing name
/// replaces the previous one but keeps its position in the catalog.
///
/// The registry can be shared (usually through an `Arc`) and registered to
/// while runs are resolving tools from it, e.g. when remote tools are
/// still being discovered.
#[derive(Default)]
pub struct Registry {
    slots: RwLock<Slots>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    #[inline]
    pub fn register<T: Tool>(&self, tool: T) {
        self.register_object(Arc::new(ToolObjectImpl(tool)));
    }

    fn register_object(&self, tool: Arc<dyn ToolObject>) {
        let name = tool.name().to_owned();
        let mut slots = self.write();
        match slots.index.get(&name) {
            Some(&idx) => {
                debug!("replacing tool: {name}");
                slots.tools[idx] = tool;
            }
            None => {
                trace!("registering tool: {name}");
                let idx = slots.tools.len();
                slots.tools.push(tool);
                slots.index.insert(name, idx);
            }
        }
    }

    /// Resolves a tool by name.
    pub fn resolve(&self, name: &str) -> Result<ToolHandle, UnknownToolError> {
        let slots = self.read();
        let Some(&idx) = slots.index.get(name) else {
            return Err(UnknownToolError {
                name: name.to_owned(),
            });
        };
        Ok(ToolHandle(Arc::clone(&slots.tools[idx])))
    }

    /// Returns descriptors of all tools in registration order.
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        self.read()
            .tools
            .iter()
            .map(|tool| tool.descriptor())
            .collect()
    }

    /// Renders the catalog as text for the model's system instructions.
    pub fn render_catalog(&self) -> String {
        self.catalog()
            .iter()
            .map(ToolDescriptor::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns the names of all tools in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read()
            .tools
            .iter()
            .map(|tool| tool.name().to_owned())
            .collect()
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.read().tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave `Slots` half-updated,
    // so a poisoned lock is still safe to use.
    #[inline]
    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}
