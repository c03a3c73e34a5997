use std::error::Error as StdError;

use async_trait::async_trait;

use super::Registry;

/// The error type returned by a failed discovery.
pub type DiscoveryError = Box<dyn StdError + Send + Sync>;

/// A provider of tools that are only known at runtime, such as a remote
/// tool server.
///
/// Discovered tools are registered exactly like local ones, so the agent
/// doesn't need to know where a tool comes from.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Returns a label of this source for diagnostics.
    fn label(&self) -> &str;

    /// Lists the tools of this source and registers them into `registry`.
    ///
    /// Returns the number of registered tools.
    async fn discover(&self, registry: &Registry)
    -> Result<usize, DiscoveryError>;
}
