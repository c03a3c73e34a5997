use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where and how to reach one MCP server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct McpServerConfig {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) connect_timeout: Duration,
    pub(crate) request_timeout: Duration,
}

impl McpServerConfig {
    /// Creates a config for the server `name` listening on `url`, the full
    /// streamable HTTP endpoint (usually ending with `/mcp`).
    #[inline]
    pub fn new<N: Into<String>, U: Into<String>>(name: N, url: U) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets how long to keep retrying the initial handshake.
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the HTTP timeout of every request after the handshake.
    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the server name used in logs.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the endpoint URL.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }
}
