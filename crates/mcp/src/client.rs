use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use backoff::ExponentialBackoffBuilder;
use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::McpServerConfig;
use crate::io::{Chunks, Sse};
use crate::proto::{
    CallToolParams, CallToolResult, Implementation, Incoming, InitializeParams,
    InitializeResult, ListToolsParams, ListToolsResult, Notification,
    PROTOCOL_VERSION, Request, ToolInfo,
};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_HEADER: &str = "mcp-protocol-version";

/// Errors talking to an MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request could not be completed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server responded with status {0}")]
    Status(StatusCode),
    /// The server answered with neither JSON nor an event stream.
    #[error("unexpected content type: {0:?}")]
    UnexpectedContentType(Option<String>),
    /// The body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The server answered with a JSON-RPC error.
    #[error("server returned error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the server.
        message: String,
    },
    /// The response stream ended before the answer arrived.
    #[error("no response to request {0}")]
    NoResponse(u64),
}

impl Error {
    /// Whether retrying the handshake may help.
    fn is_transient(&self) -> bool {
        match self {
            Error::Http(err) => err.is_connect() || err.is_timeout(),
            Error::Status(status) => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

struct Inner {
    http: Client,
    url: String,
    session_id: Option<String>,
    server_info: Option<Implementation>,
    next_id: AtomicU64,
}

/// A client of one MCP server over the streamable HTTP transport.
///
/// The client is cheap to clone, clones share the session.
#[derive(Clone)]
pub struct McpClient {
    inner: Arc<Inner>,
}

impl McpClient {
    /// Performs the initialization handshake with the server.
    ///
    /// Connection failures are retried with exponential backoff for up to
    /// the configured connect timeout.
    pub async fn connect(config: &McpServerConfig) -> Result<Self, Error> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION,
            capabilities: Map::new(),
            client_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            },
        };
        let policy = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(config.connect_timeout))
            .build();
        let (http_ref, params_ref) = (&http, &params);
        let handshake = backoff::future::retry(policy, move || async move {
            let req = Request::new(0, "initialize", Some(params_ref));
            exchange(http_ref, &config.url, None, &req, Some(0))
                .await
                .map_err(|err| {
                    if err.is_transient() {
                        debug!("retrying {}: {err}", config.name);
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
        })
        .await?;

        let message = handshake.message.ok_or(Error::NoResponse(0))?;
        let result: InitializeResult = into_result(message)?;
        if result.protocol_version != PROTOCOL_VERSION {
            debug!(
                "{} negotiated protocol version {}",
                config.name, result.protocol_version
            );
        }

        let client = Self {
            inner: Arc::new(Inner {
                http,
                url: config.url.clone(),
                session_id: handshake.session_id,
                server_info: result.server_info,
                next_id: AtomicU64::new(1),
            }),
        };
        client.notify("notifications/initialized").await?;
        info!("connected to MCP server {}", config.name);
        Ok(client)
    }

    /// Returns the name and version the server reported, if any.
    #[inline]
    pub fn server_info(&self) -> Option<&Implementation> {
        self.inner.server_info.as_ref()
    }

    /// Checks that the server is alive.
    pub async fn ping(&self) -> Result<(), Error> {
        self.request::<(), Value>("ping", None).await?;
        Ok(())
    }

    /// Lists every tool of the server, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, Error> {
        let mut tools = vec![];
        let mut cursor = None;
        loop {
            let params = cursor.take().map(|cursor| ListToolsParams { cursor });
            let page: ListToolsResult =
                self.request("tools/list", params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    /// Invokes the tool `name` with `arguments`.
    ///
    /// A tool-level failure is not an `Err`, it comes back as a result with
    /// `is_error` set.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Value,
    ) -> Result<CallToolResult, Error> {
        self.request("tools/call", Some(CallToolParams { name, arguments }))
            .await
    }

    /// Terminates the session on the server. Failures are only logged.
    pub async fn close(&self) {
        let Some(session_id) = &self.inner.session_id else {
            return;
        };
        let result = self
            .inner
            .http
            .delete(&self.inner.url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await;
        if let Err(err) = result {
            debug!("failed to close session {session_id}: {err}");
        }
    }

    async fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<R, Error> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        trace!("sending request {id}: {method}");
        let req = Request::new(id, method, params);
        let exchange = exchange(
            &self.inner.http,
            &self.inner.url,
            self.inner.session_id.as_deref(),
            &req,
            Some(id),
        )
        .await?;
        into_result(exchange.message.ok_or(Error::NoResponse(id))?)
    }

    async fn notify(&self, method: &str) -> Result<(), Error> {
        exchange(
            &self.inner.http,
            &self.inner.url,
            self.inner.session_id.as_deref(),
            &Notification::new(method),
            None,
        )
        .await?;
        Ok(())
    }
}

struct Exchange {
    session_id: Option<String>,
    message: Option<Incoming>,
}

/// Posts one message and, if `id` is given, waits for its response.
async fn exchange<B: Serialize>(
    http: &Client,
    url: &str,
    session_id: Option<&str>,
    body: &B,
    id: Option<u64>,
) -> Result<Exchange, Error> {
    let mut builder = http
        .post(url)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream")
        .header(PROTOCOL_HEADER, PROTOCOL_VERSION);
    if let Some(session_id) = session_id {
        builder = builder.header(SESSION_HEADER, session_id);
    }
    let resp = builder.json(body).send().await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Status(status));
    }
    let session_id = resp
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let Some(id) = id else {
        return Ok(Exchange {
            session_id,
            message: None,
        });
    };
    let message = read_response(resp, id).await?;
    Ok(Exchange {
        session_id,
        message: Some(message),
    })
}

async fn read_response(resp: Response, id: u64) -> Result<Incoming, Error> {
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let mime = content_type.as_deref().and_then(|v| v.parse::<Mime>().ok());
    let Some(mime) = mime else {
        return Err(Error::UnexpectedContentType(content_type));
    };

    if mime.essence_str() == mime::APPLICATION_JSON.essence_str() {
        let message: Incoming = resp.json().await?;
        return if message.answers(id) {
            Ok(message)
        } else {
            Err(Error::InvalidResponse(format!(
                "expected the response to request {id}"
            )))
        };
    }
    if mime.essence_str() != mime::TEXT_EVENT_STREAM.essence_str() {
        return Err(Error::UnexpectedContentType(content_type));
    }

    let mut sse = Sse::new(Chunks::from_response(resp));
    loop {
        let event = sse
            .next_event()
            .await
            .map_err(|err| Error::InvalidResponse(err.to_string()))?;
        let Some(event) = event else {
            return Err(Error::NoResponse(id));
        };
        // Untyped events default to `message`.
        if event.event.as_deref().is_some_and(|kind| kind != "message") {
            continue;
        }
        if let Some(message) = match_event(&event.data, id)? {
            return Ok(message);
        }
    }
}

/// Decodes one event payload, keeping it only if it answers `id`.
fn match_event(data: &str, id: u64) -> Result<Option<Incoming>, Error> {
    if data.trim().is_empty() {
        return Ok(None);
    }
    let message: Incoming = serde_json::from_str(data)
        .map_err(|err| Error::InvalidResponse(err.to_string()))?;
    if message.answers(id) {
        Ok(Some(message))
    } else {
        trace!("skipping unrelated message: {message:?}");
        Ok(None)
    }
}

fn into_result<R: DeserializeOwned>(message: Incoming) -> Result<R, Error> {
    if let Some(err) = message.error {
        return Err(Error::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    let result = message.result.unwrap_or(Value::Null);
    serde_json::from_value(result)
        .map_err(|err| Error::InvalidResponse(err.to_string()))
}
