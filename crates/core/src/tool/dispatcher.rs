use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::{Map, Value};
use tokio::time::timeout;

use super::{Error, Registry, ToolResult};
use crate::context::Observation;
use crate::decision::{Action, Decision};

/// Routes tool decisions to the registry and turns every outcome into an
/// [`Observation`].
///
/// This is the single point where control leaves the agent for third-party
/// logic. Nothing that happens inside a tool (unknown name, bad input,
/// error, panic, hang) escapes as anything but a failed observation.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`. Each tool call is abandoned
    /// after `timeout`, if set.
    #[inline]
    pub fn new(registry: Arc<Registry>, timeout: Option<Duration>) -> Self {
        Self { registry, timeout }
    }

    /// Returns the registry tools are resolved from.
    #[inline]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Executes the tool named by `decision`.
    ///
    /// Terminal decisions (`ANSWER`, `ABORT`) name no tool and produce a
    /// failed observation.
    pub async fn dispatch(&self, decision: &Decision) -> Observation {
        let name = match &decision.action {
            Action::Tool(name) => name,
            action => {
                return Observation::failure(
                    action.as_str(),
                    format!("`{action}` is not a tool"),
                );
            }
        };
        let input = decision.action_input.clone().unwrap_or_default();
        self.call(name, input).await
    }

    /// Executes the tool `name` with `input`.
    pub async fn call(&self, name: &str, input: Map<String, Value>) -> Observation {
        let tool = match self.registry.resolve(name) {
            Ok(tool) => tool,
            Err(err) => {
                warn!("{err}");
                return Observation::failure(name, err.to_string());
            }
        };

        trace!("calling tool {name} with args: {input:?}");
        match self.guarded_call(|| tool.execute(Value::Object(input))).await {
            Ok(output) => Observation::success(name, output),
            Err(err) => {
                warn!("tool {name} failed: {err}");
                Observation::failure(name, err.to_string())
            }
        }
    }

    async fn guarded_call<F, Fut>(&self, start: F) -> ToolResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        // Tools may panic while building the future as well as while
        // polling it.
        let fut = match panic::catch_unwind(AssertUnwindSafe(start)) {
            Ok(fut) => fut,
            Err(payload) => return Err(panicked(payload)),
        };
        let fut = AssertUnwindSafe(fut).catch_unwind();

        let result = match self.timeout {
            Some(limit) => match timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(Error::timeout().with_reason(format!(
                        "no result after {} ms",
                        limit.as_millis()
                    )));
                }
            },
            None => fut.await,
        };
        result.unwrap_or_else(|payload| Err(panicked(payload)))
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    Error::panicked().with_reason(message)
}

#[cfg(test)]
mod tests {
    use std::future::{pending, ready};
    use std::pin::Pin;
    use std::sync::LazyLock;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::context::Outcome;
    use crate::tool::Tool;

    static ADD_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
        json!({
            "type": "object",
            "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
            "required": ["a", "b"]
        })
    });
    static ANY_SCHEMA: LazyLock<Value> = LazyLock::new(|| json!({ "type": "object" }));

    #[derive(Deserialize)]
    struct AddInput {
        a: i64,
        b: i64,
    }

    struct AddTool;

    impl Tool for AddTool {
        type Input = AddInput;

        fn name(&self) -> &str {
            "add"
        }

        fn description(&self) -> &str {
            "Adds two integers"
        }

        fn parameter_schema(&self) -> &Value {
            &ADD_SCHEMA
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok((input.a + input.b).to_string()))
        }
    }

    enum Misbehavior {
        Fail,
        PanicEarly,
        PanicLate,
        Hang,
    }

    struct BadTool(Misbehavior);

    impl Tool for BadTool {
        type Input = Value;

        fn name(&self) -> &str {
            "bad"
        }

        fn description(&self) -> &str {
            "Misbehaves"
        }

        fn parameter_schema(&self) -> &Value {
            &ANY_SCHEMA
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            let fut: Pin<Box<dyn Future<Output = ToolResult> + Send>> =
                match self.0 {
                    Misbehavior::Fail => Box::pin(ready(Err(
                        Error::execution_error().with_reason("backend down"),
                    ))),
                    Misbehavior::PanicEarly => panic!("refusing to start"),
                    Misbehavior::PanicLate => Box::pin(async {
                        panic!("lost my way");
                    }),
                    Misbehavior::Hang => Box::pin(pending()),
                };
            fut
        }
    }

    fn decision(action: &str, input: Value) -> Decision {
        Decision {
            thought: "t".to_owned(),
            action: Action::Tool(action.to_owned()),
            action_input: input.as_object().cloned(),
            answer: None,
        }
    }

    fn dispatcher_with(tool: impl Tool, timeout: Option<Duration>) -> Dispatcher {
        let registry = Arc::new(Registry::new());
        registry.register(tool);
        Dispatcher::new(registry, timeout)
    }

    #[tokio::test]
    async fn test_success() {
        let dispatcher = dispatcher_with(AddTool, None);
        let obs = dispatcher
            .dispatch(&decision("add", json!({ "a": 2, "b": 3 })))
            .await;
        assert_eq!(obs, Observation::success("add", "5"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dispatcher = dispatcher_with(AddTool, None);
        let obs = dispatcher
            .dispatch(&decision("subtract", json!({ "a": 2, "b": 3 })))
            .await;
        assert_eq!(obs.source_action, "subtract");
        assert_eq!(
            obs.outcome,
            Outcome::Failure("unknown tool `subtract`".to_owned())
        );
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let dispatcher = dispatcher_with(AddTool, None);
        let obs = dispatcher.dispatch(&decision("add", json!({ "a": 2 }))).await;
        assert!(!obs.is_success());
        assert!(obs.content().starts_with("Invalid input"));
        assert!(obs.content().contains("missing field `b`"));

        // Absent input is an empty object.
        let obs = dispatcher.dispatch(&decision("add", Value::Null)).await;
        assert!(obs.content().contains("missing field `a`"));
    }

    #[tokio::test]
    async fn test_tool_error() {
        let dispatcher = dispatcher_with(BadTool(Misbehavior::Fail), None);
        let obs = dispatcher.dispatch(&decision("bad", json!({}))).await;
        assert_eq!(
            obs,
            Observation::failure("bad", "Execution error: backend down")
        );
    }

    #[tokio::test]
    async fn test_panics_are_contained() {
        let dispatcher = dispatcher_with(BadTool(Misbehavior::PanicEarly), None);
        let obs = dispatcher.dispatch(&decision("bad", json!({}))).await;
        assert_eq!(obs.content(), "Panicked: refusing to start");

        let dispatcher = dispatcher_with(BadTool(Misbehavior::PanicLate), None);
        let obs = dispatcher.dispatch(&decision("bad", json!({}))).await;
        assert_eq!(obs.content(), "Panicked: lost my way");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let dispatcher = dispatcher_with(
            BadTool(Misbehavior::Hang),
            Some(Duration::from_secs(30)),
        );
        let obs = dispatcher.dispatch(&decision("bad", json!({}))).await;
        assert!(!obs.is_success());
        assert_eq!(obs.content(), "Timed out: no result after 30000 ms");
    }

    #[tokio::test]
    async fn test_terminal_decision_is_not_a_tool() {
        let dispatcher = dispatcher_with(AddTool, None);
        let mut answer = decision("add", json!({}));
        answer.action = Action::Answer;
        let obs = dispatcher.dispatch(&answer).await;
        assert_eq!(obs, Observation::failure("ANSWER", "`ANSWER` is not a tool"));
    }
}
