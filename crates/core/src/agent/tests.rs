use std::future::ready;
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

use react_agent_model::{ErrorKind, Role};
use react_agent_test_model::{PresetResponse, TestModelProvider};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::tool::ToolResult;
use crate::{AgentBuilder, RunError, SinkError, StepEvent, Tool};

static ADD_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
        "required": ["a", "b"]
    })
});

#[derive(Deserialize)]
struct AddInput {
    a: f64,
    b: f64,
}

struct AddTool;

impl Tool for AddTool {
    type Input = AddInput;

    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Adds two numbers"
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

fn answer(text: &str) -> PresetResponse {
    PresetResponse::with_text(
        json!({ "thought": "I know it", "action": "ANSWER", "answer": text })
            .to_string(),
    )
}

fn call(tool: &str, input: Value) -> PresetResponse {
    PresetResponse::with_text(format!(
        "Let me use a tool.\n```json\n{}\n```",
        json!({ "thought": format!("use {tool}"), "action": tool, "action_input": input })
    ))
}

#[derive(Default)]
struct Recorder(Mutex<Vec<StepEvent>>);

impl Recorder {
    fn sink(&self) -> impl Fn(&StepEvent) -> Result<(), SinkError> + Send + Sync {
        |event: &StepEvent| {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|event| match event {
                StepEvent::Thought { .. } => "thought",
                StepEvent::ToolStart { .. } => "tool_start",
                StepEvent::Observation { .. } => "observation",
                StepEvent::Final { .. } => "final",
                StepEvent::Error { .. } => "error",
            })
            .collect()
    }
}

#[tokio::test]
async fn test_direct_answer() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(answer("Hello!"));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(AddTool)
        .build();
    let result = agent.run("Say hello", None).await.unwrap();
    assert_eq!(result, "Hello!");
    assert_eq!(model_provider.calls(), 1);

    let req = &model_provider.requests()[0];
    assert_eq!(req.user_message, "Say hello");
    assert!(req.history.is_empty());
    assert!(req.system_prompt.contains("Tool: add"));
}

#[tokio::test]
async fn test_tool_then_answer() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(call("add", json!({ "a": 2, "b": 3 })));
    model_provider.add_response_step(answer("2 + 3 = 5"));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(AddTool)
        .build();
    let recorder = Recorder::default();
    let sink = recorder.sink();
    let result = agent.run("What is 2+3?", Some(&sink)).await.unwrap();
    assert_eq!(result, "2 + 3 = 5");
    assert_eq!(model_provider.calls(), 2);

    let req = &model_provider.requests()[1];
    assert_eq!(
        req.user_message,
        "ORIGINAL TASK: What is 2+3?\n\n\
         OBSERVATIONS FROM PREVIOUS ACTIONS:\n\
         Result of tool 'add': 5"
    );
    assert_eq!(req.history.len(), 2);
    assert_eq!(req.history[0].role, Role::Assistant);
    assert!(req.history[0].content.contains("\"action\":\"add\""));
    assert_eq!(req.history[1].role, Role::User);
    assert_eq!(req.history[1].content, "OBSERVATION: Result of tool 'add': 5");

    assert_eq!(
        recorder.kinds(),
        ["thought", "tool_start", "observation", "thought", "final"]
    );
    let events = recorder.0.lock().unwrap();
    assert_eq!(
        events[1],
        StepEvent::ToolStart {
            tool: "add".to_owned(),
            input: json!({ "a": 2, "b": 3 }).as_object().cloned().unwrap(),
        }
    );
    assert_eq!(
        events[2],
        StepEvent::Observation {
            content: "5".to_owned()
        }
    );
}

#[tokio::test]
async fn test_unknown_tool_hits_limit() {
    let mut model_provider = TestModelProvider::default();
    model_provider.set_fallback(call("subtract", json!({ "a": 5, "b": 3 })));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(AddTool)
        .with_max_iterations(3)
        .build();
    let recorder = Recorder::default();
    let sink = recorder.sink();
    let result = agent.run("What is 5-3?", Some(&sink)).await.unwrap();
    assert_eq!(
        result,
        "ABORT: reached the limit of 3 iterations without solving the task."
    );
    assert_eq!(model_provider.calls(), 3);

    let last = model_provider.requests().pop().unwrap();
    assert_eq!(
        last.user_message
            .matches("Error executing tool 'subtract': unknown tool `subtract`")
            .count(),
        2
    );
    assert_eq!(recorder.kinds().last(), Some(&"final"));
    assert_eq!(
        recorder.kinds().iter().filter(|kind| **kind == "error").count(),
        3
    );
}

#[tokio::test]
async fn test_abort() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(PresetResponse::with_text(
        r#"{"thought": "no tool can do this", "action": "ABORT"}"#,
    ));

    let agent = AgentBuilder::with_model_provider(model_provider).build();
    let result = agent.run("Book me a flight", None).await.unwrap();
    assert_eq!(
        result,
        "Sorry, I couldn't solve your problem with the available tools."
    );
}

#[tokio::test]
async fn test_unparsable_decision() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(PresetResponse::with_text("The answer is 42."));

    let agent = AgentBuilder::with_model_provider(model_provider.clone()).build();
    let recorder = Recorder::default();
    let sink = recorder.sink();
    let result = agent.run("?", Some(&sink)).await.unwrap();
    assert!(result.starts_with("Failed to process the agent decision:"));
    assert!(result.contains("no decision object found"));
    assert_eq!(model_provider.calls(), 1);
    assert_eq!(recorder.kinds(), ["error"]);
}

#[tokio::test]
async fn test_answer_without_text() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(PresetResponse::with_text(
        r#"{"thought": "done", "action": "ANSWER"}"#,
    ));

    let agent = AgentBuilder::with_model_provider(model_provider).build();
    let result = agent.run("?", None).await.unwrap();
    assert_eq!(
        result,
        "Failed to process the agent decision: decision is missing required field `answer`"
    );
}

#[tokio::test]
async fn test_model_error_is_fatal() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(call("add", json!({ "a": 1, "b": 1 })));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(AddTool)
        .build();
    let recorder = Recorder::default();
    let sink = recorder.sink();
    // The second step is missing from the script.
    let err = agent.run("1+1", Some(&sink)).await.unwrap_err();
    let RunError::Model(err) = err;
    assert_eq!(err.kind(), ErrorKind::Other);
    assert_eq!(model_provider.calls(), 2);
    assert_eq!(recorder.kinds().last(), Some(&"error"));
    assert_eq!(recorder.kinds().iter().filter(|k| **k == "error").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_model_timeout() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(answer("too late"));
    model_provider.set_delay(Duration::from_secs(600));

    let agent = AgentBuilder::with_model_provider(model_provider)
        .with_model_timeout(Some(Duration::from_secs(60)))
        .build();
    let RunError::Model(err) = agent.run("?", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_zero_iterations() {
    let model_provider = TestModelProvider::default();
    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_max_iterations(0)
        .build();
    let result = agent.run("anything", None).await.unwrap();
    assert_eq!(
        result,
        "ABORT: reached the limit of 0 iterations without solving the task."
    );
    assert_eq!(model_provider.calls(), 0);
}

#[tokio::test]
async fn test_misbehaving_sink_changes_nothing() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(call("add", json!({ "a": 2, "b": 3 })));
    model_provider.add_response_step(answer("5"));
    let agent = AgentBuilder::with_model_provider(model_provider)
        .with_tool(AddTool)
        .build();

    let failing = |_: &StepEvent| -> Result<(), SinkError> { Err("closed".into()) };
    let panicking = |event: &StepEvent| -> Result<(), SinkError> {
        if matches!(event, StepEvent::ToolStart { .. }) {
            panic!("sink exploded");
        }
        Ok(())
    };

    let plain = agent.run("What is 2+3?", None).await.unwrap();
    let with_failing = agent.run("What is 2+3?", Some(&failing)).await.unwrap();
    let with_panicking = agent.run("What is 2+3?", Some(&panicking)).await.unwrap();
    assert_eq!(plain, "5");
    assert_eq!(with_failing, plain);
    assert_eq!(with_panicking, plain);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_are_isolated() {
    let mut model_provider = TestModelProvider::default();
    model_provider.add_response_step(call("add", json!({ "a": 20, "b": 22 })));
    model_provider.add_response_step(answer("42"));
    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(AddTool)
        .build();

    let handles = (0..8)
        .map(|i| {
            let agent = agent.clone();
            tokio::spawn(async move { agent.run(&format!("task {i}"), None).await })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "42");
    }
    assert_eq!(model_provider.calls(), 16);

    for req in model_provider.requests() {
        assert!(req.history.len() <= 2);
        assert!(req.user_message.matches("Result of tool").count() <= 1);
    }
}
