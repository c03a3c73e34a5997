//! Progress events emitted while a run is in flight.

use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

/// The error type a [`StepSink`] may return.
pub type SinkError = Box<dyn StdError + Send + Sync>;

/// A notable transition of a run.
///
/// Serializes with a `kind` discriminator, e.g.
/// `{"kind": "tool_start", "tool": "add", "input": {"a": 2}}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepEvent {
    /// A decision has been produced.
    Thought {
        /// The model's reasoning.
        content: String,
        /// The chosen action name.
        chosen_action: String,
        /// Arguments for the action, if any.
        action_input: Option<Map<String, Value>>,
    },
    /// A tool is about to be invoked.
    ToolStart {
        /// Name of the tool.
        tool: String,
        /// Arguments passed to the tool.
        input: Map<String, Value>,
    },
    /// A tool returned a result.
    Observation {
        /// The tool's output.
        content: String,
    },
    /// The run reached a final result.
    Final {
        /// The text returned to the caller.
        content: String,
    },
    /// Something went wrong, either in a tool or in the run itself.
    Error {
        /// Description of the failure.
        content: String,
    },
}

/// An observer of [`StepEvent`]s.
///
/// Sinks are invoked synchronously from the run and should return quickly.
/// A failing or panicking sink is logged and otherwise ignored; it never
/// changes the outcome of the run.
pub trait StepSink: Send + Sync {
    /// Receives one event.
    fn on_step(&self, event: &StepEvent) -> Result<(), SinkError>;
}

impl<F> StepSink for F
where
    F: Fn(&StepEvent) -> Result<(), SinkError> + Send + Sync,
{
    #[inline]
    fn on_step(&self, event: &StepEvent) -> Result<(), SinkError> {
        self(event)
    }
}

impl StepSink for mpsc::UnboundedSender<StepEvent> {
    #[inline]
    fn on_step(&self, event: &StepEvent) -> Result<(), SinkError> {
        self.send(event.clone())?;
        Ok(())
    }
}

/// Delivers events to an optional sink, isolating the run from it.
#[derive(Clone, Copy)]
pub(crate) struct Emitter<'a> {
    sink: Option<&'a dyn StepSink>,
}

impl<'a> Emitter<'a> {
    #[inline]
    pub fn new(sink: Option<&'a dyn StepSink>) -> Self {
        Self { sink }
    }

    pub fn emit(&self, event: StepEvent) {
        let Some(sink) = self.sink else {
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| sink.on_step(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("step sink failed: {err}"),
            Err(_) => warn!("step sink panicked"),
        }
    }
}
