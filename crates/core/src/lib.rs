//! Core logic of the reasoning/action/observation loop: tool registry and
//! dispatch, decision parsing, context building and the iteration
//! controller that ties them together.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod context;
pub mod decision;
pub mod event;
mod model_client;
mod prompt;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_TIMEOUT, RunError,
};
pub use context::{Observation, Outcome, build_context};
pub use decision::{Action, Decision, DecisionError};
pub use event::{SinkError, StepEvent, StepSink};
pub use tool::{Dispatcher, Registry, Tool, ToolDescriptor, ToolSource};
