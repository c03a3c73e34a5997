mod builder;
mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use react_agent_model::{GenerateRequest, ModelProviderError, Turn};
use thiserror::Error;
use tracing::Instrument;

use crate::context::build_context;
use crate::decision::{Action, Decision};
use crate::event::{Emitter, StepEvent, StepSink};
use crate::model_client::ModelClient;
use crate::prompt::render_system_prompt;
use crate::tool::{Dispatcher, Registry};
pub use builder::{AgentBuilder, DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_TIMEOUT};
use state::{RunState, Stage, Terminal};

const ABORT_MESSAGE: &str =
    "Sorry, I couldn't solve your problem with the available tools.";

/// Errors that end a run without a result.
#[derive(Debug, Error)]
pub enum RunError {
    /// The model provider failed or timed out. Never retried.
    #[error("model provider failed: {0}")]
    Model(Box<dyn ModelProviderError>),
}

/// An agent that solves tasks by alternating between asking the model for
/// a decision and executing the tool it picked.
///
/// The agent holds no per-run state, so one instance (or its clones) can
/// serve any number of concurrent runs. Each call to [`Agent::run`] is an
/// independent sequential loop:
///
/// 1. Ask the model, with the task and every observation so far.
/// 2. Parse its reply into a [`Decision`].
/// 3. Stop on `ANSWER` or `ABORT`, otherwise run the tool and record the
///    observation.
///
/// The loop also stops when the iteration cap is reached or the reply
/// cannot be parsed.
#[derive(Clone)]
pub struct Agent {
    model_client: ModelClient,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    max_iterations: usize,
    instructions: Option<Arc<str>>,
}

impl Agent {
    /// Returns the registry tools are resolved from.
    #[inline]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the maximum number of model calls per run.
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Renders the system prompt for the tools registered right now.
    pub fn system_prompt(&self) -> String {
        render_system_prompt(
            self.instructions.as_deref(),
            &self.registry.render_catalog(),
        )
    }

    /// Solves `user_prompt` and returns the final text.
    ///
    /// Terminal outcomes (answer, abort, unparsable decision, iteration
    /// cap) all produce `Ok` with a message for the user. Only a model
    /// failure produces an error.
    ///
    /// Progress is reported to `sink`, if given. Whatever the sink does
    /// has no effect on the run.
    pub async fn run(
        &self,
        user_prompt: &str,
        sink: Option<&dyn StepSink>,
    ) -> Result<String, RunError> {
        let emitter = Emitter::new(sink);
        self.run_loop(user_prompt, emitter)
            .instrument(debug_span!("react run"))
            .await
    }

    async fn run_loop(
        &self,
        user_prompt: &str,
        emitter: Emitter<'_>,
    ) -> Result<String, RunError> {
        // Tools discovered after this point are still callable, but the
        // model only learns about them in the next run.
        let system_prompt = self.system_prompt();
        let mut state = RunState::default();
        let mut stage = Stage::Thinking;

        loop {
            stage = match stage {
                Stage::Thinking => {
                    if state.iteration >= self.max_iterations {
                        Stage::Terminal(Terminal::Limit)
                    } else {
                        state.iteration += 1;
                        debug!("iteration {}", state.iteration);
                        self.think(user_prompt, &system_prompt, &mut state, emitter)
                            .await?
                    }
                }
                Stage::Acting(decision) => {
                    self.act(&decision, &mut state, emitter).await;
                    Stage::Thinking
                }
                Stage::Terminal(terminal) => {
                    return Ok(self.finish(terminal, &state, emitter));
                }
            };
        }
    }

    async fn think(
        &self,
        user_prompt: &str,
        system_prompt: &str,
        state: &mut RunState,
        emitter: Emitter<'_>,
    ) -> Result<Stage, RunError> {
        let req = GenerateRequest {
            system_prompt: system_prompt.to_owned(),
            user_message: build_context(user_prompt, &state.observations),
            history: state.transcript.clone(),
        };

        let raw = match self.model_client.generate(&req).await {
            Ok(raw) => raw,
            Err(err) => {
                emitter.emit(StepEvent::Error {
                    content: format!("model provider failed: {err}"),
                });
                return Err(RunError::Model(err));
            }
        };
        trace!("model replied: {raw}");

        let decision = match Decision::parse(&raw) {
            Ok(decision) => decision,
            Err(err) => {
                warn!("invalid decision: {err}");
                return Ok(Stage::Terminal(Terminal::Error(err)));
            }
        };
        state.transcript.push(Turn::assistant(raw));
        emitter.emit(StepEvent::Thought {
            content: decision.thought.clone(),
            chosen_action: decision.action.to_string(),
            action_input: decision.action_input.clone(),
        });

        Ok(match decision.action {
            Action::Answer => Stage::Terminal(Terminal::Answer(
                decision.answer.unwrap_or_default(),
            )),
            Action::Abort => Stage::Terminal(Terminal::Abort),
            Action::Tool(_) => Stage::Acting(decision),
        })
    }

    async fn act(
        &self,
        decision: &Decision,
        state: &mut RunState,
        emitter: Emitter<'_>,
    ) {
        emitter.emit(StepEvent::ToolStart {
            tool: decision.action.to_string(),
            input: decision.action_input.clone().unwrap_or_default(),
        });

        let observation = self
            .dispatcher
            .dispatch(decision)
            .instrument(debug_span!("tool dispatch", tool = %decision.action))
            .await;

        let content = observation.content().to_owned();
        emitter.emit(if observation.is_success() {
            StepEvent::Observation { content }
        } else {
            StepEvent::Error { content }
        });
        state.record(observation);
    }

    fn finish(
        &self,
        terminal: Terminal,
        state: &RunState,
        emitter: Emitter<'_>,
    ) -> String {
        debug!(
            "run finished after {} iteration(s): {terminal:?}",
            state.iteration
        );
        let text = match terminal {
            Terminal::Answer(answer) => answer,
            Terminal::Abort => ABORT_MESSAGE.to_owned(),
            Terminal::Error(err) => {
                let text = format!("Failed to process the agent decision: {err}");
                emitter.emit(StepEvent::Error {
                    content: text.clone(),
                });
                return text;
            }
            Terminal::Limit => {
                warn!("reached the limit of {} iterations", self.max_iterations);
                format!(
                    "ABORT: reached the limit of {} iterations without solving the task.",
                    self.max_iterations
                )
            }
        };
        emitter.emit(StepEvent::Final {
            content: text.clone(),
        });
        text
    }
}
