use react_agent_model::Turn;

use crate::context::Observation;
use crate::decision::{Decision, DecisionError};

/// Where a run currently is.
#[derive(Debug)]
pub enum Stage {
    /// About to ask the model for the next decision.
    Thinking,
    /// A tool decision is waiting to be dispatched.
    Acting(Decision),
    /// The run is over.
    Terminal(Terminal),
}

/// How a run ended.
#[derive(Debug)]
pub enum Terminal {
    Answer(String),
    Abort,
    Error(DecisionError),
    Limit,
}

/// Everything a single run accumulates. Never shared between runs.
#[derive(Debug, Default)]
pub struct RunState {
    pub iteration: usize,
    pub observations: Vec<Observation>,
    pub transcript: Vec<Turn>,
}

impl RunState {
    /// Folds an observation into both the observation list and the
    /// transcript.
    pub fn record(&mut self, observation: Observation) {
        self.transcript
            .push(Turn::user(format!("OBSERVATION: {}", observation.render())));
        self.observations.push(observation);
    }
}
