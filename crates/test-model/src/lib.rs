//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use react_agent_model::{
    ErrorKind, GenerateRequest, ModelProvider, ModelProviderError, Role,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Bookkeeping shared by every clone of one provider.
#[derive(Default)]
struct Stats {
    calls: AtomicUsize,
    attempts: Mutex<HashMap<usize, u64>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The response is selected
/// by the number of assistant turns in the request history, so the first
/// request of a run gets the first step, and so on. If there are no enough
/// steps in the script and no fallback is set, an error will be returned.
///
/// # Note
///
/// This type is not optimized for production use, every request is copied
/// for later inspection. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    steps: Vec<PresetResponse>,
    fallback: Option<PresetResponse>,
    delay: Option<Duration>,
    stats: Arc<Stats>,
}

impl TestModelProvider {
    /// Creates a provider from a whole script.
    #[inline]
    pub fn from_script(script: Script) -> Self {
        Self {
            steps: script.steps,
            fallback: script.fallback,
            ..Default::default()
        }
    }

    #[inline]
    pub fn add_response_step(&mut self, preset: PresetResponse) {
        self.steps.push(preset);
    }

    /// Sets the response used for every step beyond the script.
    #[inline]
    pub fn set_fallback(&mut self, preset: PresetResponse) {
        self.fallback = Some(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many times `generate` has been called.
    #[inline]
    pub fn calls(&self) -> usize {
        self.stats.calls.load(Ordering::SeqCst)
    }

    /// Returns copies of all requests received so far.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        lock(&self.stats.requests).clone()
    }

    fn respond(&self, step_idx: usize) -> Result<String, Error> {
        let Some(preset) = self.steps.get(step_idx).or(self.fallback.as_ref())
        else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        if let Some(failures) = preset.failures {
            let mut attempts = lock(&self.stats.attempts);
            let attempt = attempts.entry(step_idx).or_default();
            *attempt += 1;
            if failures == 0 || *attempt <= failures {
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::Other,
                });
            }
        }

        Ok(preset.text.clone())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn generate(
        &self,
        req: &GenerateRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.stats.requests).push(req.clone());

        let step_idx = req
            .history
            .iter()
            .filter(|turn| turn.role == Role::Assistant)
            .count();
        let result = self.respond(step_idx);
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        async move {
            sleep(delay).await;
            result
        }
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
