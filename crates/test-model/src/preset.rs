use serde::{Deserialize, Serialize};

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// The raw text the model replies with.
    pub text: String,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified text.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            failures: None,
        }
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}

/// A whole conversation script, loadable from JSON.
///
/// ```json
/// {
///   "steps": [{ "text": "{\"thought\": \"...\", \"action\": \"ANSWER\", \"answer\": \"hi\"}" }],
///   "fallback": { "text": "..." }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script {
    /// Responses for each assistant step, in order.
    #[serde(default)]
    pub steps: Vec<PresetResponse>,
    /// The response used once `steps` are exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<PresetResponse>,
}
