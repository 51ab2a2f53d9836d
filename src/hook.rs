use serde::Serialize;

use crate::{BooleanEvaluationResponse, FlagType, VariantEvaluationResponse};

/// Data passed to [`EvaluationHook::before`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeforeEvaluation {
    /// Key of the flag about to be evaluated.
    pub flag_key: String,
}

/// Data passed to [`EvaluationHook::after`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AfterEvaluation {
    /// Key of the evaluated flag.
    pub flag_key: String,
    /// Type of the evaluated flag.
    pub flag_type: FlagType,
    /// Variant key for variant flags, `"true"` or `"false"` for boolean flags.
    pub value: String,
    /// Engine-defined reason code.
    pub reason: String,
}

impl From<&VariantEvaluationResponse> for AfterEvaluation {
    fn from(response: &VariantEvaluationResponse) -> Self {
        AfterEvaluation {
            flag_key: response.flag_key.clone(),
            flag_type: FlagType::Variant,
            value: response.variant_key.clone(),
            reason: response.reason.clone(),
        }
    }
}

impl From<&BooleanEvaluationResponse> for AfterEvaluation {
    fn from(response: &BooleanEvaluationResponse) -> Self {
        AfterEvaluation {
            flag_key: response.flag_key.clone(),
            flag_type: FlagType::Boolean,
            value: response.enabled.to_string(),
            reason: response.reason.clone(),
        }
    }
}

/// Observer of flag evaluations, e.g. for metrics or tracing.
///
/// `before` is called once per evaluated flag, after the request passed validation. `after` is
/// called once per successfully evaluated flag. In a batch, both are called per item, in request
/// order; items the engine could not evaluate get no `after` call.
///
/// Register hooks with [`ClientOptions::hook`](crate::ClientOptions::hook).
pub trait EvaluationHook: Send + Sync {
    /// Called before a flag is evaluated.
    fn before(&self, _data: &BeforeEvaluation) {}

    /// Called after a flag was evaluated.
    fn after(&self, _data: &AfterEvaluation) {}
}

impl std::fmt::Debug for dyn EvaluationHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EvaluationHook")
    }
}
