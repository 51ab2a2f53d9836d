//! Requests sent to and responses received from the engine.
use std::collections::HashMap;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use derive_more::{From, Into};
use serde::{Deserialize, Serialize};

use crate::{codec, Error, Result};

/// Evaluation context: string attributes of the entity being evaluated.
pub type Context = HashMap<String, String>;

/// One flag evaluation within a batch.
///
/// ```
/// # use flipt_client::EvaluationRequest;
/// let request = EvaluationRequest::new("flag1", "someentity").with_context([("fizz", "buzz")]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationRequest {
    /// Key of the flag to evaluate.
    pub flag_key: String,
    /// Identifier of the entity the flag is evaluated for.
    pub entity_id: String,
    /// Evaluation context.
    pub context: Context,
}

impl EvaluationRequest {
    /// Create a request with an empty context.
    pub fn new(flag_key: impl Into<String>, entity_id: impl Into<String>) -> EvaluationRequest {
        EvaluationRequest {
            flag_key: flag_key.into(),
            entity_id: entity_id.into(),
            context: Context::new(),
        }
    }

    /// Replace the evaluation context.
    pub fn with_context<K, V>(mut self, context: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.context = context
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }
}

/// Request as the engine expects it: validated and scoped to a namespace.
#[derive(Debug, Serialize)]
pub(crate) struct InternalEvaluationRequest<'a> {
    namespace_key: &'a str,
    flag_key: &'a str,
    entity_id: &'a str,
    context: &'a Context,
}

impl<'a> InternalEvaluationRequest<'a> {
    pub(crate) fn new(
        namespace_key: &'a str,
        flag_key: &'a str,
        entity_id: &'a str,
        context: &'a Context,
    ) -> Result<Self> {
        if flag_key.trim().is_empty() {
            return Err(Error::validation("flag_key cannot be empty or null"));
        }
        if entity_id.trim().is_empty() {
            return Err(Error::validation("entity_id cannot be empty or null"));
        }
        Ok(InternalEvaluationRequest {
            namespace_key,
            flag_key,
            entity_id,
            context,
        })
    }

    pub(crate) fn flag_key(&self) -> &'a str {
        self.flag_key
    }
}

/// Result of a variant flag evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantEvaluationResponse {
    /// Whether the entity matched a rule of the flag.
    #[serde(rename = "match")]
    pub matched: bool,
    /// Keys of the segments that matched.
    #[serde(default)]
    pub segment_keys: Vec<String>,
    /// Engine-defined reason code, e.g. `MATCH_EVALUATION_REASON`.
    pub reason: String,
    /// Key of the evaluated flag.
    pub flag_key: String,
    /// Key of the resolved variant. Empty when there was no match.
    #[serde(default)]
    pub variant_key: String,
    /// Attachment of the resolved variant.
    #[serde(default)]
    pub variant_attachment: String,
    /// Time the engine spent on the evaluation.
    pub request_duration_millis: f64,
    /// Time of the evaluation.
    pub timestamp: DateTime<Utc>,
}

/// Result of a boolean flag evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanEvaluationResponse {
    /// Resolved flag value.
    pub enabled: bool,
    /// Key of the evaluated flag.
    pub flag_key: String,
    /// Engine-defined reason code.
    pub reason: String,
    /// Keys of the segments that matched.
    #[serde(default)]
    pub segment_keys: Vec<String>,
    /// Time the engine spent on the evaluation.
    pub request_duration_millis: f64,
    /// Time of the evaluation.
    pub timestamp: DateTime<Utc>,
}

/// A failed evaluation within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvaluationResponse {
    /// Key of the flag that failed to evaluate.
    pub flag_key: String,
    /// Namespace the flag was looked up in.
    pub namespace_key: String,
    /// Engine-defined reason code, e.g. `NOT_FOUND_ERROR_EVALUATION_REASON`.
    pub reason: String,
}

/// Outcome of one request in a batch.
///
/// # Serialization
///
/// Serialized as an object with a `type` discriminator and one payload field:
/// ```json
/// {"type":"BOOLEAN_EVALUATION_RESPONSE_TYPE","boolean_evaluation_response":{...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EvaluationResponseWire", into = "EvaluationResponseWire")]
pub enum EvaluationResponse {
    /// The flag is a variant flag.
    Variant(VariantEvaluationResponse),
    /// The flag is a boolean flag.
    Boolean(BooleanEvaluationResponse),
    /// The flag could not be evaluated.
    Error(ErrorEvaluationResponse),
}

impl EvaluationResponse {
    /// Variant response, if this is one.
    pub fn as_variant(&self) -> Option<&VariantEvaluationResponse> {
        match self {
            EvaluationResponse::Variant(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean response, if this is one.
    pub fn as_boolean(&self) -> Option<&BooleanEvaluationResponse> {
        match self {
            EvaluationResponse::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Error response, if this is one.
    pub fn as_error(&self) -> Option<&ErrorEvaluationResponse> {
        match self {
            EvaluationResponse::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Key of the flag this response is for.
    pub fn flag_key(&self) -> &str {
        match self {
            EvaluationResponse::Variant(v) => &v.flag_key,
            EvaluationResponse::Boolean(b) => &b.flag_key,
            EvaluationResponse::Error(e) => &e.flag_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum ResponseType {
    #[serde(rename = "VARIANT_EVALUATION_RESPONSE_TYPE")]
    Variant,
    #[serde(rename = "BOOLEAN_EVALUATION_RESPONSE_TYPE")]
    Boolean,
    #[serde(rename = "ERROR_EVALUATION_RESPONSE_TYPE")]
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
struct EvaluationResponseWire {
    #[serde(rename = "type")]
    response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    variant_evaluation_response: Option<VariantEvaluationResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    boolean_evaluation_response: Option<BooleanEvaluationResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_evaluation_response: Option<ErrorEvaluationResponse>,
}

impl TryFrom<EvaluationResponseWire> for EvaluationResponse {
    type Error = String;

    fn try_from(wire: EvaluationResponseWire) -> std::result::Result<Self, String> {
        let response = match wire.response_type {
            ResponseType::Variant => wire
                .variant_evaluation_response
                .map(EvaluationResponse::Variant),
            ResponseType::Boolean => wire
                .boolean_evaluation_response
                .map(EvaluationResponse::Boolean),
            ResponseType::Error => wire.error_evaluation_response.map(EvaluationResponse::Error),
        };
        response.ok_or_else(|| format!("missing payload for {:?} response", wire.response_type))
    }
}

impl From<EvaluationResponse> for EvaluationResponseWire {
    fn from(value: EvaluationResponse) -> Self {
        let mut wire = EvaluationResponseWire {
            response_type: ResponseType::Error,
            variant_evaluation_response: None,
            boolean_evaluation_response: None,
            error_evaluation_response: None,
        };
        match value {
            EvaluationResponse::Variant(v) => {
                wire.response_type = ResponseType::Variant;
                wire.variant_evaluation_response = Some(v);
            }
            EvaluationResponse::Boolean(b) => {
                wire.response_type = ResponseType::Boolean;
                wire.boolean_evaluation_response = Some(b);
            }
            EvaluationResponse::Error(e) => {
                wire.error_evaluation_response = Some(e);
            }
        }
        wire
    }
}

/// Result of a batch evaluation. `responses` are in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvaluationResponse {
    /// One response per request.
    pub responses: Vec<EvaluationResponse>,
    /// Time the engine spent on the whole batch.
    pub request_duration_millis: f64,
}

/// Type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagType {
    /// Flag resolves to one of several named variants.
    #[serde(rename = "VARIANT_FLAG_TYPE")]
    Variant,
    /// Flag resolves to `true` or `false`.
    #[serde(rename = "BOOLEAN_FLAG_TYPE")]
    Boolean,
}

/// A flag known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Flag key.
    pub key: String,
    /// Whether the flag is enabled.
    pub enabled: bool,
    /// Flag type.
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Point-in-time copy of the engine state, encoded as base64 JSON.
///
/// Obtained from [`FliptClient::get_snapshot`](crate::FliptClient::get_snapshot) and accepted by
/// [`ClientOptions::snapshot`](crate::ClientOptions::snapshot) to start a client without a
/// reachable server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    /// The encoded snapshot.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the snapshot into its JSON document. The document layout is owned by the engine.
    pub fn decode(&self) -> Result<serde_json::Value> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.0.trim())
            .map_err(|err| Error::InvalidSnapshot(err.to_string()))?;
        codec::decode_bytes(&bytes)
            .map_err(|_| Error::InvalidSnapshot("snapshot is not a JSON document".to_owned()))
    }
}

impl From<&str> for Snapshot {
    fn from(value: &str) -> Self {
        Snapshot(value.to_owned())
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope wrapping every enveloped engine response.
#[derive(Debug, Deserialize)]
pub(crate) struct EngineResult<T> {
    status: Status,
    result: Option<T>,
    error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Success,
    // Anything other than "success" is a failure.
    #[serde(other)]
    Failure,
}

impl<T> EngineResult<T> {
    /// Check the status, discarding any payload.
    pub(crate) fn into_status(self) -> Result<()> {
        match self.status {
            Status::Success => Ok(()),
            Status::Failure => Err(Error::Evaluation(
                self.error_message
                    .unwrap_or_else(|| "unknown error".to_owned()),
            )),
        }
    }

    /// Check the status and extract the payload.
    pub(crate) fn into_result(self) -> Result<T> {
        match self.status {
            Status::Success => self
                .result
                .ok_or_else(|| Error::Evaluation("no result returned from engine".to_owned())),
            Status::Failure => Err(Error::Evaluation(
                self.error_message
                    .unwrap_or_else(|| "unknown error".to_owned()),
            )),
        }
    }
}
