//! In-process engine used by unit tests.
//!
//! Tracks every buffer and engine handle it hands out and panics when one is released twice or
//! was never issued.
use std::{
    collections::HashSet,
    ffi::{c_char, c_void, CStr, CString},
    sync::Mutex,
};

use serde_json::{json, Value};

use super::EngineLibrary;

/// A call into the engine, with its JSON argument where there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Initialize(String),
    Variant(String),
    Boolean(String),
    Batch(String),
    ListFlags,
    Snapshot,
    UpdateAuthentication(String),
}

type Handler = Box<dyn Fn(&Call) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Stats {
    pub strings_allocated: usize,
    pub strings_destroyed: usize,
    pub live_strings: usize,
    pub engines_created: usize,
    pub engines_destroyed: usize,
    pub live_engines: usize,
}

#[derive(Default)]
struct State {
    strings: HashSet<usize>,
    engines: HashSet<usize>,
    stats: Stats,
    calls: Vec<Call>,
}

pub(crate) struct MockLibrary {
    handler: Handler,
    fail_initialize: bool,
    update_authentication: bool,
    state: Mutex<State>,
}

impl MockLibrary {
    /// Engine answering with the canned responses of [`respond`].
    pub(crate) fn new() -> MockLibrary {
        MockLibrary::with_handler(respond)
    }

    /// Engine answering every call with `handler`. `None` produces a null buffer.
    pub(crate) fn with_handler(
        handler: impl Fn(&Call) -> Option<String> + Send + Sync + 'static,
    ) -> MockLibrary {
        MockLibrary {
            handler: Box::new(handler),
            fail_initialize: false,
            update_authentication: true,
            state: Mutex::default(),
        }
    }

    /// `initialize_engine` returns null.
    pub(crate) fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    /// Behave like an engine that does not export `update_authentication`.
    pub(crate) fn without_update_authentication(mut self) -> Self {
        self.update_authentication = false;
        self
    }

    pub(crate) fn stats(&self) -> Stats {
        self.state.lock().unwrap().stats
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn allocate(&self, s: &str) -> *mut c_char {
        self.allocate_bytes(s.as_bytes())
    }

    pub(crate) fn allocate_bytes(&self, bytes: &[u8]) -> *mut c_char {
        let ptr = CString::new(bytes).unwrap().into_raw();
        let mut state = self.state.lock().unwrap();
        state.strings.insert(ptr as usize);
        state.stats.strings_allocated += 1;
        state.stats.live_strings += 1;
        ptr
    }

    fn call(&self, call: Call) -> *mut c_char {
        let response = (self.handler)(&call);
        self.state.lock().unwrap().calls.push(call);
        match response {
            Some(response) => self.allocate(&response),
            None => std::ptr::null_mut(),
        }
    }
}

fn arg(s: &CStr) -> String {
    s.to_str().unwrap().to_owned()
}

unsafe impl EngineLibrary for MockLibrary {
    unsafe fn initialize_engine(&self, opts: &CStr) -> *mut c_void {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Initialize(arg(opts)));
        if self.fail_initialize {
            return std::ptr::null_mut();
        }
        let engine = Box::into_raw(Box::new(0u8)) as *mut c_void;
        state.engines.insert(engine as usize);
        state.stats.engines_created += 1;
        state.stats.live_engines += 1;
        engine
    }

    unsafe fn destroy_engine(&self, engine: *mut c_void) {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.engines.remove(&(engine as usize)),
            "destroy_engine called with unknown or already destroyed handle"
        );
        state.stats.engines_destroyed += 1;
        state.stats.live_engines -= 1;
        drop(Box::from_raw(engine as *mut u8));
    }

    unsafe fn evaluate_variant(&self, _engine: *mut c_void, request: &CStr) -> *mut c_char {
        self.call(Call::Variant(arg(request)))
    }

    unsafe fn evaluate_boolean(&self, _engine: *mut c_void, request: &CStr) -> *mut c_char {
        self.call(Call::Boolean(arg(request)))
    }

    unsafe fn evaluate_batch(&self, _engine: *mut c_void, requests: &CStr) -> *mut c_char {
        self.call(Call::Batch(arg(requests)))
    }

    unsafe fn list_flags(&self, _engine: *mut c_void) -> *mut c_char {
        self.call(Call::ListFlags)
    }

    unsafe fn get_snapshot(&self, _engine: *mut c_void) -> *mut c_char {
        self.call(Call::Snapshot)
    }

    unsafe fn update_authentication(
        &self,
        _engine: *mut c_void,
        authentication: &CStr,
    ) -> Option<*mut c_char> {
        self.update_authentication
            .then(|| self.call(Call::UpdateAuthentication(arg(authentication))))
    }

    unsafe fn destroy_string(&self, ptr: *mut c_char) {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.strings.remove(&(ptr as usize)),
            "destroy_string called with unknown or already destroyed buffer"
        );
        state.stats.strings_destroyed += 1;
        state.stats.live_strings -= 1;
        drop(CString::from_raw(ptr));
    }
}

pub(crate) const TIMESTAMP: &str = "2024-05-01T12:00:00Z";

pub(crate) fn success(result: Value) -> String {
    json!({"status": "success", "result": result}).to_string()
}

pub(crate) fn failure(message: &str) -> String {
    json!({"status": "failure", "result": null, "error_message": message}).to_string()
}

fn not_found(request: &Value) -> String {
    format!(
        "invalid request: failed to get flag information {}/{}",
        request["namespace_key"].as_str().unwrap_or_default(),
        request["flag_key"].as_str().unwrap_or_default()
    )
}

fn variant(request: &Value) -> Value {
    let matched = request["context"]["fizz"] == "buzz";
    json!({
        "match": matched,
        "segment_keys": if matched { json!(["segment1"]) } else { json!([]) },
        "reason": if matched { "MATCH_EVALUATION_REASON" } else { "UNKNOWN_EVALUATION_REASON" },
        "flag_key": request["flag_key"],
        "variant_key": if matched { "variant1" } else { "" },
        "variant_attachment": "",
        "request_duration_millis": 0.1,
        "timestamp": TIMESTAMP,
    })
}

fn boolean(request: &Value) -> Value {
    json!({
        "enabled": true,
        "flag_key": request["flag_key"],
        "reason": "DEFAULT_EVALUATION_REASON",
        "segment_keys": [],
        "request_duration_millis": 0.1,
        "timestamp": TIMESTAMP,
    })
}

/// Canned engine behavior: `flag1` is a variant flag matching `{"fizz": "buzz"}`,
/// `flag_boolean` is an enabled boolean flag, and every other flag is missing.
pub(crate) fn respond(call: &Call) -> Option<String> {
    let response = match call {
        Call::Initialize(_) => return None,
        Call::Variant(request) => {
            let request: Value = serde_json::from_str(request).unwrap();
            match request["flag_key"].as_str() {
                Some("flag1") => success(variant(&request)),
                _ => failure(&not_found(&request)),
            }
        }
        Call::Boolean(request) => {
            let request: Value = serde_json::from_str(request).unwrap();
            match request["flag_key"].as_str() {
                Some("flag_boolean") => success(boolean(&request)),
                _ => failure(&not_found(&request)),
            }
        }
        Call::Batch(requests) => {
            let requests: Vec<Value> = serde_json::from_str(requests).unwrap();
            let responses: Vec<Value> = requests
                .iter()
                .map(|request| match request["flag_key"].as_str() {
                    Some("flag1") => json!({
                        "type": "VARIANT_EVALUATION_RESPONSE_TYPE",
                        "variant_evaluation_response": variant(request),
                    }),
                    Some("flag_boolean") => json!({
                        "type": "BOOLEAN_EVALUATION_RESPONSE_TYPE",
                        "boolean_evaluation_response": boolean(request),
                    }),
                    _ => json!({
                        "type": "ERROR_EVALUATION_RESPONSE_TYPE",
                        "error_evaluation_response": {
                            "flag_key": request["flag_key"],
                            "namespace_key": request["namespace_key"],
                            "reason": "NOT_FOUND_ERROR_EVALUATION_REASON",
                        },
                    }),
                })
                .collect();
            success(json!({"responses": responses, "request_duration_millis": 0.3}))
        }
        Call::ListFlags => success(json!([
            {"key": "flag1", "enabled": true, "type": "VARIANT_FLAG_TYPE", "description": "flag description"},
            {"key": "flag_boolean", "enabled": true, "type": "BOOLEAN_FLAG_TYPE"},
        ])),
        // base64 of `{"namespace":{"key":"default"}}`
        Call::Snapshot => "eyJuYW1lc3BhY2UiOnsia2V5IjoiZGVmYXVsdCJ9fQ==".to_owned(),
        Call::UpdateAuthentication(_) => json!({"status": "success"}).to_string(),
    };
    Some(response)
}
