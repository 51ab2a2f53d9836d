use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    engine::Engine,
    models::InternalEvaluationRequest,
    native::{EngineLibrary, NativeLibrary},
    refresher::AuthenticationRefresher,
    AfterEvaluation, Authentication, BatchEvaluationResponse, BeforeEvaluation,
    BooleanEvaluationResponse, ClientOptions, Context, Error, EvaluationHook, EvaluationRequest,
    EvaluationResponse, Flag, Result, Snapshot, VariantEvaluationResponse,
};

/// A client evaluating Flipt flags with the native engine.
///
/// The client owns one engine instance. The engine fetches flag state in the background and
/// evaluates locally, so evaluations do not make network requests. The engine is released when the
/// client is dropped or [closed](FliptClient::close).
///
/// The client may be shared between threads. Calls into the engine are serialized.
///
/// # Examples
/// ```no_run
/// # use flipt_client::{ClientOptions, Context, FliptClient};
/// let client = FliptClient::new(ClientOptions::new().url("http://localhost:8080"))?;
///
/// let context = Context::from([("fizz".to_owned(), "buzz".to_owned())]);
/// let response = client.evaluate_variant("flag1", "someentity", &context)?;
/// println!("{}", response.variant_key);
/// # Ok::<(), flipt_client::Error>(())
/// ```
pub struct FliptClient {
    // Declared before `engine` so the thread is joined before the engine is released.
    refresher: Option<AuthenticationRefresher>,
    engine: Arc<Mutex<Engine>>,
    namespace: String,
    hooks: Vec<Arc<dyn EvaluationHook>>,
}

impl FliptClient {
    /// Create a client backed by the engine library packaged for the current platform.
    ///
    /// # Errors
    ///
    /// Fails if the options are invalid, the platform is unsupported, the library cannot be
    /// loaded, the authentication provider fails, or the engine fails to initialize.
    pub fn new(options: ClientOptions) -> Result<FliptClient> {
        options.validate()?;
        let library = NativeLibrary::open_default()?;
        FliptClient::with_library(Arc::new(library), options)
    }

    /// Create a client backed by an already loaded engine library.
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use flipt_client::{ClientOptions, FliptClient, NativeLibrary};
    /// let library = Arc::new(NativeLibrary::open("/opt/flipt/libfliptengine.so")?);
    /// let client = FliptClient::with_library(library, ClientOptions::new())?;
    /// # Ok::<(), flipt_client::Error>(())
    /// ```
    pub fn with_library(
        library: Arc<dyn EngineLibrary>,
        options: ClientOptions,
    ) -> Result<FliptClient> {
        options.validate()?;

        let mut options = options;
        let lease = match &options.authentication_provider {
            Some(provider) => {
                if options.authentication.is_some() {
                    log::warn!(target: "flipt", "both authentication and authentication provider set; using provider");
                }
                let lease = provider.authenticate().inspect_err(|err| {
                    log::warn!(target: "flipt", "failed to obtain initial authentication: {:?}", err);
                })?;
                options.authentication = Some(lease.authentication);
                Some((Arc::clone(provider), lease.expires_at))
            }
            None => None,
        };

        let engine = Arc::new(Mutex::new(Engine::initialize(library, &options)?));
        let refresher = lease
            .map(|(provider, expires_at)| {
                AuthenticationRefresher::start(Arc::clone(&engine), provider, expires_at)
            })
            .transpose()?;

        Ok(FliptClient {
            refresher,
            engine,
            namespace: options.namespace,
            hooks: options.hooks,
        })
    }

    fn engine(&self) -> MutexGuard<'_, Engine> {
        // Engine calls do not leave the handle in a broken state, even if a thread panicked.
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn before(&self, flag_key: &str) {
        if self.hooks.is_empty() {
            return;
        }
        let data = BeforeEvaluation {
            flag_key: flag_key.to_owned(),
        };
        for hook in &self.hooks {
            hook.before(&data);
        }
    }

    fn after(&self, data: AfterEvaluation) {
        for hook in &self.hooks {
            hook.after(&data);
        }
    }

    /// Namespace flags are evaluated in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Evaluate a variant flag for `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without calling the engine if `flag_key` or `entity_id` is
    /// blank, and [`Error::Evaluation`] with the engine's message if evaluation fails (for
    /// example, the flag does not exist).
    pub fn evaluate_variant(
        &self,
        flag_key: &str,
        entity_id: &str,
        context: &Context,
    ) -> Result<VariantEvaluationResponse> {
        let request = InternalEvaluationRequest::new(&self.namespace, flag_key, entity_id, context)?;
        self.before(flag_key);

        let response = self.engine().evaluate_variant(&request).inspect_err(|err| {
            log::warn!(target: "flipt",
                flag_key,
                entity_id,
                context:serde;
                "error occurred while evaluating a variant flag: {:?}", err,
            );
        })?;

        log::trace!(target: "flipt",
                    flag_key,
                    entity_id,
                    context:serde,
                    variant_key = response.variant_key.as_str(),
                    reason = response.reason.as_str();
                    "evaluated a variant flag");

        if !self.hooks.is_empty() {
            self.after(AfterEvaluation::from(&response));
        }

        Ok(response)
    }

    /// Evaluate a boolean flag for `entity_id`.
    ///
    /// # Errors
    ///
    /// Same as [`FliptClient::evaluate_variant`].
    pub fn evaluate_boolean(
        &self,
        flag_key: &str,
        entity_id: &str,
        context: &Context,
    ) -> Result<BooleanEvaluationResponse> {
        let request = InternalEvaluationRequest::new(&self.namespace, flag_key, entity_id, context)?;
        self.before(flag_key);

        let response = self.engine().evaluate_boolean(&request).inspect_err(|err| {
            log::warn!(target: "flipt",
                flag_key,
                entity_id,
                context:serde;
                "error occurred while evaluating a boolean flag: {:?}", err,
            );
        })?;

        log::trace!(target: "flipt",
                    flag_key,
                    entity_id,
                    context:serde,
                    enabled = response.enabled,
                    reason = response.reason.as_str();
                    "evaluated a boolean flag");

        if !self.hooks.is_empty() {
            self.after(AfterEvaluation::from(&response));
        }

        Ok(response)
    }

    /// Evaluate several flags in one call.
    ///
    /// Responses are in request order. A flag that cannot be evaluated yields an
    /// [`EvaluationResponse::Error`](crate::EvaluationResponse::Error) entry instead of failing
    /// the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without calling the engine if `requests` is empty or any
    /// request has a blank flag key or entity id.
    pub fn evaluate_batch(&self, requests: &[EvaluationRequest]) -> Result<BatchEvaluationResponse> {
        if requests.is_empty() {
            return Err(Error::validation("requests cannot be empty"));
        }

        let requests = requests
            .iter()
            .map(|request| {
                InternalEvaluationRequest::new(
                    &self.namespace,
                    &request.flag_key,
                    &request.entity_id,
                    &request.context,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        for request in &requests {
            self.before(request.flag_key());
        }

        let response = self.engine().evaluate_batch(&requests).inspect_err(|err| {
            log::warn!(target: "flipt",
                requests = requests.len();
                "error occurred while evaluating a batch: {:?}", err,
            );
        })?;

        log::trace!(target: "flipt",
                    requests = requests.len(),
                    request_duration_millis = response.request_duration_millis;
                    "evaluated a batch");

        if !self.hooks.is_empty() {
            for response in &response.responses {
                match response {
                    EvaluationResponse::Variant(v) => self.after(AfterEvaluation::from(v)),
                    EvaluationResponse::Boolean(b) => self.after(AfterEvaluation::from(b)),
                    EvaluationResponse::Error(_) => {}
                }
            }
        }

        Ok(response)
    }

    /// List the flags in the client's namespace.
    pub fn list_flags(&self) -> Result<Vec<Flag>> {
        self.engine().list_flags().inspect_err(|err| {
            log::warn!(target: "flipt", namespace = self.namespace.as_str(); "failed to list flags: {:?}", err);
        })
    }

    /// Capture the engine's current flag state.
    ///
    /// Pass the result to [`ClientOptions::snapshot`] to start a client that can evaluate before
    /// (or without) reaching the server.
    pub fn get_snapshot(&self) -> Result<Snapshot> {
        self.engine().get_snapshot().inspect_err(|err| {
            log::warn!(target: "flipt", "failed to get snapshot: {:?}", err);
        })
    }

    /// Replace the credentials the engine uses for subsequent fetches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] if the loaded engine predates credential updates.
    pub fn update_authentication(&self, authentication: &Authentication) -> Result<()> {
        self.engine()
            .update_authentication(authentication)
            .inspect_err(|err| {
                log::warn!(target: "flipt", "failed to update authentication: {:?}", err);
            })
    }

    /// Stop the authentication refresher, if any, and release the engine. Equivalent to dropping
    /// the client.
    pub fn close(self) {
        log::debug!(target: "flipt", namespace = self.namespace.as_str(); "closing client");
    }
}

impl std::fmt::Debug for FliptClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FliptClient")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use chrono::Utc;
    use serde_json::Value;

    use super::FliptClient;
    use crate::{
        native::mock::{self, Call, MockLibrary},
        AfterEvaluation, Authentication, AuthenticationLease, BeforeEvaluation, ClientOptions,
        Context, Error, EvaluationHook, EvaluationRequest, FlagType,
    };

    #[derive(Debug, Clone, PartialEq)]
    enum HookEvent {
        Before(BeforeEvaluation),
        After(AfterEvaluation),
    }

    #[derive(Clone, Default)]
    struct RecordingHook {
        events: Arc<Mutex<Vec<HookEvent>>>,
    }

    impl RecordingHook {
        fn events(&self) -> Vec<HookEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EvaluationHook for RecordingHook {
        fn before(&self, data: &BeforeEvaluation) {
            self.events
                .lock()
                .unwrap()
                .push(HookEvent::Before(data.clone()));
        }

        fn after(&self, data: &AfterEvaluation) {
            self.events
                .lock()
                .unwrap()
                .push(HookEvent::After(data.clone()));
        }
    }

    fn before(flag_key: &str) -> HookEvent {
        HookEvent::Before(BeforeEvaluation {
            flag_key: flag_key.to_owned(),
        })
    }

    fn after(flag_key: &str, flag_type: FlagType, value: &str, reason: &str) -> HookEvent {
        HookEvent::After(AfterEvaluation {
            flag_key: flag_key.to_owned(),
            flag_type,
            value: value.to_owned(),
            reason: reason.to_owned(),
        })
    }

    fn hooked_client(library: &Arc<MockLibrary>, hook: &RecordingHook) -> FliptClient {
        FliptClient::with_library(library.clone(), ClientOptions::new().hook(hook.clone()))
            .unwrap()
    }

    fn client(library: &Arc<MockLibrary>) -> FliptClient {
        FliptClient::with_library(library.clone(), ClientOptions::new()).unwrap()
    }

    fn fizz_buzz() -> Context {
        Context::from([("fizz".to_owned(), "buzz".to_owned())])
    }

    #[test]
    fn evaluates_variant() {
        let library = Arc::new(MockLibrary::new());
        let response = client(&library)
            .evaluate_variant("flag1", "someentity", &fizz_buzz())
            .unwrap();

        assert!(response.matched);
        assert_eq!(response.variant_key, "variant1");
        assert_eq!(response.reason, "MATCH_EVALUATION_REASON");
        assert_eq!(response.segment_keys, vec!["segment1".to_owned()]);
    }

    #[test]
    fn sends_namespace_with_request() {
        let library = Arc::new(MockLibrary::new());
        let client =
            FliptClient::with_library(library.clone(), ClientOptions::new().namespace("ns"))
                .unwrap();
        assert_eq!(client.namespace(), "ns");

        let _ = client.evaluate_boolean("flag_boolean", "someentity", &Context::new());

        let Some(Call::Boolean(request)) = library.calls().last().cloned() else {
            panic!("expected evaluate_boolean call");
        };
        let request: Value = serde_json::from_str(&request).unwrap();
        assert_eq!(request["namespace_key"], "ns");
        assert_eq!(request["flag_key"], "flag_boolean");
        assert_eq!(request["entity_id"], "someentity");
    }

    #[test]
    fn evaluates_boolean() {
        let library = Arc::new(MockLibrary::new());
        let response = client(&library)
            .evaluate_boolean("flag_boolean", "someentity", &fizz_buzz())
            .unwrap();
        assert!(response.enabled);
        assert_eq!(response.flag_key, "flag_boolean");
    }

    #[test]
    fn passes_engine_failure_message_through() {
        let library = Arc::new(MockLibrary::new());
        let err = client(&library)
            .evaluate_variant("nonexistent", "someentity", &fizz_buzz())
            .unwrap_err();

        assert!(matches!(err, Error::Evaluation(_)));
        assert_eq!(
            err.to_string(),
            "invalid request: failed to get flag information default/nonexistent"
        );
    }

    #[test]
    fn validates_before_calling_engine() {
        let library = Arc::new(MockLibrary::new());
        let client = client(&library);

        let err = client
            .evaluate_variant("", "someentity", &Context::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "flag_key cannot be empty or null");

        let err = client
            .evaluate_boolean("flag_boolean", " ", &Context::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "entity_id cannot be empty or null");

        let err = client.evaluate_batch(&[]).unwrap_err();
        assert_eq!(err.to_string(), "requests cannot be empty");

        let err = client
            .evaluate_batch(&[
                EvaluationRequest::new("flag1", "someentity"),
                EvaluationRequest::new("flag_boolean", ""),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Only initialize_engine reached the engine.
        assert_eq!(library.calls().len(), 1);
        assert_eq!(library.stats().strings_allocated, 0);
    }

    #[test]
    fn batch_preserves_request_order() {
        let library = Arc::new(MockLibrary::new());
        let response = client(&library)
            .evaluate_batch(&[
                EvaluationRequest::new("flag1", "someentity").with_context([("fizz", "buzz")]),
                EvaluationRequest::new("flag_boolean", "someentity"),
                EvaluationRequest::new("notfound", "someentity"),
            ])
            .unwrap();

        assert_eq!(response.responses.len(), 3);
        assert_eq!(
            response.responses[0].as_variant().unwrap().variant_key,
            "variant1"
        );
        assert!(response.responses[1].as_boolean().unwrap().enabled);
        let error = response.responses[2].as_error().unwrap();
        assert_eq!(error.flag_key, "notfound");
        assert_eq!(error.namespace_key, "default");
        assert_eq!(error.reason, "NOT_FOUND_ERROR_EVALUATION_REASON");
    }

    #[test]
    fn lists_flags_with_types() {
        let library = Arc::new(MockLibrary::new());
        let flags = client(&library).list_flags().unwrap();

        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].key, "flag1");
        assert_eq!(flags[0].flag_type, FlagType::Variant);
        assert_eq!(flags[1].flag_type, FlagType::Boolean);
    }

    #[test]
    fn snapshot_round_trips_into_options() {
        let library = Arc::new(MockLibrary::new());
        let snapshot = client(&library).get_snapshot().unwrap();

        let _restored = FliptClient::with_library(
            library.clone(),
            ClientOptions::new().snapshot(snapshot.clone()),
        )
        .unwrap();

        let Some(Call::Initialize(opts)) = library.calls().last().cloned() else {
            panic!("expected initialize_engine call");
        };
        let opts: Value = serde_json::from_str(&opts).unwrap();
        assert_eq!(opts["snapshot"], snapshot.as_str());
    }

    #[test]
    fn updates_authentication() {
        let library = Arc::new(MockLibrary::new());
        client(&library)
            .update_authentication(&Authentication::client_token("new-token"))
            .unwrap();

        let Some(Call::UpdateAuthentication(auth)) = library.calls().last().cloned() else {
            panic!("expected update_authentication call");
        };
        assert_eq!(auth, r#"{"client_token":"new-token"}"#);
    }

    #[test]
    fn invalid_url_fails_before_loading_engine() {
        let library = Arc::new(MockLibrary::new());
        let result =
            FliptClient::with_library(library.clone(), ClientOptions::new().url("not a url"));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
        assert!(library.calls().is_empty());
    }

    #[test]
    fn releases_every_buffer_and_the_engine() {
        let library = Arc::new(MockLibrary::with_handler(|call| match call {
            Call::ListFlags => Some(mock::failure("boom")),
            other => mock::respond(other),
        }));
        let client = client(&library);

        let context = fizz_buzz();
        client.evaluate_variant("flag1", "e", &context).unwrap();
        client.evaluate_variant("nonexistent", "e", &context).unwrap_err();
        client.evaluate_boolean("flag_boolean", "e", &context).unwrap();
        client
            .evaluate_batch(&[EvaluationRequest::new("flag1", "e")])
            .unwrap();
        client.list_flags().unwrap_err();
        client.get_snapshot().unwrap();
        client.close();

        let stats = library.stats();
        assert_eq!(stats.strings_allocated, 6);
        assert_eq!(stats.strings_destroyed, 6);
        assert_eq!(stats.live_strings, 0);
        assert_eq!(stats.engines_created, 1);
        assert_eq!(stats.engines_destroyed, 1);
    }

    #[test]
    fn boolean_failure_message_is_passed_through() {
        let library = Arc::new(MockLibrary::new());
        let err = client(&library)
            .evaluate_boolean("nonexistent", "someentity", &fizz_buzz())
            .unwrap_err();

        assert!(matches!(err, Error::Evaluation(_)));
        assert_eq!(
            err.to_string(),
            "invalid request: failed to get flag information default/nonexistent"
        );
    }

    #[test]
    fn null_evaluation_response_is_reported() {
        let library = Arc::new(MockLibrary::with_handler(|_| None));
        let client = client(&library);

        let err = client
            .evaluate_variant("flag1", "someentity", &fizz_buzz())
            .unwrap_err();
        assert!(matches!(err, Error::NullResponse("evaluate_variant")));

        let err = client
            .evaluate_boolean("flag_boolean", "someentity", &fizz_buzz())
            .unwrap_err();
        assert!(matches!(err, Error::NullResponse("evaluate_boolean")));

        let err = client
            .evaluate_batch(&[EvaluationRequest::new("flag1", "someentity")])
            .unwrap_err();
        assert!(matches!(err, Error::NullResponse("evaluate_batch")));

        assert_eq!(library.stats().strings_allocated, 0);
    }

    #[test]
    fn hooks_wrap_variant_evaluation() {
        let library = Arc::new(MockLibrary::new());
        let hook = RecordingHook::default();
        hooked_client(&library, &hook)
            .evaluate_variant("flag1", "someentity", &fizz_buzz())
            .unwrap();

        assert_eq!(
            hook.events(),
            vec![
                before("flag1"),
                after(
                    "flag1",
                    FlagType::Variant,
                    "variant1",
                    "MATCH_EVALUATION_REASON"
                ),
            ]
        );
    }

    #[test]
    fn hooks_wrap_boolean_evaluation() {
        let library = Arc::new(MockLibrary::new());
        let hook = RecordingHook::default();
        hooked_client(&library, &hook)
            .evaluate_boolean("flag_boolean", "someentity", &fizz_buzz())
            .unwrap();

        assert_eq!(
            hook.events(),
            vec![
                before("flag_boolean"),
                after(
                    "flag_boolean",
                    FlagType::Boolean,
                    "true",
                    "DEFAULT_EVALUATION_REASON"
                ),
            ]
        );
    }

    #[test]
    fn failed_evaluation_only_calls_before_hook() {
        let library = Arc::new(MockLibrary::new());
        let hook = RecordingHook::default();
        let client = hooked_client(&library, &hook);

        client
            .evaluate_boolean("nonexistent", "someentity", &fizz_buzz())
            .unwrap_err();
        // Rejected before evaluation: no hook calls.
        client
            .evaluate_variant("", "someentity", &fizz_buzz())
            .unwrap_err();

        assert_eq!(hook.events(), vec![before("nonexistent")]);
    }

    #[test]
    fn hooks_run_per_batch_item_in_order() {
        let library = Arc::new(MockLibrary::new());
        let hook = RecordingHook::default();
        hooked_client(&library, &hook)
            .evaluate_batch(&[
                EvaluationRequest::new("flag1", "someentity").with_context([("fizz", "buzz")]),
                EvaluationRequest::new("flag_boolean", "someentity"),
                EvaluationRequest::new("notfound", "someentity"),
            ])
            .unwrap();

        assert_eq!(
            hook.events(),
            vec![
                before("flag1"),
                before("flag_boolean"),
                before("notfound"),
                after(
                    "flag1",
                    FlagType::Variant,
                    "variant1",
                    "MATCH_EVALUATION_REASON"
                ),
                after(
                    "flag_boolean",
                    FlagType::Boolean,
                    "true",
                    "DEFAULT_EVALUATION_REASON"
                ),
            ]
        );
    }

    struct NamedHook {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl EvaluationHook for NamedHook {
        fn before(&self, _data: &BeforeEvaluation) {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
        }

        fn after(&self, _data: &AfterEvaluation) {
            self.log.lock().unwrap().push(format!("{}:after", self.name));
        }
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let library = Arc::new(MockLibrary::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let client = FliptClient::with_library(
            library.clone(),
            ClientOptions::new()
                .hook(NamedHook {
                    name: "first",
                    log: log.clone(),
                })
                .hook(NamedHook {
                    name: "second",
                    log: log.clone(),
                }),
        )
        .unwrap();

        client
            .evaluate_boolean("flag_boolean", "someentity", &Context::new())
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:before", "second:before", "first:after", "second:after"]
        );
    }

    fn counting_provider(
        calls: Arc<AtomicUsize>,
        lifetime: chrono::Duration,
    ) -> impl Fn() -> crate::Result<AuthenticationLease> + Send + Sync {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AuthenticationLease::new(
                Authentication::jwt_token(format!("token-{n}")),
                Utc::now() + lifetime,
            ))
        }
    }

    #[test]
    fn provider_supplies_initial_authentication() {
        let library = Arc::new(MockLibrary::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let client = FliptClient::with_library(
            library.clone(),
            ClientOptions::new()
                .authentication(Authentication::client_token("static"))
                .authentication_provider(counting_provider(
                    calls.clone(),
                    chrono::Duration::hours(1),
                )),
        )
        .unwrap();

        let Call::Initialize(opts) = &library.calls()[0] else {
            panic!("expected initialize_engine call");
        };
        let opts: Value = serde_json::from_str(opts).unwrap();
        assert_eq!(opts["authentication"]["jwt_token"], "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The lease is far from expiry, so closing stops the refresher before it runs.
        client.close();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(library.stats().engines_destroyed, 1);
    }

    #[test]
    fn refresher_pushes_new_authentication_before_expiry() {
        let library = Arc::new(MockLibrary::new());
        let calls = Arc::new(AtomicUsize::new(0));
        // Expires 200ms after the refresh buffer, so the first refresh is due almost at once.
        let client = FliptClient::with_library(
            library.clone(),
            ClientOptions::new().authentication_provider(counting_provider(
                calls.clone(),
                chrono::Duration::milliseconds(30_200),
            )),
        )
        .unwrap();

        let mut refreshed = None;
        for _ in 0..1000 {
            refreshed = library.calls().into_iter().find_map(|call| match call {
                Call::UpdateAuthentication(auth) => Some(auth),
                _ => None,
            });
            if refreshed.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(refreshed.as_deref(), Some(r#"{"jwt_token":"token-2"}"#));

        client.close();
        let stats = library.stats();
        assert_eq!(stats.engines_destroyed, 1);
        assert_eq!(stats.live_strings, 0);
    }

    #[test]
    fn provider_failure_fails_construction() {
        let library = Arc::new(MockLibrary::new());
        let result = FliptClient::with_library(
            library.clone(),
            ClientOptions::new().authentication_provider(
                || -> crate::Result<AuthenticationLease> {
                    Err(Error::Authentication(
                        "identity service unavailable".to_owned(),
                    ))
                },
            ),
        );

        assert!(matches!(result, Err(Error::Authentication(_))));
        assert!(library.calls().is_empty());
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FliptClient>();
    }
}
