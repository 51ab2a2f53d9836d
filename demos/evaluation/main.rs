use flipt_client::{
    Authentication, ClientOptions, Context, ErrorStrategy, EvaluationRequest, FliptClient,
};

pub fn main() -> flipt_client::Result<()> {
    // Configure env_logger to see Flipt client logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("flipt")).init();

    let url = std::env::var("FLIPT_URL").unwrap_or_else(|_| "http://localhost:8080".to_owned());
    let mut options = ClientOptions::new()
        .url(url)
        .error_strategy(ErrorStrategy::Fallback);
    if let Ok(token) = std::env::var("FLIPT_AUTH_TOKEN") {
        options = options.authentication(Authentication::client_token(token));
    }

    let client = FliptClient::new(options)?;

    let context = Context::from([("fizz".to_owned(), "buzz".to_owned())]);

    let variant = client.evaluate_variant("flag1", "someentity", &context)?;
    println!("{}", serde_json::to_string_pretty(&variant).unwrap());

    let boolean = client.evaluate_boolean("flag_boolean", "someentity", &context)?;
    println!("flag_boolean enabled: {}", boolean.enabled);

    let batch = client.evaluate_batch(&[
        EvaluationRequest::new("flag1", "someentity").with_context([("fizz", "buzz")]),
        EvaluationRequest::new("flag_boolean", "someentity"),
        EvaluationRequest::new("notfound", "someentity"),
    ])?;
    for response in &batch.responses {
        println!("{}: {:?}", response.flag_key(), response);
    }

    for flag in client.list_flags()? {
        println!("{} ({:?}, enabled: {})", flag.key, flag.flag_type, flag.enabled);
    }

    client.close();

    Ok(())
}
