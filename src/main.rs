use aws_sdk_lambda::config::timeout::TimeoutConfig;
use config::Config;
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use lambda::LambdaFunction;
use s3::S3Store;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod lambda;
mod s3;
mod types;

/// Upper bound on one synchronous function invocation. The object fetch has
/// no explicit bound and relies on the SDK defaults.
const INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// The handler function converted into a Tower service to run in the background
/// and serve the incoming HTTP requests from upstream callers.
async fn relay_api_handler(
    req: Request<hyper::body::Incoming>,
    store: Arc<S3Store>,
    invoker: Arc<LambdaFunction>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    debug!("Request URL: {:?}", req.uri());

    if req.method() != Method::POST {
        // the relay has a single POST operation, everything else is noise
        warn!("Rejected {} request to {}", req.method(), req.uri());
        return Ok(Response::builder()
            .status(hyper::StatusCode::METHOD_NOT_ALLOWED)
            .body(handlers::empty())
            .expect("Failed to create a response"));
    }

    let body = req.into_body().collect().await?.to_bytes();

    Ok(handlers::relay::handler(body, store.as_ref(), invoker.as_ref()).await)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let config = Config::from_env();

    let aws_config = aws_config::load_from_env().await;

    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let lambda_config = aws_sdk_lambda::config::Builder::from(&aws_config)
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(INVOKE_TIMEOUT)
                .build(),
        )
        .build();
    let lambda_client = aws_sdk_lambda::Client::from_conf(lambda_config);

    let store = Arc::new(S3Store::new(s3_client, config.bucket.clone()));
    let invoker = Arc::new(LambdaFunction::new(lambda_client, config.function_name.clone()));

    // bind to a TCP port and start a loop to continuously accept incoming connections
    let listener = TcpListener::bind(config.listener).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let store = Arc::clone(&store);
        let invoker = Arc::clone(&invoker);

        // Spawn a tokio task to serve multiple connections concurrently
        tokio::task::spawn(async move {
            // bind the incoming connection to relay_api_handler service
            if let Err(err) = http1::Builder::new()
                // `service_fn` comes from Tower, convert the handler function into a service
                .serve_connection(
                    io,
                    service_fn(move |req| {
                        relay_api_handler(req, Arc::clone(&store), Arc::clone(&invoker))
                    }),
                )
                .await
            {
                debug!("TCP error: {:?}", err);
                info!("Client disconnected\n")
            }
        });
    }
}

/// Initializes the tracing from RUST_LOG env var if present or sets minimal logging:
/// - INFO for the relay
/// - ERROR for everything else
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(
                    Directive::from_str("sync_relay=info").expect("Invalid logging filter. It's a bug."),
                )
                .from_env_lossy(),
        )
        .with_ansi(true)
        .with_target(false)
        .compact()
        .init();
}
