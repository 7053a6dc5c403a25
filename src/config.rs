use core::net::SocketAddrV4;
use std::env::var;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::info;

/// Listener address env var, e.g. `export SYNC_RELAY_LISTENER=127.0.0.1:8080`
const LISTENER_ENV_VAR: &str = "SYNC_RELAY_LISTENER";

/// Env vars that must be present and non-empty before the relay can start.
/// The credentials pair is consumed by the AWS SDK itself; it is only
/// validated here so a misconfigured instance dies at startup, not mid-request.
const REQUIRED_ENV_VARS: [&str; 5] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_REGION",
    "AWS_BUCKET_NAME",
    "AWS_LAMBDA_FUNCTION_NAME",
];

pub(crate) struct Config {
    /// E.g. 127.0.0.1:8080
    pub listener: SocketAddrV4,
    /// The bucket all `s3_path` keys are resolved against
    pub bucket: String,
    /// Name or ARN of the function every document is relayed to
    pub function_name: String,
}

impl Config {
    /// Creates a new Config instance from environment variables.
    /// Uses default values where possible.
    /// Panics if any of the required environment variables is missing or empty.
    pub fn from_env() -> Self {
        for env_var in REQUIRED_ENV_VARS {
            match var(env_var) {
                Ok(v) if !v.is_empty() => (),
                _ => panic!("Missing required env var: {env_var}. Set all of {REQUIRED_ENV_VARS:?} before starting the relay."),
            }
        }

        let listener_ip_str = var(LISTENER_ENV_VAR).unwrap_or_else(|_e| "127.0.0.1:8080".to_string());

        let listener = match listener_ip_str.split_once(':') {
            Some((ip, port)) => {
                let listener_ip = Ipv4Addr::from_str(ip).expect(
                    "Invalid IP address in SYNC_RELAY_LISTENER env var. Must be a valid IP4, e.g. 127.0.0.1",
                );
                let listener_port = port.parse::<u16>().expect(
                    "Invalid port number in SYNC_RELAY_LISTENER env var. Must be a valid port number, e.g. 8080",
                );
                SocketAddrV4::new(listener_ip, listener_port)
            }
            None => SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8080),
        };

        let bucket = var("AWS_BUCKET_NAME").expect("AWS_BUCKET_NAME was validated above. It's a bug.");
        let function_name =
            var("AWS_LAMBDA_FUNCTION_NAME").expect("AWS_LAMBDA_FUNCTION_NAME was validated above. It's a bug.");

        info!(
            "Listening on http://{}\n- bucket: {}\n- function: {}\n",
            listener, bucket, function_name
        );

        Self {
            listener,
            bucket,
            function_name,
        }
    }
}
