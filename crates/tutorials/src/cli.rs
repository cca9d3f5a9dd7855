//! Command line and process plumbing shared by the tutorial binaries

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use pubsub_metadata::{MetadataError, Properties, DEFAULT_PROPERTIES_DIR, DEFAULT_PROPERTIES_FILE};
use pubsub_middleware::MiddlewareError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_BRIDGE: &str = "nats";
pub const DEFAULT_TRANSPORT: &str = "vmr";
pub const DEFAULT_TOPIC: &str = "tutorial.topic";

/// Where to connect and which topic to use
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Middleware bridge to load (memory or nats)
    #[arg(long, env = "PUBSUB_BRIDGE", default_value = DEFAULT_BRIDGE)]
    pub bridge: String,

    /// Transport name, looked up under the bridge in the properties file
    #[arg(long, default_value = DEFAULT_TRANSPORT)]
    pub transport: String,

    /// Topic to publish to or subscribe on
    #[arg(long, default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Directory holding the properties file
    #[arg(long, default_value = DEFAULT_PROPERTIES_DIR)]
    pub properties_dir: PathBuf,

    /// Properties file name
    #[arg(long, default_value = DEFAULT_PROPERTIES_FILE)]
    pub properties: String,
}

impl ConnectionArgs {
    /// Load the properties file. A missing file means defaults for every
    /// transport; an unreadable or invalid one is a configuration error.
    pub fn load_properties(&self) -> Result<Properties, MiddlewareError> {
        let path = Properties::resolve_path(&self.properties_dir, &self.properties);
        match Properties::load(&path) {
            Ok(properties) => {
                info!(path = %path.display(), "Loaded properties");
                Ok(properties)
            }
            Err(MetadataError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Properties file not found, using defaults");
                Ok(Properties::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Longest accepted publish interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Parse a publish interval in seconds; fractions allowed, must be positive
/// and at most `MAX_INTERVAL`
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("interval must be positive, got {}", s));
    }
    let interval = Duration::try_from_secs_f64(secs)
        .map_err(|e| format!("interval {} out of range: {}", s, e))?;
    if interval > MAX_INTERVAL {
        return Err(format!(
            "interval must be at most {} seconds, got {}",
            MAX_INTERVAL.as_secs(),
            s
        ));
    }
    Ok(interval)
}

/// Install the fmt subscriber, filtered by RUST_LOG (default `info`)
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Process exit code for a run: 0 on success, the status code otherwise
pub fn exit_code(outcome: Result<(), MiddlewareError>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let status = e.status();
            error!(status = %status, code = status.code(), error = %e, "Exiting on failure");
            ExitCode::from(u8::try_from(status.code()).unwrap_or(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pubsub_middleware::Status;
    use std::io::Write;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        connection: ConnectionArgs,
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tutorial"]).unwrap();
        assert_eq!(cli.connection.transport, "vmr");
        assert_eq!(cli.connection.topic, "tutorial.topic");
        assert_eq!(cli.connection.properties_dir, PathBuf::from("."));
        assert_eq!(cli.connection.properties, "mama.yaml");
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "tutorial",
            "--bridge",
            "memory",
            "--topic",
            "prices.>",
            "--properties-dir",
            "/etc/pubsub",
        ])
        .unwrap();
        assert_eq!(cli.connection.bridge, "memory");
        assert_eq!(cli.connection.topic, "prices.>");
        assert_eq!(cli.connection.properties_dir, PathBuf::from("/etc/pubsub"));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_interval("0.5").unwrap(), Duration::from_millis(500));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-1").is_err());
        assert!(parse_interval("soon").is_err());
        assert!(parse_interval("1e30").is_err());
        assert!(parse_interval("1e19").is_err());
        assert!(parse_interval("inf").is_err());
        assert_eq!(parse_interval("31536000").unwrap(), MAX_INTERVAL);
    }

    fn args_for(dir: &TempDir, file: &str) -> ConnectionArgs {
        ConnectionArgs {
            bridge: "memory".to_string(),
            transport: "vmr".to_string(),
            topic: "tutorial.topic".to_string(),
            properties_dir: dir.path().to_path_buf(),
            properties: file.to_string(),
        }
    }

    #[test]
    fn test_missing_properties_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let properties = args_for(&dir, "absent.yaml").load_properties().unwrap();
        assert!(properties.bridges.is_empty());
    }

    #[test]
    fn test_properties_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("mama.yaml")).unwrap();
        writeln!(
            file,
            "bridges:\n  nats:\n    transports:\n      vmr:\n        url: nats://localhost:4222"
        )
        .unwrap();

        let properties = args_for(&dir, "mama.yaml").load_properties().unwrap();
        let params = properties.transport("nats", "vmr").unwrap();
        assert_eq!(params.url.as_deref(), Some("nats://localhost:4222"));
    }

    #[test]
    fn test_invalid_properties_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("mama.yaml"), "bridges: [not, a, map]").unwrap();

        let err = args_for(&dir, "mama.yaml").load_properties().unwrap_err();
        assert_eq!(err.status(), Status::ConfigError);
    }
}
