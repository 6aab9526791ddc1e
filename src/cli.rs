use std::path::PathBuf;

use clap::Parser;

/// Run a command for every container lifecycle event.
///
/// The event and the inspected container are written to the command's
/// stdin as a single JSON object.
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Command to execute upon receiving an event.
    #[arg(short, long)]
    pub exec: Option<PathBuf>,
    /// Docker endpoint. Defaults to $DOCKER_HOST or unix:///var/run/docker.sock.
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Seconds to wait before reconnecting after a failure. 0 retries immediately.
    #[arg(long, value_name = "SECONDS")]
    pub retry_interval: Option<u64>,
    /// Client certificate for TLS endpoints.
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,
    /// Client key for TLS endpoints.
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
    /// CA certificate for TLS endpoints.
    #[arg(long)]
    pub tls_ca: Option<PathBuf>,
    /// Optional TOML config file. Flags take precedence over its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "dockeractd",
            "--exec",
            "/usr/local/bin/on-event",
            "--endpoint",
            "tcp://127.0.0.1:2375",
            "--retry-interval",
            "0",
        ])
        .unwrap();

        assert_eq!(args.exec, Some(PathBuf::from("/usr/local/bin/on-event")));
        assert_eq!(args.endpoint.as_deref(), Some("tcp://127.0.0.1:2375"));
        assert_eq!(args.retry_interval, Some(0));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_exec_is_optional_at_parse_time() {
        // Enforced after the config file and environment are merged
        let args = Args::try_parse_from(["dockeractd"]).unwrap();
        assert!(args.exec.is_none());
    }
}
