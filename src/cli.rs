//! Command-line interface for the account-broker daemon.
//!
//! Uses lexopt to keep the binary small.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Unset options fall through to the environment, the config file, and
/// finally the defaults.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to.
    pub host: Option<IpAddr>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// API key for the control API.
    pub api_key: Option<String>,
    /// Disable API key authentication.
    pub no_auth: bool,
    /// Directory for registry and config cache files.
    pub state_dir: Option<PathBuf>,
    /// Keep sessions in memory instead of the OS keychain.
    pub memory_store: bool,
    /// Base URL of the auth/config server.
    pub remote: Option<String>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('k') | Long("api-key") => {
                result.api_key = Some(parser.value()?.parse()?);
            }
            Long("no-auth") => {
                result.no_auth = true;
            }
            Short('s') | Long("state-dir") => {
                result.state_dir = Some(parser.value()?.parse()?);
            }
            Long("memory-store") => {
                result.memory_store = true;
            }
            Short('r') | Long("remote") => {
                let value: String = parser.value()?.parse()?;
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(ArgsError::InvalidValue("remote", value));
                }
                result.remote = Some(value);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"account-broker {version}
Multi-account session broker with MFA prompts and per-region config caching

USAGE:
    account-broker [OPTIONS]

OPTIONS:
    -H, --host <ADDR>       Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>       Port to listen on [default: 3900]
    -c, --config <FILE>     Path to configuration file (JSON)
    -k, --api-key <KEY>     API key for the control API
    -s, --state-dir <DIR>   Directory for registry and config cache files
    -r, --remote <URL>      Base URL of the auth/config server
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
        --memory-store      Keep sessions in memory instead of the OS keychain
        --no-auth           Disable API key authentication
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    ACCOUNT_BROKER_HOST       Host address (overrides config)
    ACCOUNT_BROKER_PORT       Port number (overrides config)
    ACCOUNT_BROKER_API_KEY    API key (overrides config)
    ACCOUNT_BROKER_STATE_DIR  State directory (overrides config)
    ACCOUNT_BROKER_REMOTE     Auth/config server URL (overrides config)
    ACCOUNT_BROKER_LOG_LEVEL  Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # Start with defaults (localhost:3900, OS keychain, no auth)
    account-broker -r https://auth.example.com/v1

    # Require an API key for the control API
    account-broker -r https://auth.example.com/v1 -k my-secret-key

    # Throwaway run that never touches the keychain
    account-broker --memory-store -s /tmp/broker -r http://127.0.0.1:9000
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("account-broker {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
