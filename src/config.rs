//! Server configuration.
//!
//! Values are read from `PROXY_*` environment variables first and then
//! overridden by command-line flags.

use crate::storage::CassandraConfig;
use std::fmt;
use std::str::FromStr;

/// Prefix shared by every environment variable the server reads.
pub const ENV_PREFIX: &str = "PROXY_";

pub const DEFAULT_HOSTS: &str = "127.0.0.1";
pub const DEFAULT_KEYSPACE: &str = "key_value_store";
pub const DEFAULT_TABLE: &str = "key_value";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown argument: {0}")]
    UnknownFlag(String),

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid log level '{0}' (expected debug, info, warn or error)")]
    InvalidLogLevel(String),

    #[error("invalid backend '{0}' (expected cassandra or memory)")]
    InvalidBackend(String),

    #[error("invalid listen address '{0}'")]
    InvalidListenAddress(String),

    #[error("no storage hosts configured")]
    NoHosts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Which storage adapter serves the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Cassandra,
    Memory,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cassandra" => Ok(Backend::Cassandra),
            "memory" => Ok(Backend::Memory),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cassandra => f.write_str("cassandra"),
            Backend::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    pub hosts: Vec<String>,
    pub keyspace: String,
    pub table: String,
    /// Always in `host:port` form.
    pub listen: String,
    pub backend: Backend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            hosts: vec![DEFAULT_HOSTS.to_string()],
            keyspace: DEFAULT_KEYSPACE.to_string(),
            table: DEFAULT_TABLE.to_string(),
            listen: crate::DEFAULT_LISTEN.to_string(),
            backend: Backend::default(),
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(Config),
    Help,
    Version,
}

impl Config {
    /// Reads the process environment and arguments.
    pub fn load() -> Result<Invocation, ConfigError> {
        Self::from_sources(|name| std::env::var(name).ok(), std::env::args().skip(1))
    }

    /// Builds a configuration from an environment lookup and the arguments
    /// following the program name.
    pub fn from_sources<E, I>(env: E, args: I) -> Result<Invocation, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let var = |name: &str| env(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        if let Some(level) = var("LOG_LEVEL") {
            config.log_level = level.parse()?;
        }
        if let Some(hosts) = var("CASSANDRA_HOSTS") {
            config.hosts = split_hosts(&hosts)?;
        }
        if let Some(keyspace) = var("CASSANDRA_KEYSPACE") {
            config.keyspace = keyspace;
        }
        if let Some(table) = var("CASSANDRA_TABLE") {
            config.table = table;
        }
        if let Some(addr) = var("REDIS_ADDRESS") {
            config.listen = normalize_listen(&addr)?;
        }
        if let Some(backend) = var("BACKEND") {
            config.backend = backend.parse()?;
        }

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .ok_or_else(|| ConfigError::MissingValue(flag.clone()))
            };

            match flag.as_str() {
                "--log-level" => config.log_level = value()?.parse()?,
                "--hosts" => config.hosts = split_hosts(&value()?)?,
                "--keyspace" => config.keyspace = value()?,
                "--table" => config.table = value()?,
                "--listen" | "-l" => config.listen = normalize_listen(&value()?)?,
                "--backend" => config.backend = value()?.parse()?,
                "--help" => return Ok(Invocation::Help),
                "--version" | "-v" => return Ok(Invocation::Version),
                _ => return Err(ConfigError::UnknownFlag(flag)),
            }
        }

        Ok(Invocation::Run(config))
    }

    /// Settings for the Cassandra adapter.
    pub fn cassandra(&self) -> CassandraConfig {
        CassandraConfig {
            hosts: self.hosts.clone(),
            keyspace: self.keyspace.clone(),
            table: self.table.clone(),
        }
    }
}

fn split_hosts(raw: &str) -> Result<Vec<String>, ConfigError> {
    let hosts: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect();

    if hosts.is_empty() {
        return Err(ConfigError::NoHosts);
    }
    Ok(hosts)
}

/// Accepts `host:port` and the bare `:port` form, which binds every interface.
fn normalize_listen(raw: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidListenAddress(raw.to_string());

    let (host, port) = raw.rsplit_once(':').ok_or_else(invalid)?;
    port.parse::<u16>().map_err(|_| invalid())?;

    let host = if host.is_empty() { "0.0.0.0" } else { host };
    Ok(format!("{host}:{port}"))
}

pub const HELP: &str = r#"
cqlbridge - Redis protocol front end for a Cassandra key/value table

USAGE:
    cqlbridge [OPTIONS]

OPTIONS:
    -l, --listen <ADDR>       Address to serve RESP on (default: 0.0.0.0:6380)
        --hosts <HOSTS>       Comma separated Cassandra contact points (default: 127.0.0.1)
        --keyspace <NAME>     Keyspace holding the table (default: key_value_store)
        --table <NAME>        Table holding the keys (default: key_value)
        --backend <KIND>      cassandra or memory (default: cassandra)
        --log-level <LEVEL>   debug, info, warn or error (default: info)
    -v, --version             Print version information
        --help                Print this help message

ENVIRONMENT:
    PROXY_LOG_LEVEL, PROXY_CASSANDRA_HOSTS, PROXY_CASSANDRA_KEYSPACE,
    PROXY_CASSANDRA_TABLE, PROXY_REDIS_ADDRESS, PROXY_BACKEND
    Flags take precedence. RUST_LOG overrides the log level when set.

CONNECTING:
    $ redis-cli -p 6380
    127.0.0.1:6380> SET name "Ariz" EX 60
    OK
    127.0.0.1:6380> TTL name
    (integer) 60
"#;
