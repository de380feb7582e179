//! Server configuration for EDV.
//!
//! Settings come from `edv-server start` flags, each of which falls back to
//! an `EDV_*` environment variable. Parsed arguments are validated into a
//! [`ServerConfig`] before anything is started.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line interface of the `edv-server` binary.
#[derive(Debug, Parser)]
#[command(name = "edv-server", version, about = "Encrypted data vault server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the EDV server.
    Start(StartArgs),
}

/// Flags accepted by `edv-server start`.
#[derive(Debug, Args)]
pub struct StartArgs {
    /// URL to run the EDV instance on. Format: `HostName:Port`.
    #[arg(short = 'o', long, env = "EDV_HOST_URL")]
    pub host_url: String,

    /// The type of database to use internally in the EDV.
    #[arg(short = 't', long, env = "EDV_DATABASE_TYPE", value_enum, ignore_case = true)]
    pub database_type: DatabaseType,

    /// The URL of the database. Not needed if using the in-memory store.
    #[arg(short = 'l', long, env = "EDV_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Seconds before a database request is abandoned.
    #[arg(long, env = "EDV_DATABASE_TIMEOUT", default_value_t = 10)]
    pub database_timeout: u64,

    /// Maximum number of requests served at once.
    #[arg(long, env = "EDV_MAX_CONCURRENT_REQUESTS", default_value_t = 512)]
    pub max_concurrent_requests: usize,

    /// Log filter (e.g. `info`, `debug`, `edv_core=trace`).
    #[arg(long, env = "EDV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Supported `--database-type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DatabaseType {
    /// Process-local storage; data is lost on restart.
    #[value(name = "mem", alias = "memstore")]
    Mem,
    /// A CouchDB server at `--database-url`.
    #[value(name = "couchdb")]
    CouchDb,
}

/// Errors from validating start arguments.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("host URL not provided")]
    MissingHostUrl,

    #[error("database URL is required for database type '{database_type}'")]
    MissingDatabaseUrl { database_type: &'static str },

    #[error("{name} must be greater than zero")]
    ZeroLimit { name: &'static str },
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to, as `host:port`.
    pub host_url: String,
    /// Storage backend and its connection settings.
    pub storage_backend: StorageBackendType,
    /// Maximum number of requests served at once.
    pub max_concurrent_requests: usize,
    /// Log level filter.
    pub log_level: String,
}

/// Storage backend selection.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// CouchDB at `url`, each request bounded by `timeout`.
    CouchDb { url: String, timeout: Duration },
}

impl StorageBackendType {
    /// Short name for logs. Never includes the URL, which may carry credentials.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "mem",
            Self::CouchDb { .. } => "couchdb",
        }
    }
}

impl std::fmt::Debug for StorageBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::CouchDb { timeout, .. } => f
                .debug_struct("CouchDb")
                .field("url", &"[redacted]")
                .field("timeout", timeout)
                .finish(),
        }
    }
}

impl TryFrom<StartArgs> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: StartArgs) -> Result<Self, Self::Error> {
        if args.host_url.trim().is_empty() {
            return Err(ConfigError::MissingHostUrl);
        }
        if args.max_concurrent_requests == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "max concurrent requests",
            });
        }

        let storage_backend = match args.database_type {
            DatabaseType::Mem => StorageBackendType::Memory,
            DatabaseType::CouchDb => {
                let url = args
                    .database_url
                    .filter(|u| !u.trim().is_empty())
                    .ok_or(ConfigError::MissingDatabaseUrl {
                        database_type: "couchdb",
                    })?;
                if args.database_timeout == 0 {
                    return Err(ConfigError::ZeroLimit {
                        name: "database timeout",
                    });
                }
                StorageBackendType::CouchDb {
                    url,
                    timeout: Duration::from_secs(args.database_timeout),
                }
            }
        };

        Ok(Self {
            host_url: args.host_url,
            storage_backend,
            max_concurrent_requests: args.max_concurrent_requests,
            log_level: args.log_level,
        })
    }
}
