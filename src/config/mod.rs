//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheTuning;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "skillbridge";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Command-line arguments for the Skillbridge binary.
#[derive(Debug, Parser)]
#[command(name = "skillbridge", version, about = "Skillbridge API server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SKILLBRIDGE_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Skillbridge HTTP service.
    Serve(Box<ServeArgs>),
    /// Cache maintenance against the shared store.
    #[command(name = "cache")]
    Cache(CacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the shared store backend (redis|memory).
    #[arg(long = "store-backend", value_name = "BACKEND")]
    pub store_backend: Option<String>,

    /// Override the redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Delete every key matching a glob pattern.
    Purge(CachePurgeArgs),
    /// Wipe the entire shared store.
    Flush(CacheFlushArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CachePurgeArgs {
    /// Glob pattern, e.g. `sb:shortage:*`.
    #[arg(value_name = "PATTERN")]
    pub pattern: String,

    /// Keys per scan round-trip.
    #[arg(long, value_name = "COUNT")]
    pub batch: Option<usize>,

    /// Override the redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CacheFlushArgs {
    /// Required confirmation: the wipe hits every namespace in the store,
    /// including entries owned by other subsystems.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub yes: bool,

    /// Override the redis connection URL.
    #[arg(long = "redis-url", value_name = "URL")]
    pub redis_url: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub store: StoreSettings,
    pub cache: CacheTuning,
    pub admin: AdminSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub redis_url: String,
}

#[derive(Debug, Clone)]
pub struct AdminSettings {
    /// Shared secret for the HTTP admin surface; absent disables it.
    pub secret: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SKILLBRIDGE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Cache(args)) => raw.apply_cache_overrides(&args.command),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    store: RawStoreSettings,
    cache: CacheTuning,
    admin: RawAdminSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(backend) = overrides.store_backend.as_ref() {
            self.store.backend = Some(backend.clone());
        }
        if let Some(url) = overrides.redis_url.as_ref() {
            self.store.redis_url = Some(url.clone());
        }
    }

    fn apply_cache_overrides(&mut self, command: &CacheCommand) {
        let redis_url = match command {
            CacheCommand::Purge(args) => args.redis_url.as_ref(),
            CacheCommand::Flush(args) => args.redis_url.as_ref(),
        };
        if let Some(url) = redis_url {
            self.store.redis_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            store,
            cache,
            admin,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            store: build_store_settings(store)?,
            cache,
            admin: build_admin_settings(admin),
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let candidate = format!("{host}:{port}");
    let addr: SocketAddr = candidate
        .parse()
        .map_err(|err| LoadError::invalid("server.addr", format!("invalid `{candidate}`: {err}")))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max_value).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_store_settings(store: RawStoreSettings) -> Result<StoreSettings, LoadError> {
    let backend = match store.backend.as_deref() {
        None | Some("redis") => StoreBackend::Redis,
        Some("memory") => StoreBackend::Memory,
        Some(other) => {
            return Err(LoadError::invalid(
                "store.backend",
                format!("unknown backend `{other}`, expected redis or memory"),
            ));
        }
    };

    let redis_url = store
        .redis_url
        .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
    if redis_url.trim().is_empty() {
        return Err(LoadError::invalid("store.redis_url", "must not be empty"));
    }

    Ok(StoreSettings { backend, redis_url })
}

fn build_admin_settings(admin: RawAdminSettings) -> AdminSettings {
    let secret = admin.secret.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    AdminSettings { secret }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStoreSettings {
    backend: Option<String>,
    redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    secret: Option<String>,
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn defaults_are_usable() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.store.backend, StoreBackend::Redis);
        assert_eq!(settings.store.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(settings.cache.follower_poll_attempts, 20);
        assert!(settings.admin.secret.is_none());
    }

    #[test]
    fn unknown_store_backend_is_rejected() {
        let mut raw = RawSettings::default();
        raw.store.backend = Some("etcd".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn blank_admin_secret_disables_the_surface() {
        let mut raw = RawSettings::default();
        raw.admin.secret = Some("   ".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.admin.secret.is_none());
    }

    #[test]
    fn parse_cache_purge_arguments() {
        let args = CliArgs::parse_from([
            "skillbridge",
            "cache",
            "purge",
            "sb:shortage:*",
            "--batch",
            "200",
        ]);

        match args.command.expect("cache command") {
            Command::Cache(cache) => match cache.command {
                CacheCommand::Purge(purge) => {
                    assert_eq!(purge.pattern, "sb:shortage:*");
                    assert_eq!(purge.batch, Some(200));
                }
                _ => panic!("wrong subcommand parsed"),
            },
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_cache_flush_requires_explicit_yes() {
        let args = CliArgs::parse_from(["skillbridge", "cache", "flush"]);
        match args.command.expect("cache command") {
            Command::Cache(cache) => match cache.command {
                CacheCommand::Flush(flush) => assert!(!flush.yes),
                _ => panic!("wrong subcommand parsed"),
            },
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "skillbridge",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--redis-url",
            "redis://cache:6379",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(
                    serve.overrides.redis_url.as_deref(),
                    Some("redis://cache:6379")
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
