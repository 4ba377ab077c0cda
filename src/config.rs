use crate::services::{allocator::DEFAULT_MAX_KEY_ATTEMPTS, backend::S3Settings};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr};

/// Which object backend the gateway talks to.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// S3-compatible endpoint (AWS S3, MinIO, ...).
    S3,
    /// Process-local store; contents vanish on exit.
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub backend: BackendKind,
    pub bucket: String,
    pub s3: S3Settings,
    pub max_key_attempts: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image storage API in front of an S3-compatible bucket")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides IMAGE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object backend (overrides IMAGE_STORE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Bucket holding the images (overrides IMAGE_STORE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// S3 endpoint, `host:port` or URL (overrides IMAGE_STORE_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// S3 region (overrides IMAGE_STORE_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Use https for a scheme-less endpoint (overrides IMAGE_STORE_S3_SECURE)
    #[arg(long)]
    pub s3_secure: Option<bool>,

    /// Keys tried per upload before giving up (overrides IMAGE_STORE_MAX_KEY_ATTEMPTS)
    #[arg(long)]
    pub max_key_attempts: Option<u32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed CLI args over values from `lookup` (normally the process
    /// environment), then over defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<(Self, bool)> {
        // --- Environment fallback ---
        let env_or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        let env_host = env_or("IMAGE_STORE_HOST", "0.0.0.0");
        let env_port = parse_env(&lookup, "IMAGE_STORE_PORT", 3000u16)?;
        let env_db = env_or(
            "IMAGE_STORE_DATABASE_URL",
            "sqlite://./data/meta/image_store.db",
        );
        let env_backend = match lookup("IMAGE_STORE_BACKEND") {
            Some(value) => <BackendKind as ValueEnum>::from_str(&value, true).map_err(|err| {
                anyhow::anyhow!("parsing IMAGE_STORE_BACKEND value `{}`: {}", value, err)
            })?,
            None => BackendKind::S3,
        };
        let env_bucket = env_or("IMAGE_STORE_BUCKET", "images");
        let env_endpoint = env_or("IMAGE_STORE_S3_ENDPOINT", "localhost:9000");
        let env_region = env_or("IMAGE_STORE_S3_REGION", "us-east-1");
        let env_secure = parse_env(&lookup, "IMAGE_STORE_S3_SECURE", false)?;
        let env_attempts =
            parse_env(&lookup, "IMAGE_STORE_MAX_KEY_ATTEMPTS", DEFAULT_MAX_KEY_ATTEMPTS)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            backend: args.backend.unwrap_or(env_backend),
            bucket: args.bucket.unwrap_or(env_bucket),
            s3: S3Settings {
                endpoint: args.s3_endpoint.unwrap_or(env_endpoint),
                secure: args.s3_secure.unwrap_or(env_secure),
                region: args.s3_region.unwrap_or(env_region),
                // credentials are read from the environment only
                access_key: lookup("IMAGE_STORE_S3_ACCESS_KEY"),
                secret_key: lookup("IMAGE_STORE_S3_SECRET_KEY"),
                session_token: lookup("IMAGE_STORE_S3_SESSION_TOKEN"),
            },
            max_key_attempts: args.max_key_attempts.unwrap_or(env_attempts).max(1),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}
