use clap::{Parser, Subcommand};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// Default per-attempt HTTP timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default number of generic retries for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff in milliseconds
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

/// Digiventures SDK command line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Application ID issued by Digiventures
    #[arg(short = 'a', long, env = "DIGI_APPLICATION_ID")]
    pub application_id: String,

    /// Application secret
    #[arg(short = 's', long, env = "DIGI_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Target environment (qa, staging, production)
    #[arg(short = 'e', long, env = "DIGI_ENVIRONMENT", default_value = "qa")]
    pub environment: String,

    /// Per-attempt HTTP timeout in milliseconds
    #[arg(long, env = "DIGI_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Max retries for transient failures
    #[arg(long, env = "DIGI_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Override the environment base URL (proxies, local mocks)
    #[arg(long, env = "DIGI_BASE_URL")]
    pub base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch a token and print its expiration and API version
    Token,

    /// Get a legajo by ID
    Get { id: String },

    /// Create a legajo from a JSON document
    Create {
        /// JSON body, e.g. '{"firstname":"Ana","email":"ana@example.com"}'
        data: String,

        /// Creation strategy (IGNORE, COMPLETE, OVERRIDE)
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Update a legajo with a JSON document
    Update { id: String, data: String },

    /// Print the recovery link of a legajo
    LinkRecover { id: String },

    /// Print the applicant link of a legajo
    LinkApplicant { id: String },

    /// Download a file by URL or path
    File {
        url: String,

        /// Write the decoded bytes here instead of printing base64
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
}

/// Deployment environment of the Digiventures API
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Qa,
    Staging,
    Production,
}

impl Environment {
    /// Fixed origin for the environment
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Qa => "https://api.qa.digiventures.la",
            Environment::Staging => "https://api.staging.digiventures.la",
            Environment::Production => "https://api.production.digiventures.la",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Qa => "qa",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qa" => Ok(Environment::Qa),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            _ => Err(ApiError::ConfigError(format!("Invalid environment: {}", s))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the "re-authentication already attempted" marker lives
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReauthScope {
    /// Carried on each request's context; concurrent requests never interfere
    #[default]
    PerRequest,
    /// One flag on the AuthManager shared by every request of the client
    Shared,
}

/// Client credentials and transport tuning. Immutable once built.
#[derive(Clone)]
pub struct Config {
    pub application_id: String,
    pub secret: String,
    pub environment: Environment,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub reauth_scope: ReauthScope,
    pub base_url_override: Option<String>,
}

impl Config {
    /// Build a configuration, validating the environment name up front
    pub fn new(
        application_id: impl Into<String>,
        secret: impl Into<String>,
        environment: &str,
    ) -> Result<Self, ApiError> {
        let application_id = application_id.into();
        let secret = secret.into();

        if application_id.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "applicationId must not be empty".to_string(),
            ));
        }
        if secret.trim().is_empty() {
            return Err(ApiError::ConfigError("secret must not be empty".to_string()));
        }

        Ok(Self {
            application_id,
            secret,
            environment: environment.parse()?,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            reauth_scope: ReauthScope::default(),
            base_url_override: None,
        })
    }

    /// Build from parsed CLI arguments (CLI > ENV > .env > defaults)
    pub fn from_args(args: &CliArgs) -> Result<Self, ApiError> {
        let mut config = Self::new(&args.application_id, &args.secret, &args.environment)?
            .with_timeout_ms(args.timeout_ms)
            .with_max_retries(args.max_retries);

        if let Some(ref base_url) = args.base_url {
            config = config.with_base_url(base_url.clone());
        }

        Ok(config)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_base_delay_ms = delay_ms;
        self
    }

    pub fn with_reauth_scope(mut self, scope: ReauthScope) -> Self {
        self.reauth_scope = scope;
        self
    }

    /// Replace the environment origin (the environment itself stays validated)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Origin every request is sent to, without a trailing slash
    pub fn base_url(&self) -> String {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

// Keep the secret out of debug output
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("application_id", &self.application_id)
            .field("secret", &"***")
            .field("environment", &self.environment)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("reauth_scope", &self.reauth_scope)
            .field("base_url_override", &self.base_url_override)
            .finish()
    }
}
