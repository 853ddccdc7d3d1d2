use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub connect: ConnectConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Remote platform deployment the gateway talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformEnvironment {
    Development,
    Production,
}

impl PlatformEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformEnvironment::Development => "development",
            PlatformEnvironment::Production => "production",
        }
    }
}

impl std::str::FromStr for PlatformEnvironment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(PlatformEnvironment::Development),
            "production" => Ok(PlatformEnvironment::Production),
            other => bail!("unknown platform environment '{}'", other),
        }
    }
}

/// Platform connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_environment")]
    pub environment: PlatformEnvironment,
    /// OAuth client credentials; normally supplied via env, never logged
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Timeout applied to every outbound call, including each cascade delete
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://api.pipedream.com/v1".to_string()
}

fn default_environment() -> PlatformEnvironment {
    PlatformEnvironment::Development
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            project_id: String::new(),
            environment: default_environment(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Connect token settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectConfig {
    /// Origin used when a caller does not supply `allowed_origins`
    #[serde(default = "default_allowed_origin")]
    pub default_allowed_origin: String,
}

fn default_allowed_origin() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            default_allowed_origin: default_allowed_origin(),
        }
    }
}

/// Cascade delete settings
#[derive(Debug, Clone, Deserialize)]
pub struct CascadeConfig {
    /// Maximum per-account deletes in flight for one cascade
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Host HTTP layer settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Header carrying the caller's external user id
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    /// Callers allowed to cascade-delete an app's accounts across tenants
    #[serde(default)]
    pub operator_ids: Vec<String>,
}

fn default_port() -> u16 {
    3001
}

fn default_identity_header() -> String {
    "x-external-user-id".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            identity_header: default_identity_header(),
            operator_ids: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Override fields from `GATEWAY_*` env vars. Unparseable values are ignored.
    pub fn apply_env(mut self) -> Self {
        if let Ok(v) = std::env::var("GATEWAY_BASE_URL") {
            self.platform.base_url = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_PROJECT_ID") {
            self.platform.project_id = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_ENVIRONMENT") {
            if let Ok(env) = v.parse() {
                self.platform.environment = env;
            }
        }
        if let Ok(v) = std::env::var("GATEWAY_CLIENT_ID") {
            self.platform.client_id = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_CLIENT_SECRET") {
            self.platform.client_secret = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.platform.request_timeout_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("GATEWAY_DEFAULT_ORIGIN") {
            self.connect.default_allowed_origin = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_CASCADE_MAX_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                self.cascade.max_concurrency = n;
            }
        }
        if let Ok(v) = std::env::var("GATEWAY_OPERATOR_IDS") {
            self.server.operator_ids = v
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(v) = std::env::var("GATEWAY_PORT") {
            if let Ok(n) = v.parse::<u16>() {
                self.server.port = n;
            }
        }
        self
    }

    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.platform.project_id.trim().is_empty() {
            bail!("platform.project_id is required (GATEWAY_PROJECT_ID)");
        }
        if self.platform.client_id.is_empty() || self.platform.client_secret.is_empty() {
            bail!("platform client credentials are required (GATEWAY_CLIENT_ID / GATEWAY_CLIENT_SECRET)");
        }
        if self.platform.request_timeout_seconds == 0 {
            bail!("platform.request_timeout_seconds must be greater than zero");
        }
        if self.cascade.max_concurrency == 0 {
            bail!("cascade.max_concurrency must be greater than zero");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.platform.request_timeout_seconds)
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GatewayConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let config: GatewayConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path))?;
    Ok(config)
}
