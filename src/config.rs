use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub delivery: DeliveryConfig,

    #[command(flatten)]
    pub websocket: WsConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[arg(long, env = "PARLEY_DATABASE_URL")]
    pub url: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "PARLEY_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Minimum number of pooled connections held open
    #[arg(long, env = "PARLEY_DB_MIN_CONNECTIONS", default_value_t = 1)]
    pub min_connections: u32,

    /// How long to wait for a free connection
    #[arg(long, env = "PARLEY_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,

    /// Idle connection lifetime before it is closed
    #[arg(long, env = "PARLEY_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Hard lifetime cap for any pooled connection
    #[arg(long, env = "PARLEY_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "PARLEY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PARLEY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// How long to wait for background tasks on shutdown
    #[arg(long, env = "PARLEY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Upper bound on any single request before it is aborted
    #[arg(long, env = "PARLEY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for JWT signing
    #[arg(long, env = "PARLEY_JWT_SECRET")]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "PARLEY_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "PARLEY_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "PARLEY_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for expensive auth-related endpoints (register/login)
    #[arg(long, env = "PARLEY_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u32,

    /// Burst allowance for expensive auth-related endpoints
    #[arg(long, env = "PARLEY_AUTH_RATE_LIMIT_BURST", default_value_t = 3)]
    pub auth_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// How long messages are retained before the purge worker deletes them
    #[arg(long, env = "PARLEY_RETENTION_HOURS", default_value_t = 24)]
    pub retention_hours: i64,

    /// How often to run the message purge task
    #[arg(long, env = "PARLEY_PURGE_INTERVAL_SECS", default_value_t = 300)]
    pub purge_interval_secs: u64,

    /// Maximum message content length in bytes
    #[arg(long, env = "PARLEY_MAX_CONTENT_BYTES", default_value_t = 4096)]
    pub max_content_bytes: usize,

    /// Maximum number of results returned by contact search
    #[arg(long, env = "PARLEY_SEARCH_LIMIT", default_value_t = 50)]
    pub search_limit: i64,
}

#[derive(Clone, Debug, Args)]
pub struct DeliveryConfig {
    /// Redis connection URL for the pub/sub bus
    #[arg(long, env = "PARLEY_PUBSUB_URL", default_value = "redis://127.0.0.1:6379")]
    pub pubsub_url: String,

    /// Upper bound on a single outbound publish before it is abandoned
    #[arg(long, env = "PARLEY_PUBLISH_TIMEOUT_MS", default_value_t = 250)]
    pub publish_timeout_ms: u64,

    /// Capacity of the broadcast channel behind each bus subscription
    #[arg(long, env = "PARLEY_BUS_CHANNEL_CAPACITY", default_value_t = 1024)]
    pub bus_channel_capacity: usize,

    /// Capacity of each per-user live-update channel
    #[arg(long, env = "PARLEY_USER_CHANNEL_CAPACITY", default_value_t = 16)]
    pub user_channel_capacity: usize,

    /// How often to reclaim live-update channels with no subscribers
    #[arg(long, env = "PARLEY_CHANNEL_GC_INTERVAL_SECS", default_value_t = 60)]
    pub gc_interval_secs: u64,

    /// Minimum backoff between pub/sub reconnect attempts
    #[arg(long, env = "PARLEY_PUBSUB_MIN_BACKOFF_SECS", default_value_t = 1)]
    pub min_backoff_secs: u64,

    /// Maximum backoff between pub/sub reconnect attempts
    #[arg(long, env = "PARLEY_PUBSUB_MAX_BACKOFF_SECS", default_value_t = 30)]
    pub max_backoff_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct WsConfig {
    /// Size of the outbound frame buffer per gateway session
    #[arg(long, env = "PARLEY_WS_OUTBOUND_BUFFER_SIZE", default_value_t = 32)]
    pub outbound_buffer_size: usize,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces and metrics; telemetry export is disabled when unset
    #[arg(long, env = "PARLEY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "PARLEY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
