use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_EXPANSION_WINDOW_DAYS: u32 = 30;
const DEFAULT_ADVANCE_HORIZON_DAYS: u32 = 7;
const DEFAULT_PAYMENT_WAIT_SECS: u64 = 900;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_EVENT_BUFFER: usize = 1024;
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// How many days forward the availability calendar is expanded.
    /// The source rendered 30-60 days.
    #[validate(range(min = 1, max = 366))]
    #[serde(default = "default_expansion_window_days")]
    pub expansion_window_days: u32,

    /// Furthest-ahead date a booking may be made for, inclusive.
    #[validate(range(min = 0, max = 90))]
    #[serde(default = "default_advance_horizon_days")]
    pub advance_horizon_days: u32,

    /// Bound on how long a checkout session may sit in AwaitingPayment
    /// before it is failed and its reservation released.
    #[validate(range(min = 30, max = 86_400))]
    #[serde(default = "default_payment_wait_secs")]
    pub payment_wait_secs: u64,

    /// Interval between sweeps of stale checkout sessions.
    #[validate(range(min = 5, max = 3_600))]
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Bounded event channel size.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// ISO 4217 currency code stamped on payment requests.
    #[validate(length(min = 3, max = 3))]
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Minutes the providers' wall clock runs ahead of UTC. Booking-hour
    /// and same-day cutoffs are evaluated in that clock. Defaults to IST.
    #[validate(range(min = -840, max = 840))]
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_expansion_window_days() -> u32 {
    DEFAULT_EXPANSION_WINDOW_DAYS
}
fn default_advance_horizon_days() -> u32 {
    DEFAULT_ADVANCE_HORIZON_DAYS
}
fn default_payment_wait_secs() -> u64 {
    DEFAULT_PAYMENT_WAIT_SECS
}
fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            expansion_window_days: default_expansion_window_days(),
            advance_horizon_days: default_advance_horizon_days(),
            payment_wait_secs: default_payment_wait_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            event_buffer: default_event_buffer(),
            currency: default_currency(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads configuration from `config/{environment}.toml` (optional),
/// `config/local.toml` (optional), and `APP_`-prefixed environment
/// variables, in that order of precedence.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/local")).required(false))
        .add_source(Environment::with_prefix("APP"))
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    info!(
        environment = %cfg.environment,
        expansion_window_days = cfg.expansion_window_days,
        advance_horizon_days = cfg.advance_horizon_days,
        "configuration loaded"
    );
    Ok(cfg)
}

static TRACING_INIT: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(level: &str, json: bool) {
    TRACING_INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
        if json {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .try_init();
        } else {
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        }
    });
}
