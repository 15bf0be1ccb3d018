use cinepass_order::{CheckoutSettings, PaymentRules, PollPolicy};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub checkout: CheckoutRules,
}

/// Tunables of the checkout flow
#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutRules {
    #[serde(default = "default_poll_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_notify_delay_ms")]
    pub notify_delay_ms: u64,
    #[serde(default = "default_min_amount")]
    pub min_amount: i64,
    #[serde(default = "default_max_amount")]
    pub max_amount: i64,
    #[serde(default = "default_pending_ttl_seconds")]
    pub pending_ttl_seconds: u64,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
    #[serde(default = "default_notify_retention_seconds")]
    pub notify_retention_seconds: u64,
    #[serde(default = "default_session_idle_seconds")]
    pub session_idle_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_poll_attempts() -> u32 { 5 }
fn default_poll_interval_ms() -> u64 { 1_000 }
fn default_notify_delay_ms() -> u64 { 2_000 }
fn default_min_amount() -> i64 { 1_000 }
fn default_max_amount() -> i64 { 50_000_000 }
fn default_pending_ttl_seconds() -> u64 { 900 }
fn default_rate_limit() -> i64 { 100 }
fn default_notify_retention_seconds() -> u64 { 86_400 }
fn default_session_idle_seconds() -> u64 { 1_800 }
fn default_sweep_interval_seconds() -> u64 { 60 }

impl Default for CheckoutRules {
    fn default() -> Self {
        Self {
            poll_max_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            notify_delay_ms: default_notify_delay_ms(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            pending_ttl_seconds: default_pending_ttl_seconds(),
            rate_limit_per_minute: default_rate_limit(),
            notify_retention_seconds: default_notify_retention_seconds(),
            session_idle_seconds: default_session_idle_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl CheckoutRules {
    pub fn settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            poll: PollPolicy {
                max_attempts: self.poll_max_attempts,
                interval: Duration::from_millis(self.poll_interval_ms),
            },
            notify_delay: Duration::from_millis(self.notify_delay_ms),
            notify_retention: Duration::from_secs(self.notify_retention_seconds),
            session_idle_ttl: Duration::from_secs(self.session_idle_seconds),
            rules: PaymentRules {
                min_amount: self.min_amount,
                max_amount: self.max_amount,
                pending_ttl: Duration::from_secs(self.pending_ttl_seconds),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Order/payment backend reached over HTTP
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 { 10_000 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CINEPASS__BACKEND__BASE_URL=http://localhost:8080`
            .add_source(config::Environment::with_prefix("CINEPASS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
