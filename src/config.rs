//! Configuration module for StatusBoard.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Dependency endpoints and credentials are optional: a probe whose settings
//! are missing reports its service as down instead of failing startup.

use chrono::Duration as ChronoDuration;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::store::WindowLimits;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Time between background sampling cycles (default: 300s)
    pub sample_interval: Duration,
    /// Maximum age of retained history, in hours (default: 24)
    pub history_hours: i64,
    /// Maximum retained samples per service (default: 288)
    pub history_max_points: usize,
    pub probes: ProbeSettings,
}

/// Endpoints, credentials and deadline shared by the probes.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Hard deadline for a single probe (default: 10s)
    pub timeout: Duration,
    pub mongodb_uri: Option<String>,
    pub redis: RedisSettings,
    pub orchestration_url: Option<String>,
    pub services_url: Option<String>,
    pub crons_url: Option<String>,
    pub frontend_url: Option<String>,
    pub gemini: GeminiSettings,
    pub openai: OpenAiSettings,
    pub azure_openai: AzureOpenAiSettings,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub key: Option<String>,
    pub tls: bool,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AzureOpenAiSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            sample_interval: Duration::from_secs(300),
            history_hours: 24,
            history_max_points: 288,
            probes: ProbeSettings::default(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            mongodb_uri: None,
            redis: RedisSettings {
                host: None,
                port: None,
                username: None,
                key: None,
                tls: true,
            },
            orchestration_url: None,
            services_url: None,
            crons_url: None,
            frontend_url: None,
            gemini: GeminiSettings {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-2.5-flash".to_string(),
            },
            openai: OpenAiSettings {
                api_key: None,
                base_url: "https://api.openai.com".to_string(),
            },
            azure_openai: AzureOpenAiSettings {
                endpoint: None,
                api_key: None,
                api_version: "2023-05-15".to_string(),
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STATUSBOARD_HTTP_PORT`: HTTP port (default: 8080)
    /// - `STATUSBOARD_SAMPLE_INTERVAL_SECS`: sampling period (default: 300)
    /// - `STATUSBOARD_PROBE_TIMEOUT_SECS`: per-probe deadline (default: 10)
    /// - `STATUSBOARD_HISTORY_HOURS`: history retention (default: 24)
    /// - `STATUSBOARD_HISTORY_MAX_POINTS`: samples kept per service (default: 288)
    /// - `STATUSBOARD_{ORCHESTRATION,SERVICES,CRONS,FRONTEND}_URL`: HTTP health endpoints
    /// - `MONGODB_URI`
    /// - `REDIS_URL` (host), `REDIS_PORT`, `REDIS_USERNAME`, `REDIS_KEY`, `REDIS_TLS`
    /// - `GEMINI_API_KEY`, `GEMINI_BASE_URL`, `GEMINI_MODEL`
    /// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`
    /// - `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_API_VERSION`
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&get, "STATUSBOARD_HTTP_PORT") {
            cfg.http_port = port;
        }
        if let Some(secs) = parse_var::<u64, _>(&get, "STATUSBOARD_SAMPLE_INTERVAL_SECS") {
            if secs > 0 {
                cfg.sample_interval = Duration::from_secs(secs);
            }
        }
        if let Some(hours) = parse_var::<i64, _>(&get, "STATUSBOARD_HISTORY_HOURS") {
            if hours > 0 && ChronoDuration::try_hours(hours).is_some() {
                cfg.history_hours = hours;
            } else {
                tracing::warn!("Ignoring out-of-range STATUSBOARD_HISTORY_HOURS: {}", hours);
            }
        }
        if let Some(points) = parse_var::<usize, _>(&get, "STATUSBOARD_HISTORY_MAX_POINTS") {
            if points > 0 {
                cfg.history_max_points = points;
            }
        }

        let probes = &mut cfg.probes;
        if let Some(secs) = parse_var::<f64, _>(&get, "STATUSBOARD_PROBE_TIMEOUT_SECS") {
            match Duration::try_from_secs_f64(secs) {
                Ok(timeout) if !timeout.is_zero() => probes.timeout = timeout,
                _ => tracing::warn!("Ignoring out-of-range STATUSBOARD_PROBE_TIMEOUT_SECS: {}", secs),
            }
        }

        probes.mongodb_uri = get("MONGODB_URI");

        probes.redis.host = get("REDIS_URL");
        probes.redis.port = parse_var(&get, "REDIS_PORT");
        probes.redis.username = get("REDIS_USERNAME");
        probes.redis.key = get("REDIS_KEY");
        if let Some(tls) = parse_var(&get, "REDIS_TLS") {
            probes.redis.tls = tls;
        }

        probes.orchestration_url = get("STATUSBOARD_ORCHESTRATION_URL");
        probes.services_url = get("STATUSBOARD_SERVICES_URL");
        probes.crons_url = get("STATUSBOARD_CRONS_URL");
        probes.frontend_url = get("STATUSBOARD_FRONTEND_URL");

        probes.gemini.api_key = get("GEMINI_API_KEY");
        if let Some(url) = get("GEMINI_BASE_URL") {
            probes.gemini.base_url = url;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            probes.gemini.model = model;
        }

        probes.openai.api_key = get("OPENAI_API_KEY");
        if let Some(url) = get("OPENAI_BASE_URL") {
            probes.openai.base_url = url;
        }

        probes.azure_openai.endpoint = get("AZURE_OPENAI_ENDPOINT");
        probes.azure_openai.api_key = get("AZURE_OPENAI_API_KEY");
        if let Some(version) = get("AZURE_OPENAI_API_VERSION") {
            probes.azure_openai.api_version = version;
        }

        cfg
    }

    /// Retention limits for the store. An unrepresentable `history_hours`
    /// falls back to the default age limit.
    pub fn history_limits(&self) -> WindowLimits {
        let defaults = WindowLimits::default();
        let max_age = ChronoDuration::try_hours(self.history_hours).unwrap_or_else(|| {
            tracing::warn!("history_hours {} is out of range, keeping {}h", self.history_hours, defaults.max_age.num_hours());
            defaults.max_age
        });

        WindowLimits {
            max_age,
            max_points: self.history_max_points,
        }
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Option<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

impl RedisSettings {
    /// Connection URL with percent-encoded credentials, or `None` when host,
    /// port or key is missing or the host is not a valid URL host.
    pub fn connection_url(&self) -> Option<String> {
        let host = self.host.as_deref()?;
        let port = self.port?;
        let key = self.key.as_deref()?;

        let scheme = if self.tls { "rediss" } else { "redis" };
        let mut url = match Url::parse(&format!("{}://{}:{}", scheme, host, port)) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Ignoring invalid Redis host {:?}: {}", host, e);
                return None;
            }
        };

        if let Some(username) = self.username.as_deref() {
            url.set_username(username).ok()?;
        }
        url.set_password(Some(key)).ok()?;
        Some(url.into())
    }
}
