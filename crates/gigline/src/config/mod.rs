use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub distance: DistanceConfig,
    pub media: MediaConfig,
    pub verification: VerificationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let router_url = env::var("DISTANCE_ROUTER_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        let timeout_ms = numeric_var("DISTANCE_TIMEOUT_MS", 1500)?;
        let cache_capacity = numeric_var("DISTANCE_CACHE_CAPACITY", 1024)? as usize;

        let job_folder = env::var("MEDIA_JOB_FOLDER").unwrap_or_else(|_| "jobs".to_string());
        let otp_ttl_secs = numeric_var("OTP_TTL_SECS", 600)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            distance: DistanceConfig {
                router_url,
                timeout: Duration::from_millis(timeout_ms),
                cache_capacity,
            },
            media: MediaConfig { job_folder },
            verification: VerificationConfig {
                code_ttl: Duration::from_secs(otp_ttl_secs),
            },
        })
    }
}

fn numeric_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Route-distance lookups: optional router endpoint, time budget, and memo table size.
#[derive(Debug, Clone)]
pub struct DistanceConfig {
    pub router_url: Option<String>,
    pub timeout: Duration,
    pub cache_capacity: usize,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            router_url: None,
            timeout: Duration::from_millis(1500),
            cache_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub job_folder: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            job_folder: "jobs".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub code_ttl: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name } => {
                write!(f, "{name} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "DISTANCE_ROUTER_URL",
            "DISTANCE_TIMEOUT_MS",
            "DISTANCE_CACHE_CAPACITY",
            "MEDIA_JOB_FOLDER",
            "OTP_TTL_SECS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.distance.router_url.is_none());
        assert_eq!(config.distance.timeout, Duration::from_millis(1500));
        assert_eq!(config.distance.cache_capacity, 1024);
        assert_eq!(config.media.job_folder, "jobs");
        assert_eq!(config.verification.code_ttl, Duration::from_secs(600));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn router_url_is_trimmed_and_numeric_settings_validated() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("DISTANCE_ROUTER_URL", " http://osrm.local:5000/ ");
        env::set_var("DISTANCE_TIMEOUT_MS", "250");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.distance.router_url.as_deref(),
            Some("http://osrm.local:5000")
        );
        assert_eq!(config.distance.timeout, Duration::from_millis(250));

        env::set_var("DISTANCE_TIMEOUT_MS", "soon");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { name }) => assert_eq!(name, "DISTANCE_TIMEOUT_MS"),
            other => panic!("expected invalid number error, got {other:?}"),
        }
        reset_env();
    }
}
