use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the data layer.
///
/// Environment variables (binaries may load them from a `.env` file):
/// - API_ADDRESS: address of the remote API (default http://localhost:8000)
/// - SESSION_TOKEN_PATH: file holding the session token. Without it the
///   token is kept in memory only.
/// - MUTATION_RESET_DELAY_MS: how long a successful write stays marked as
///   successful (default 1000)
/// - POLL_INTERVAL_MS: refetch period for polling lists (default 5000)
/// - STALE_TIME_MS: how long a response is served without revalidation
///   (default 0)
/// - WINDOW_PAGE_SIZE: page size for windowed lists (default 50)
#[derive(Debug, Clone)]
pub struct Config {
    pub api_address: String,
    pub token_path: Option<PathBuf>,
    pub mutation_reset_delay: Duration,
    pub poll_interval: Duration,
    pub stale_time: Duration,
    pub window_page_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_address: "http://localhost:8000".to_string(),
            token_path: None,
            mutation_reset_delay: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(5000),
            stale_time: Duration::ZERO,
            window_page_size: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let number = |name: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(name)
                .map(|value| {
                    value.trim().parse::<u64>().map_err(|source| {
                        ConfigError::Invalid {
                            name,
                            value,
                            source,
                        }
                    })
                })
                .transpose()
        };
        let millis = |name, default| {
            Ok::<_, ConfigError>(
                number(name)?.map(Duration::from_millis).unwrap_or(default),
            )
        };

        Ok(Config {
            api_address: lookup("API_ADDRESS")
                .unwrap_or(defaults.api_address),
            token_path: lookup("SESSION_TOKEN_PATH").map(PathBuf::from),
            mutation_reset_delay: millis(
                "MUTATION_RESET_DELAY_MS",
                defaults.mutation_reset_delay,
            )?,
            poll_interval: millis("POLL_INTERVAL_MS", defaults.poll_interval)?,
            stale_time: millis("STALE_TIME_MS", defaults.stale_time)?,
            window_page_size: number("WINDOW_PAGE_SIZE")?
                .unwrap_or(defaults.window_page_size)
                .max(1),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}
