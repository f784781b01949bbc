// ============================================================================
// Exchange Configuration
// Settings for the request front end and market bootstrap
// ============================================================================

use std::env;
use std::str::FromStr;

pub const ENV_LISTEN_ADDR: &str = "EXCHANGE_LISTEN_ADDR";
pub const ENV_MAX_FRAME_LEN: &str = "EXCHANGE_MAX_FRAME_LEN";
pub const ENV_LOG: &str = "EXCHANGE_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Address the TCP front end binds to
    pub listen_addr: String,

    /// Largest request frame accepted before the terminator
    pub max_frame_len: usize,

    /// `tracing-subscriber` filter directive
    pub log_filter: String,

    /// Continue offer/deal/user ids after the largest persisted ones
    pub seed_ids_from_store: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5555".to_string(),
            max_frame_len: 4096,
            log_filter: "info".to_string(),
            seed_ids_from_store: true,
        }
    }
}

impl ExchangeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `EXCHANGE_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_LISTEN_ADDR) {
            config.listen_addr = addr;
        }
        if let Some(len) = parse_var(&lookup, ENV_MAX_FRAME_LEN) {
            config.max_frame_len = len;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            config.log_filter = filter;
        }

        config
    }

    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_id_seeding(mut self, enabled: bool) -> Self {
        self.seed_ids_from_store = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.trim().is_empty() {
            return Err("Listen address cannot be empty".to_string());
        }

        if self.max_frame_len == 0 {
            return Err("Max frame length must be positive".to_string());
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        },
    }
}
