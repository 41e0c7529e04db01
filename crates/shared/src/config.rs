use std::collections::HashSet;
use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bind_addr: String,
    pub ledger_base_url: String,
    pub ledger_api_token: String,
    pub ocr_url: Option<String>,
    pub allowed_operator_ids: HashSet<i64>,
    pub allowed_phone_numbers: HashSet<String>,
    pub cache_refresh_seconds: u64,
    pub archive_threshold: usize,
    pub archive_retain: usize,
    pub session_idle_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env::var("BOT_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            ledger_base_url: require_env("LEDGER_BASE_URL")?,
            ledger_api_token: require_env("LEDGER_API_TOKEN")?,
            ocr_url: env::var("OCR_URL").ok().filter(|url| !url.trim().is_empty()),
            allowed_operator_ids: parse_i64_list_env("ALLOWED_OPERATOR_IDS")?,
            allowed_phone_numbers: parse_phone_list_env("ALLOWED_PHONE_NUMBERS"),
            cache_refresh_seconds: parse_u64_env("CACHE_REFRESH_SECONDS", 300)?,
            archive_threshold: parse_usize_env("ARCHIVE_THRESHOLD", 1000)?,
            archive_retain: parse_usize_env("ARCHIVE_RETAIN", 100)?,
            session_idle_seconds: parse_u64_env("SESSION_IDLE_SECONDS", 1800)?,
        })
    }
}

/// Phone numbers are compared digits-only so that `+7 901 ...` and
/// `7901...` refer to the same operator.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_usize_env(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_i64_list_env(key: &str) -> Result<HashSet<i64>, ConfigError> {
    let raw = env::var(key).unwrap_or_default();
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| ConfigError::ParseInt(key.to_string()))
        })
        .collect()
}

fn parse_phone_list_env(key: &str) -> HashSet<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(normalize_phone)
        .filter(|phone| !phone.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize_phone;

    #[test]
    fn phone_normalization_keeps_digits_only() {
        assert_eq!(normalize_phone("+7 (901) 234-56-78"), "79012345678");
        assert_eq!(normalize_phone("79012345678"), "79012345678");
        assert_eq!(normalize_phone("ext."), "");
    }
}
