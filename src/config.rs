use crate::cache::DEFAULT_FRESHNESS_MINUTES;
use chrono::Duration;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "monthly_tz.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_path: PathBuf,
    pub cache_ttl: Duration,
    pub allowlist_path: Option<PathBuf>,
    pub user: Option<String>,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            cache_ttl: Duration::minutes(DEFAULT_FRESHNESS_MINUTES),
            allowlist_path: None,
            user: None,
            log_json: false,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_path: env_nonempty("MONTHLY_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            cache_ttl: Duration::minutes(env_i64(
                "MONTHLY_CACHE_TTL_MINUTES",
                DEFAULT_FRESHNESS_MINUTES,
            )),
            allowlist_path: env_nonempty("MONTHLY_ALLOWLIST_PATH").map(PathBuf::from),
            user: env_nonempty("MONTHLY_USER"),
            log_json: env_bool("MONTHLY_LOG_JSON", false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(env_i64("MONTHLY_TEST_UNSET_TTL", 60), 60);
        assert!(!env_bool("MONTHLY_TEST_UNSET_FLAG", false));
        assert_eq!(env_nonempty("MONTHLY_TEST_UNSET_PATH"), None);
        assert_eq!(Config::default().cache_ttl, Duration::minutes(60));
    }
}
