use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8765;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub memory_file: PathBuf,
    pub default_goal: String,
    /// Cap for `completed_actions`; `None` keeps every record.
    pub completed_actions_cap: Option<usize>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("MEMORY_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("MEMORY_SERVICE_PORT").unwrap_or(DEFAULT_PORT),
            memory_file: env::var("MEMORY_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_memory_file()),
            default_goal: env::var("MEMORY_DEFAULT_GOAL").unwrap_or_default(),
            completed_actions_cap: env::var("MEMORY_COMPLETED_ACTIONS_CAP")
                .ok()
                .and_then(|raw| parse_cap("MEMORY_COMPLETED_ACTIONS_CAP", &raw)),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `~/.ai_context/memory.json`, or relative to the working directory when
/// no home directory is known.
fn default_memory_file() -> PathBuf {
    let base = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(".ai_context").join("memory.json")
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    parse_value(key, &raw)
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

/// A log cap must keep at least one entry.
fn parse_cap(key: &str, raw: &str) -> Option<usize> {
    match parse_value(key, raw)? {
        0 => {
            log::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
        cap => Some(cap),
    }
}
