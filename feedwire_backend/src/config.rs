use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FeedwireConfig {
    pub api_port: u16,
    pub paths: FeedwirePaths,
    pub feed: FeedConfig,
}

impl FeedwireConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("FEEDWIRE_HOME") {
            Ok(raw) if !raw.trim().is_empty() => FeedwirePaths::from_base_dir(raw.trim())?,
            _ => FeedwirePaths::discover()?,
        };
        let api_port = env::var("FEEDWIRE_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let feed = FeedConfig::from_env();
        Ok(Self {
            api_port,
            paths,
            feed,
        })
    }

    pub fn new(api_port: u16, paths: FeedwirePaths, feed: FeedConfig) -> Self {
        Self {
            api_port,
            paths,
            feed,
        }
    }
}

/// Longest wait `FEEDWIRE_MAX_WAIT_SECS` may configure.
pub const MAX_WAIT_CEILING: Duration = Duration::from_secs(60 * 60);

/// Tunables for pagination and the long-poll waiter.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Fallback re-check interval while a waiter has not been notified.
    pub poll_interval: Duration,
    /// Upper bound on any single wait, whatever the client asks for.
    pub max_wait: Duration,
    pub max_concurrent_waiters: usize,
    pub max_page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(30),
            max_concurrent_waiters: 256,
            max_page_size: 200,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let poll_interval = env::var("FEEDWIRE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        let max_wait = parse_max_wait(env::var("FEEDWIRE_MAX_WAIT_SECS").ok().as_deref())
            .unwrap_or(defaults.max_wait);
        let max_concurrent_waiters = env::var("FEEDWIRE_MAX_WAITERS")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_concurrent_waiters);
        let max_page_size = env::var("FEEDWIRE_MAX_PAGE_SIZE")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_page_size);

        Self {
            poll_interval,
            max_wait,
            max_concurrent_waiters,
            max_page_size,
        }
    }
}

/// Positive whole seconds, capped at [`MAX_WAIT_CEILING`].
fn parse_max_wait(raw: Option<&str>) -> Option<Duration> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::from_secs(secs).min(MAX_WAIT_CEILING))
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeedwirePaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl FeedwirePaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("feedwire.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_base_dir() {
        let paths = FeedwirePaths::from_base_dir("/tmp/feedwire").unwrap();
        assert_eq!(paths.db_path, PathBuf::from("/tmp/feedwire/data/feedwire.db"));
        assert_eq!(paths.logs_dir, PathBuf::from("/tmp/feedwire/logs"));
    }

    #[test]
    fn feed_defaults_bound_the_waiter() {
        let feed = FeedConfig::default();
        assert_eq!(feed.poll_interval, Duration::from_secs(10));
        assert_eq!(feed.max_wait, Duration::from_secs(30));
        assert_eq!(feed.max_concurrent_waiters, 256);
        assert_eq!(feed.max_page_size, 200);
    }

    #[test]
    fn max_wait_is_capped() {
        assert_eq!(parse_max_wait(Some("45")), Some(Duration::from_secs(45)));
        assert_eq!(parse_max_wait(Some(&u64::MAX.to_string())), Some(MAX_WAIT_CEILING));
        assert_eq!(parse_max_wait(Some("0")), None);
        assert_eq!(parse_max_wait(Some("soon")), None);
        assert_eq!(parse_max_wait(None), None);
    }
}
