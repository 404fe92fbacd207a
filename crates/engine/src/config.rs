//! Runtime configuration from environment variables.
//!
//! - `RELAY_WORKFLOWS_PATH`: workflow definition file (default: `workflows.json`)
//! - `RELAY_HINT_CEILING`: depth at which proxy hints stop propagating (default: 3)
//! - `RELAY_HINT_BACKOFF_FACTOR`: multiplier for recursive hint backoff (default: 1.0)
//! - `RELAY_HINT_HOLD_MS`: how long a cold hint receiver holds before answering (default: 0)
//! - `RELAY_HTTP_TIMEOUT_MS`: timeout of outbound HTTP calls (default: 30000)
//! - `RELAY_MONITOR_URL`: report endpoint (optional)
//! - `RELAY_NTP_SERVER`: `host:port` of an SNTP server for clock correction (optional)
//! - `RELAY_OW_AUTH_KEY`, `RELAY_OW_AUTH_PASSWORD`: OpenWhisk basic auth (optional)
//! - `RELAY_BIND`: HTTP bind address (default: `0.0.0.0:8080`)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::hint::{HintConfig, DEFAULT_HINT_CEILING};

pub const DEFAULT_WORKFLOWS_PATH: &str = "workflows.json";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub workflows_path: PathBuf,
    pub hint: HintConfig,
    pub hint_hold: Duration,
    pub http_timeout: Duration,
    pub monitor_url: Option<String>,
    pub ntp_server: Option<String>,
    pub openwhisk_auth: Option<(String, String)>,
    pub bind: SocketAddr,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workflows_path: PathBuf::from(DEFAULT_WORKFLOWS_PATH),
            hint: HintConfig::default(),
            hint_hold: Duration::ZERO,
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            monitor_url: None,
            ntp_server: None,
            openwhisk_auth: None,
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl RuntimeConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workflows_path = get("RELAY_WORKFLOWS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKFLOWS_PATH));

        let ceiling = parse_or(&get, "RELAY_HINT_CEILING", DEFAULT_HINT_CEILING)?;
        if ceiling == 0 {
            bail!("RELAY_HINT_CEILING must be at least 1");
        }

        let backoff_factor = parse_or(&get, "RELAY_HINT_BACKOFF_FACTOR", 1.0_f64)?;
        if !backoff_factor.is_finite() || backoff_factor < 0.0 {
            bail!("RELAY_HINT_BACKOFF_FACTOR must be a finite, non-negative number");
        }

        let hint_hold = Duration::from_millis(parse_or(&get, "RELAY_HINT_HOLD_MS", 0_u64)?);

        let timeout_ms = parse_or(&get, "RELAY_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            bail!("RELAY_HTTP_TIMEOUT_MS must be greater than zero");
        }

        let openwhisk_auth = match (get("RELAY_OW_AUTH_KEY"), get("RELAY_OW_AUTH_PASSWORD")) {
            (Some(key), Some(password)) => Some((key, password)),
            (None, None) => None,
            _ => bail!("RELAY_OW_AUTH_KEY and RELAY_OW_AUTH_PASSWORD must be set together"),
        };

        let bind = get("RELAY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind = SocketAddr::from_str(&bind).context("invalid RELAY_BIND format")?;

        Ok(Self {
            workflows_path,
            hint: HintConfig {
                ceiling,
                backoff_factor,
            },
            hint_hold,
            http_timeout: Duration::from_millis(timeout_ms),
            monitor_url: get("RELAY_MONITOR_URL"),
            ntp_server: get("RELAY_NTP_SERVER"),
            openwhisk_auth,
            bind,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<RuntimeConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = load(&[
            ("RELAY_WORKFLOWS_PATH", "/etc/relay/wf.json"),
            ("RELAY_HINT_CEILING", " 5 "),
            ("RELAY_HINT_BACKOFF_FACTOR", "0.5"),
            ("RELAY_HINT_HOLD_MS", "200"),
            ("RELAY_MONITOR_URL", "https://monitor.example/reports"),
            ("RELAY_OW_AUTH_KEY", "key"),
            ("RELAY_OW_AUTH_PASSWORD", "secret"),
            ("RELAY_BIND", "127.0.0.1:9000"),
        ])
        .unwrap();

        assert_eq!(config.workflows_path, PathBuf::from("/etc/relay/wf.json"));
        assert_eq!(config.hint.ceiling, 5);
        assert_eq!(config.hint.backoff_factor, 0.5);
        assert_eq!(config.hint_hold, Duration::from_millis(200));
        assert_eq!(config.monitor_url.as_deref(), Some("https://monitor.example/reports"));
        assert_eq!(config.openwhisk_auth, Some(("key".into(), "secret".into())));
        assert_eq!(config.bind.port(), 9000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(load(&[("RELAY_HINT_CEILING", "0")]).is_err());
        assert!(load(&[("RELAY_HINT_CEILING", "three")]).is_err());
        assert!(load(&[("RELAY_HINT_BACKOFF_FACTOR", "-1")]).is_err());
        assert!(load(&[("RELAY_HINT_BACKOFF_FACTOR", "NaN")]).is_err());
        assert!(load(&[("RELAY_HTTP_TIMEOUT_MS", "0")]).is_err());
        assert!(load(&[("RELAY_BIND", "nowhere")]).is_err());
        assert!(load(&[("RELAY_OW_AUTH_KEY", "key")]).is_err());
    }
}
