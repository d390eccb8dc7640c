//! Runtime configuration shared by the CLI and the MCP server.
//!
//! Every setting resolves in the same order:
//! 1. Explicit command-line flag
//! 2. `QBANK_*` environment variable
//! 3. Built-in default

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use miette::Diagnostic;
use thiserror::Error;

use crate::backend::{BackendResult, BackendRoutes, HttpJobBackend, JobBackend};
use crate::batch::{BatchOrchestrator, DEFAULT_PER_CALL_CAP, OutputSink, PollPolicy};
use crate::coverage::{ProfileError, ProfileRegistry};

pub const ENV_API_URL: &str = "QBANK_API_URL";
pub const ENV_OUTPUT_DIR: &str = "QBANK_OUTPUT_DIR";
pub const ENV_PROFILES: &str = "QBANK_PROFILES";
pub const ENV_POLL_INTERVAL: &str = "QBANK_POLL_INTERVAL";
pub const ENV_MAX_WAIT: &str = "QBANK_MAX_WAIT";

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}: expected {expected}")]
    #[diagnostic(code(qbank::config::invalid_value))]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Backend base URL (default: QBANK_API_URL env or http://localhost:3000)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Directory batch outputs are written to (default: QBANK_OUTPUT_DIR env or ~/.local/share/qbank/batches)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// YAML file with additional coverage profiles (default: QBANK_PROFILES env)
    #[arg(long, global = true)]
    pub profiles: Option<PathBuf>,

    /// Seconds between status polls (default: QBANK_POLL_INTERVAL env or 30)
    #[arg(long, global = true)]
    pub poll_interval: Option<u64>,

    /// Maximum seconds to wait for a batch job (default: QBANK_MAX_WAIT env or 1800)
    #[arg(long, global = true)]
    pub max_wait: Option<u64>,

    /// Questions requested per call when falling back to single requests
    #[arg(long, global = true)]
    pub per_call_cap: Option<usize>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, global = true)]
    pub request_timeout: Option<u64>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub output_dir: PathBuf,
    pub profiles_path: Option<PathBuf>,
    pub poll: PollPolicy,
    pub per_call_cap: usize,
    pub request_timeout: Duration,
    pub routes: BackendRoutes,
}

impl Settings {
    pub fn resolve(args: &SettingsArgs) -> Result<Self, ConfigError> {
        let defaults = PollPolicy::default();

        let api_url = args
            .api_url
            .clone()
            .or_else(|| env_value(ENV_API_URL))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| env_value(ENV_OUTPUT_DIR).map(PathBuf::from))
            .unwrap_or_else(get_output_dir);
        let profiles_path = args
            .profiles
            .clone()
            .or_else(|| env_value(ENV_PROFILES).map(PathBuf::from));

        let interval = match args.poll_interval {
            Some(secs) => Duration::from_secs(secs),
            None => env_secs(ENV_POLL_INTERVAL)?.unwrap_or(defaults.interval),
        };
        let max_wait = match args.max_wait {
            Some(secs) => Duration::from_secs(secs),
            None => env_secs(ENV_MAX_WAIT)?.unwrap_or(defaults.max_wait),
        };
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "poll interval".to_string(),
                value: "0".to_string(),
                expected: "a positive number of seconds".to_string(),
            });
        }

        Ok(Self {
            api_url,
            output_dir,
            profiles_path,
            poll: PollPolicy::new(interval, max_wait),
            per_call_cap: args.per_call_cap.unwrap_or(DEFAULT_PER_CALL_CAP).max(1),
            request_timeout: Duration::from_secs(
                args.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            routes: BackendRoutes::default(),
        })
    }

    pub fn build_backend(&self) -> BackendResult<HttpJobBackend> {
        HttpJobBackend::new(&self.api_url, self.request_timeout)
    }

    pub fn build_orchestrator<B: JobBackend>(&self, backend: Arc<B>) -> BatchOrchestrator<B> {
        BatchOrchestrator::new(backend, self.routes.clone()).with_per_call_cap(self.per_call_cap)
    }

    pub fn output_sink(&self) -> OutputSink {
        OutputSink::new(&self.output_dir)
    }

    /// Built-in profiles, plus the configured YAML file if any.
    pub fn load_profiles(&self) -> Result<ProfileRegistry, ProfileError> {
        match &self.profiles_path {
            Some(path) => ProfileRegistry::load_yaml(path),
            None => Ok(ProfileRegistry::builtin()),
        }
    }
}

/// XDG data directory for qbank: `$XDG_DATA_HOME/qbank` or
/// `~/.local/share/qbank`, falling back to the system temp dir without HOME.
pub fn get_data_dir() -> PathBuf {
    let data_home = env_value("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| env_value("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(env::temp_dir);

    data_home.join("qbank")
}

/// Default batch output directory (data_dir/batches).
pub fn get_output_dir() -> PathBuf {
    get_data_dir().join("batches")
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(name: &str) -> Result<Option<Duration>, ConfigError> {
    env_value(name)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue {
                    name: name.to_string(),
                    value: raw.clone(),
                    expected: "a whole number of seconds".to_string(),
                })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            for name in [
                ENV_API_URL,
                ENV_OUTPUT_DIR,
                ENV_PROFILES,
                ENV_POLL_INTERVAL,
                ENV_MAX_WAIT,
            ] {
                env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_output_dir_is_under_data_dir() {
        assert!(get_output_dir().ends_with("qbank/batches"));
        assert!(get_data_dir().ends_with("qbank"));
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let settings = Settings::resolve(&SettingsArgs::default()).unwrap();

        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.poll, PollPolicy::default());
        assert_eq!(settings.per_call_cap, DEFAULT_PER_CALL_CAP);
        assert_eq!(settings.profiles_path, None);
        assert_eq!(settings.routes, BackendRoutes::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides_defaults() {
        clear_env();
        unsafe {
            env::set_var(ENV_API_URL, "http://env:9000");
            env::set_var(ENV_OUTPUT_DIR, "/tmp/qbank-env-out");
            env::set_var(ENV_POLL_INTERVAL, "5");
        }

        let settings = Settings::resolve(&SettingsArgs::default()).unwrap();
        assert_eq!(settings.api_url, "http://env:9000");
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/qbank-env-out"));
        assert_eq!(settings.poll.interval, Duration::from_secs(5));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_flags_override_env() {
        clear_env();
        unsafe {
            env::set_var(ENV_API_URL, "http://env:9000");
            env::set_var(ENV_MAX_WAIT, "60");
        }

        let args = SettingsArgs {
            api_url: Some("http://flag:1".to_string()),
            max_wait: Some(10),
            per_call_cap: Some(0),
            ..Default::default()
        };
        let settings = Settings::resolve(&args).unwrap();
        assert_eq!(settings.api_url, "http://flag:1");
        assert_eq!(settings.poll.max_wait, Duration::from_secs(10));
        assert_eq!(settings.per_call_cap, 1);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_number_is_rejected() {
        clear_env();
        unsafe {
            env::set_var(ENV_POLL_INTERVAL, "soon");
        }

        let err = Settings::resolve(&SettingsArgs::default()).unwrap_err();
        assert!(err.to_string().contains(ENV_POLL_INTERVAL));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_poll_interval_is_rejected() {
        clear_env();
        let args = SettingsArgs {
            poll_interval: Some(0),
            ..Default::default()
        };
        assert!(Settings::resolve(&args).is_err());
    }
}
