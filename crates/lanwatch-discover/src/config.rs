//! Configuration for the lanwatch sweep daemon.
//!
//! Loaded from (lowest to highest priority):
//! 1. Built-in defaults
//! 2. A `key=value` config file (`#` starts a comment)
//! 3. `LANWATCH_<KEY>` environment variables
//!
//! Every field is parsed leniently: a value that does not parse leaves the
//! previous value in place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Config file name looked up next to the executable when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.cfg";

/// Prefix of environment overrides, e.g. `LANWATCH_THREADS=32`.
pub const ENV_PREFIX: &str = "LANWATCH";

/// Top-level sweep configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverConfig {
    /// Network address in dotted-quad form (default: 192.168.1.0).
    pub network: String,

    /// Prefix length. Validated by the range calculator, not here.
    pub cidr: i64,

    /// Seconds to sleep between cycles.
    pub interval_secs: u64,

    /// Per-address reachability timeout in seconds.
    pub timeout_secs: u64,

    /// Explicit first offset from the base address, or negative for none.
    pub start_host: i64,

    /// Explicit last offset from the base address, or negative for none.
    pub end_host: i64,

    /// Concurrent probe workers, always at least 1.
    pub threads: usize,

    /// Append-only per-cycle audit trail.
    pub history_file: PathBuf,

    /// Append-only added/removed log.
    pub changes_file: PathBuf,

    /// Snapshot of the currently live devices, overwritten every cycle.
    pub last_seen_file: PathBuf,

    /// Vendor prefix table.
    pub oui_file: PathBuf,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            network: "192.168.1.0".to_string(),
            cidr: 24,
            interval_secs: 60,
            timeout_secs: 1,
            start_host: -1,
            end_host: -1,
            threads: 10,
            history_file: PathBuf::from("discoveries.txt"),
            changes_file: PathBuf::from("changes.txt"),
            last_seen_file: PathBuf::from("last_seen.txt"),
            oui_file: PathBuf::from("oui.txt"),
        }
    }
}

/// Environment overrides, one optional raw string per recognized key.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    network: Option<String>,
    cidr: Option<String>,
    interval: Option<String>,
    timeout: Option<String>,
    start_host: Option<String>,
    end_host: Option<String>,
    threads: Option<String>,
    history_file: Option<String>,
    changes_file: Option<String>,
    last_seen_file: Option<String>,
    oui_file: Option<String>,
}

impl EnvOverrides {
    fn from_environment(env: config::Environment) -> Self {
        let built = config::Config::builder().add_source(env).build();
        match built.and_then(|c| c.try_deserialize::<EnvOverrides>()) {
            Ok(overrides) => overrides,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable environment overrides");
                Self::default()
            }
        }
    }

    fn into_pairs(self) -> Vec<(&'static str, String)> {
        [
            ("network", self.network),
            ("cidr", self.cidr),
            ("interval", self.interval),
            ("timeout", self.timeout),
            ("start_host", self.start_host),
            ("end_host", self.end_host),
            ("threads", self.threads),
            ("history_file", self.history_file),
            ("changes_file", self.changes_file),
            ("last_seen_file", self.last_seen_file),
            ("oui_file", self.oui_file),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

impl DiscoverConfig {
    /// Load the config file at `path`, then environment overrides, and
    /// resolve relative file paths against the config file's directory.
    ///
    /// A missing or unreadable file is logged and the defaults are kept.
    pub fn load(path: &Path) -> Self {
        let env = config::Environment::with_prefix(ENV_PREFIX);
        Self::load_with_env(path, env)
    }

    pub(crate) fn load_with_env(path: &Path, env: config::Environment) -> Self {
        let mut cfg = Self::default();

        match fs::read_to_string(path) {
            Ok(text) => cfg.apply_text(&text),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Could not open config file, using defaults"
            ),
        }

        for (key, value) in EnvOverrides::from_environment(env).into_pairs() {
            tracing::debug!(key, value = %value, "Applying environment override");
            cfg.set(key, &value);
        }

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        cfg.resolve_paths(base);
        cfg
    }

    /// Apply `key=value` lines. Blank lines, lines without `=` and unknown
    /// keys are skipped.
    pub fn apply_text(&mut self, text: &str) {
        for raw in text.lines() {
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            self.set(key.trim(), value.trim());
        }
    }

    /// Set a single recognized key. Returns `false` for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match key {
            "network" => self.network = value.to_string(),
            "cidr" => set_parsed(&mut self.cidr, value),
            "interval" => set_parsed(&mut self.interval_secs, value),
            "timeout" => set_parsed(&mut self.timeout_secs, value),
            "start_host" => set_parsed(&mut self.start_host, value),
            "end_host" => set_parsed(&mut self.end_host, value),
            "threads" => {
                if let Ok(n) = value.parse::<i64>() {
                    self.threads = n.max(1) as usize;
                }
            }
            "history_file" => self.history_file = PathBuf::from(value),
            "changes_file" => self.changes_file = PathBuf::from(value),
            "last_seen_file" => self.last_seen_file = PathBuf::from(value),
            "oui_file" => self.oui_file = PathBuf::from(value),
            _ => return false,
        }
        true
    }

    /// Join every relative file path onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.history_file,
            &mut self.changes_file,
            &mut self.last_seen_file,
            &mut self.oui_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// The config path used when none is given on the command line.
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) {
    if let Ok(parsed) = value.parse() {
        *slot = parsed;
    }
}
