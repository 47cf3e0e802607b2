use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Key lookup used to build a [`Config`]. The process environment in
/// production, a fixed map in tests.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled key: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_opt(lookup: Lookup<'_>, profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = lookup(&prefixed) {
            return Some(v);
        }
    }
    lookup(key)
}

fn profiled_or(lookup: Lookup<'_>, profile: &str, key: &str, default: &str) -> String {
    profiled_opt(lookup, profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_parse<T: std::str::FromStr>(lookup: Lookup<'_>, profile: &str, key: &str, default: T) -> T {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub timings: OperationTimings,
    pub dispatch: DispatchConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `CALC_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_lookup("CALC_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        Self::from_lookup(profile, &env_lookup)
    }

    /// Build config from an arbitrary key source.
    pub fn from_lookup(profile: &str, lookup: Lookup<'_>) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_lookup(lookup, p),
            timings: OperationTimings::from_lookup(lookup, p),
            dispatch: DispatchConfig::from_lookup(lookup, p),
            agent: AgentConfig::from_lookup(lookup, p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   addr={}", self.server.addr());
        tracing::info!(
            "  timings:  +={}ms -={}ms *={}ms /={}ms",
            self.timings.addition_ms,
            self.timings.subtraction_ms,
            self.timings.multiplication_ms,
            self.timings.division_ms
        );
        tracing::info!(
            "  dispatch: queue_capacity={}, task_timeout_ms={}, reaper_interval_ms={}",
            self.dispatch.queue_capacity,
            self.dispatch.task_timeout_ms,
            self.dispatch.reaper_interval_ms
        );
        tracing::info!(
            "  agent:    server_url={}, computing_power={}",
            self.agent.server_url,
            self.agent.computing_power
        );
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup("", &|_: &str| -> Option<String> { None })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            host: profiled_or(lookup, p, "HOST", "0.0.0.0"),
            port: profiled_parse(lookup, p, "PORT", 8080),
            cors_origin: profiled_or(lookup, p, "CORS_ORIGIN", "*"),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Per-operation simulated compute time ──────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTimings {
    pub addition_ms: u64,
    pub subtraction_ms: u64,
    pub multiplication_ms: u64,
    pub division_ms: u64,
}

impl OperationTimings {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            addition_ms: profiled_parse(lookup, p, "TIME_ADDITION_MS", 1000),
            subtraction_ms: profiled_parse(lookup, p, "TIME_SUBTRACTION_MS", 1000),
            multiplication_ms: profiled_parse(lookup, p, "TIME_MULTIPLICATIONS_MS", 1000),
            division_ms: profiled_parse(lookup, p, "TIME_DIVISIONS_MS", 1000),
        }
    }

    /// All operations take `ms` milliseconds.
    pub fn uniform(ms: u64) -> Self {
        Self {
            addition_ms: ms,
            subtraction_ms: ms,
            multiplication_ms: ms,
            division_ms: ms,
        }
    }

    pub fn for_operation(&self, op: Operation) -> u64 {
        match op {
            Operation::Add => self.addition_ms,
            Operation::Subtract => self.subtraction_ms,
            Operation::Multiply => self.multiplication_ms,
            Operation::Divide => self.division_ms,
        }
    }
}

impl Default for OperationTimings {
    fn default() -> Self {
        Self::uniform(1000)
    }
}

// ── Dispatch queue and reaper ─────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bounded capacity of the ready-task queue.
    pub queue_capacity: usize,
    /// Age after which a `processing` task is re-queued. 0 disables the reaper.
    pub task_timeout_ms: u64,
    pub reaper_interval_ms: u64,
}

impl DispatchConfig {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            queue_capacity: profiled_parse(lookup, p, "TASK_QUEUE_CAPACITY", 100usize).max(1),
            task_timeout_ms: profiled_parse(lookup, p, "TASK_TIMEOUT_MS", 0),
            reaper_interval_ms: profiled_parse(lookup, p, "REAPER_INTERVAL_MS", 1000u64).max(1),
        }
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_ms > 0).then(|| Duration::from_millis(self.task_timeout_ms))
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            task_timeout_ms: 0,
            reaper_interval_ms: 1000,
        }
    }
}

// ── Agent ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub server_url: String,
    /// Number of concurrent workers per agent process.
    pub computing_power: usize,
    pub poll_interval_ms: u64,
}

impl AgentConfig {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            server_url: profiled_or(lookup, p, "CALC_SERVER_URL", "http://localhost:8080"),
            computing_power: profiled_parse(lookup, p, "COMPUTING_POWER", 2usize).max(1),
            poll_interval_ms: profiled_parse(lookup, p, "AGENT_POLL_INTERVAL_MS", 1000),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
