use std::{env, time::Duration};

// All tunables are plain injected structs: construct once, hand to the
// component. `from_env` exists for binaries that want `.env`/environment
// overrides; libraries and tests just build the struct they need.

/// Tunables for the stats stream client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Push endpoint address, `host:port`.
    pub addr: String,
    /// Cadence of outbound `ping` frames while connected.
    pub keepalive_interval: Duration,
    /// First reconnect delay; doubles per failed attempt.
    pub base_backoff: Duration,
    /// Ceiling for the doubled delay.
    pub max_backoff: Duration,
    /// Reconnects to attempt before giving up until an explicit re-enable.
    pub max_reconnect_attempts: u32,
    /// Most-recent activity entries kept in memory.
    pub activity_cap: usize,
    pub connect_timeout: Duration,
    /// Capacity of the broadcast channel carrying stream events.
    pub event_buffer_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:4710".to_string(),
            keepalive_interval: Duration::from_secs(25),
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(30_000),
            max_reconnect_attempts: 5,
            activity_cap: 20,
            connect_timeout: Duration::from_secs(10),
            event_buffer_capacity: 100,
        }
    }
}

impl StreamConfig {
    /// Defaults with just the endpoint address filled in.
    pub fn for_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden from the environment (a `.env` file is honoured
    /// when present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            addr: parse_string("TONEARM_STATS_ADDR", &defaults.addr),
            keepalive_interval: parse_secs("TONEARM_KEEPALIVE_SECS", defaults.keepalive_interval),
            base_backoff: parse_millis("TONEARM_BASE_BACKOFF_MS", defaults.base_backoff),
            max_backoff: parse_millis("TONEARM_MAX_BACKOFF_MS", defaults.max_backoff),
            max_reconnect_attempts: parse_u32(
                "TONEARM_MAX_RECONNECTS",
                defaults.max_reconnect_attempts,
            ),
            activity_cap: parse_usize("TONEARM_ACTIVITY_CAP", defaults.activity_cap),
            connect_timeout: parse_secs("TONEARM_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            event_buffer_capacity: parse_usize(
                "TONEARM_EVENT_BUFFER_CAPACITY",
                defaults.event_buffer_capacity,
            ),
        }
    }
}

/// Tunables for the play-event reporter.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// URL receiving POSTed play-event batches.
    pub endpoint: String,
    /// Longest an event waits in the buffer before a flush is forced.
    pub flush_interval: Duration,
    /// Buffered events that trigger an immediate flush.
    pub batch_max: usize,
    /// Hard cap on buffered events; past it the oldest are dropped.
    pub buffer_cap: usize,
    pub request_timeout: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:4711/api/plays".to_string(),
            flush_interval: Duration::from_secs(5),
            batch_max: 20,
            buffer_cap: 256,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ReporterConfig {
    /// Defaults with just the endpoint filled in.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden from the environment (a `.env` file is honoured
    /// when present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            endpoint: parse_string("TONEARM_REPORT_ENDPOINT", &defaults.endpoint),
            flush_interval: parse_secs("TONEARM_REPORT_FLUSH_SECS", defaults.flush_interval),
            batch_max: parse_usize("TONEARM_REPORT_BATCH_MAX", defaults.batch_max),
            buffer_cap: parse_usize("TONEARM_REPORT_BUFFER_CAP", defaults.buffer_cap),
            request_timeout: parse_secs("TONEARM_REPORT_TIMEOUT_SECS", defaults.request_timeout),
        }
    }
}

// helper to read a string with a fallback
fn parse_string(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

// helper to parse usize
fn parse_usize(var: &str, default: usize) -> usize {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// helper to parse u32
fn parse_u32(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// helper to parse seconds into Duration
fn parse_secs(var: &str, default: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

// helper to parse millis into Duration
fn parse_millis(var: &str, default: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
