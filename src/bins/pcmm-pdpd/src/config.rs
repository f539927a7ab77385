//! PDP configuration
//!
//! One immutable configuration struct passed into the agent, connections
//! and senders. Populated from the environment by the daemon; library
//! users construct it directly.

use std::time::Duration;

use cops_stack::{COPS_CLIENT_PCMM, COPS_PDP_PORT};

/// PDP configuration
#[derive(Debug, Clone)]
pub struct PdpConfig {
    /// TCP port to listen on
    pub port: u16,

    /// COPS client type accepted from PEPs
    pub client_type: u16,

    /// Keep-alive timer offered in Client-Accept, seconds
    pub ka_timer_secs: u16,

    /// Accounting timer offered in Client-Accept, seconds (0 disables the
    /// accounting timer object entirely)
    pub acct_timer_secs: u16,

    /// How long a caller waits for the report matching a gate transaction
    pub gate_timeout: Duration,

    /// Maximum concurrently connected PEPs
    pub pep_pool_size: usize,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            port: COPS_PDP_PORT,
            client_type: COPS_CLIENT_PCMM,
            ka_timer_secs: 30,
            acct_timer_secs: 0,
            gate_timeout: Duration::from_millis(1000),
            pep_pool_size: 16,
        }
    }
}

impl PdpConfig {
    /// Build a configuration from environment variables, falling back to
    /// the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            port: env_parse("PDP_PORT", defaults.port),
            client_type: defaults.client_type,
            ka_timer_secs: env_parse("PDP_KA_TIMER", defaults.ka_timer_secs),
            acct_timer_secs: env_parse("PDP_ACCT_TIMER", defaults.acct_timer_secs),
            gate_timeout: Duration::from_millis(env_parse(
                "PDP_GATE_TIMEOUT_MS",
                defaults.gate_timeout.as_millis() as u64,
            )),
            pep_pool_size: env_parse("PDP_PEP_POOL", defaults.pep_pool_size),
        }
    }
}
