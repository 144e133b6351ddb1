//! Connection state machine with exponential backoff.
//!
//! ```text
//! Disconnected ─► Connecting ─(ok)─► Connected ─(lost)─┐
//!                   ▲    │                              │
//!                   │    └─(error)─► Backoff ◄──────────┘
//!                   └──(delay elapsed)──┘ │
//!                                         └─(max attempts)─► Disconnected
//! ```

use std::time::Duration;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    #[serde(rename_all = "camelCase")]
    Backoff {
        attempt: u32,
        #[serde(rename = "delayMs", serialize_with = "serialize_millis")]
        delay: Duration,
    },
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Consecutive failures before giving up; 0 retries forever.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

#[derive(Debug)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    state: ConnectionState,
    failures: u32,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            failures: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn begin_connect(&mut self) -> ConnectionState {
        self.state = ConnectionState::Connecting;
        self.state
    }

    pub fn on_connected(&mut self) -> ConnectionState {
        self.failures = 0;
        self.state = ConnectionState::Connected;
        self.state
    }

    /// A connect attempt failed or an established connection dropped.
    pub fn on_failure(&mut self) -> ConnectionState {
        self.failures = self.failures.saturating_add(1);
        self.state = if self.policy.max_attempts > 0 && self.failures >= self.policy.max_attempts {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Backoff {
                attempt: self.failures,
                delay: self.policy.delay_for(self.failures),
            }
        };
        self.state
    }

    /// Ran out of attempts.
    pub fn has_given_up(&self) -> bool {
        self.state == ConnectionState::Disconnected && self.failures > 0
    }
}
