//! Exponential backoff for transport reconnects.
//!
//! When the link drops or every transport encoding fails to connect,
//! [`ReconnectState`] hands the supervisor increasing, jittered delays until
//! the attempt budget runs out. A successful connect resets it.

use std::time::Duration;

use rand::Rng;

/// Configuration for client-side reconnection behaviour.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before the first reconnection attempt. Default: 1 s.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt. Default: 2.0.
    pub backoff_multiplier: f64,
    /// Maximum delay between reconnection attempts. Default: 30 s.
    pub max_delay: Duration,
    /// Maximum number of consecutive attempts before giving up. Default: 20.
    pub max_attempts: u32,
    /// Jitter factor (0.0–1.0), applied as ±jitter to the delay. Default: 0.25.
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 20,
            jitter: 0.25,
        }
    }
}

impl ReconnectConfig {
    /// Reject settings the backoff math cannot use.
    pub fn validate(&self) -> Result<(), ReconnectError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ReconnectError::InvalidConfig(format!(
                "backoff multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if !self.jitter.is_finite() || !(0.0..=1.0).contains(&self.jitter) {
            return Err(ReconnectError::InvalidConfig(format!(
                "jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(ReconnectError::InvalidConfig(
                "initial delay exceeds the maximum delay".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tracks consecutive attempts and computes the next backoff delay.
#[derive(Debug)]
pub struct ReconnectState {
    config: ReconnectConfig,
    attempts: u32,
    current_delay: Duration,
}

impl ReconnectState {
    pub fn new(config: ReconnectConfig) -> Self {
        let initial = config.initial_delay;
        Self {
            config,
            attempts: 0,
            current_delay: initial,
        }
    }

    /// Compute the next delay and advance the attempt counter.
    /// Returns `None` once max attempts have been exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }

        let base = self.current_delay;
        self.attempts += 1;

        let jittered = if self.config.jitter > 0.0 {
            let jitter = self.config.jitter.min(1.0);
            let factor = rand::rng().random_range((1.0 - jitter)..=(1.0 + jitter));
            base.mul_f64(factor)
        } else {
            base
        };

        let scaled = self.current_delay.as_secs_f64() * self.config.backoff_multiplier;
        let next = Duration::try_from_secs_f64(scaled).unwrap_or(self.config.max_delay);
        self.current_delay = next.min(self.config.max_delay);

        Some(jittered.min(self.config.max_delay))
    }

    /// Reset after a successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current_delay = self.config.initial_delay;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Errors produced by the reconnection system.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// All configured attempts were used without success.
    #[error("maximum reconnection attempts exhausted")]
    MaxAttemptsExhausted,

    #[error("invalid reconnect settings: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_no_jitter() -> ReconnectConfig {
        ReconnectConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_sequence_is_exponential() {
        let mut state = ReconnectState::new(config_no_jitter());

        assert_eq!(state.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(state.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(state.next_delay(), Some(Duration::from_secs(4)));
        assert_eq!(state.next_delay(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn test_max_backoff_is_capped() {
        let mut state = ReconnectState::new(config_no_jitter());

        let mut last_delay = Duration::ZERO;
        for _ in 0..15 {
            if let Some(d) = state.next_delay() {
                last_delay = d;
            }
        }

        assert_eq!(last_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_max_attempts_exhausted() {
        let mut state = ReconnectState::new(ReconnectConfig {
            max_attempts: 3,
            jitter: 0.0,
            ..Default::default()
        });

        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_none());
    }

    #[test]
    fn test_reset_restores_initial_delay() {
        let mut state = ReconnectState::new(config_no_jitter());
        state.next_delay();
        state.next_delay();
        assert_eq!(state.attempts(), 2);

        state.reset();
        assert_eq!(state.attempts(), 0);
        assert_eq!(state.next_delay(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_validate_rejects_unusable_multipliers() {
        for multiplier in [-1.0, 0.5, f64::NAN, f64::INFINITY] {
            let config = ReconnectConfig {
                backoff_multiplier: multiplier,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ReconnectError::InvalidConfig(_))),
                "multiplier {multiplier} accepted"
            );
        }
        assert!(ReconnectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_jitter_and_delays() {
        let jitter = ReconnectConfig {
            jitter: 1.5,
            ..Default::default()
        };
        assert!(jitter.validate().is_err());

        let delays = ReconnectConfig {
            initial_delay: Duration::from_secs(60),
            ..Default::default()
        };
        assert!(delays.validate().is_err());
    }

    #[test]
    fn test_out_of_range_multiplier_does_not_panic() {
        for multiplier in [-1.0, f64::NAN, 1e300] {
            let mut state = ReconnectState::new(ReconnectConfig {
                backoff_multiplier: multiplier,
                ..config_no_jitter()
            });
            assert_eq!(state.next_delay(), Some(Duration::from_secs(1)));
            assert!(state.next_delay().unwrap() <= Duration::from_secs(30));
        }
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..50 {
            let mut state = ReconnectState::new(ReconnectConfig {
                jitter: 0.25,
                ..Default::default()
            });
            let d = state.next_delay().unwrap();
            assert!(d >= Duration::from_millis(750) && d <= Duration::from_millis(1250));
        }
    }
}
