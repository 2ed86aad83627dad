//! Retry policy and per-attempt classification
//!
//! Each attempt ends in one of three decisions:
//! - StopSuccess: the status matches the success pattern
//! - Retry: transport failure, or a non-matching status >= 500, with attempts left
//! - StopFailure: anything else, including a retryable outcome once attempts run out
//!
//! Success patterns are full-match regular expressions over the decimal status
//! code. Compiled patterns are cached by their source string.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use regex::Regex;

use hs_common::{RetryOverrides, SinkError};
use hs_config::{RetryConfig, DEFAULT_SUCCESS_PATTERN};

use crate::backoff::Backoff;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub delay_factor: f64,
    pub jitter: Duration,
    pub success_pattern: String,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.retries,
            initial_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            delay_factor: config.retry_delay_factor,
            jitter: Duration::from_millis(config.retry_jitter_ms),
            success_pattern: config.success_pattern.clone(),
        }
    }
}

impl RetryPolicy {
    /// Copy of this policy with every set override applied
    pub fn with_overrides(&self, overrides: &RetryOverrides) -> Self {
        let mut policy = self.clone();
        if let Some(retries) = overrides.retries {
            policy.max_retries = retries;
        }
        if let Some(ms) = overrides.retry_delay_ms {
            policy.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.retry_max_delay_ms {
            policy.max_delay = Duration::from_millis(ms);
        }
        if let Some(factor) = overrides.retry_delay_factor {
            policy.delay_factor = factor;
        }
        if let Some(ms) = overrides.retry_jitter_ms {
            policy.jitter = Duration::from_millis(ms);
        }
        policy
    }

    pub fn with_success_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.success_pattern = pattern.into();
        self
    }

    /// Upper bound on attempts for one call, the first included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay, self.max_delay, self.delay_factor, self.jitter)
    }
}

/// What one attempt produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Status(u16),
    TransportError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    StopSuccess,
    StopFailure,
    Retry,
}

/// Classifies attempt outcomes, caching compiled success patterns
#[derive(Debug, Default)]
pub struct RetryClassifier {
    patterns: DashMap<String, Arc<Regex>>,
}

impl RetryClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiled full-match regex for `pattern`; an empty pattern means the default
    pub fn pattern(&self, pattern: &str) -> Result<Arc<Regex>, SinkError> {
        let pattern = if pattern.trim().is_empty() {
            DEFAULT_SUCCESS_PATTERN
        } else {
            pattern
        };

        if let Some(regex) = self.patterns.get(pattern) {
            return Ok(regex.value().clone());
        }

        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            SinkError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;
        let regex = Arc::new(regex);
        self.patterns.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    /// Decision for an outcome, ignoring how many attempts remain
    pub fn classify(&self, pattern: &str, outcome: AttemptOutcome) -> Result<RetryDecision, SinkError> {
        match outcome {
            AttemptOutcome::TransportError => Ok(RetryDecision::Retry),
            AttemptOutcome::Status(status) => {
                let regex = self.pattern(pattern)?;
                if regex.is_match(&status.to_string()) {
                    Ok(RetryDecision::StopSuccess)
                } else if status >= 500 {
                    Ok(RetryDecision::Retry)
                } else {
                    Ok(RetryDecision::StopFailure)
                }
            }
        }
    }

    /// Decision for `attempt` (1-based) under `policy`
    pub fn decide(
        &self,
        policy: &RetryPolicy,
        attempt: u32,
        outcome: AttemptOutcome,
    ) -> Result<RetryDecision, SinkError> {
        let decision = self.classify(&policy.success_pattern, outcome)?;
        if decision == RetryDecision::Retry && attempt >= policy.max_attempts() {
            return Ok(RetryDecision::StopFailure);
        }
        Ok(decision)
    }

    pub fn cached_patterns(&self) -> usize {
        self.patterns.len()
    }
}
