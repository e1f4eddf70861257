use rvstruct::ValueStruct;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, ValueStruct)]
pub struct ImageHostApiKey(String);

#[derive(Debug, Clone, ValueStruct)]
pub struct OcrAccessToken(String);

/// Public URL of an uploaded image, as returned by the image host.
#[derive(Debug, Clone, PartialEq, Eq, ValueStruct)]
pub struct HostedImageRef(Url);

/// Bounded retry with a fixed inter-attempt delay (no backoff).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const MAX_RETRY_COUNT: usize = 4;
    pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        assert!(max_attempts > 0, "Retry attempts should be more than zero");

        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::MAX_RETRY_COUNT, Self::RETRY_DELAY)
    }
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (attempts_str, delay_str) = s
            .split_once('x')
            .ok_or_else(|| format!("Expected <attempts>x<delay>ms, got: {}", s))?;
        let max_attempts = attempts_str
            .parse::<usize>()
            .map_err(|e| format!("Failed to parse attempts in RetryPolicy: {}", e))?;
        if max_attempts == 0 {
            return Err("Retry attempts should be more than zero".to_string());
        }
        let delay_ms = delay_str
            .strip_suffix("ms")
            .ok_or_else(|| format!("Delay should be specified in ms: {}", delay_str))?
            .parse::<u64>()
            .map_err(|e| format!("Failed to parse delay in RetryPolicy: {}", e))?;
        Ok(RetryPolicy::new(
            max_attempts,
            Duration::from_millis(delay_ms),
        ))
    }
}
