use std::time::{Duration, TryFromFloatSecsError};

/// Fixed pause awaited before each remote call, keeping request bursts under
/// the API quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestThrottle {
    delay: Duration,
}

impl RequestThrottle {
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    pub fn new(delay: Duration) -> Self {
        RequestThrottle { delay }
    }

    /// Fails on negative, NaN or overflowing values.
    pub fn from_secs_f64(secs: f64) -> Result<Self, TryFromFloatSecsError> {
        Duration::try_from_secs_f64(secs).map(Self::new)
    }

    /// No pause at all.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        tracing::trace!("Waiting {:?} before the next request", self.delay);
        tokio::time::sleep(self.delay).await;
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs_f64() {
        assert_eq!(
            RequestThrottle::from_secs_f64(0.25).unwrap().delay(),
            Duration::from_millis(250)
        );
        assert!(RequestThrottle::from_secs_f64(-1.0).is_err());
        assert!(RequestThrottle::from_secs_f64(f64::NAN).is_err());
        assert_eq!(RequestThrottle::default().delay(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_the_delay() {
        let throttle = RequestThrottle::from_secs_f64(1.5).unwrap();
        let start = tokio::time::Instant::now();

        throttle.wait().await;
        throttle.wait().await;

        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
