use rand::Rng;
use std::time::Duration;

/// Randomized inter-request delay applied before every outbound
/// provider call, to stay under upstream throttling radar.
#[derive(Debug, Clone)]
pub struct RandomDelay {
    min: Duration,
    max: Duration,
}

impl RandomDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if max < min { (max, min) } else { (min, max) };
        Self { min, max }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    /// No-op delay, used in tests.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn pick(&self) -> Duration {
        let span = self.max.saturating_sub(self.min).as_millis() as u64;
        if span == 0 {
            return self.min;
        }
        self.min + Duration::from_millis(rand::thread_rng().gen_range(0..=span))
    }

    pub async fn wait(&self) {
        let delay = self.pick();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_within_bounds() {
        let delay = RandomDelay::from_millis(100, 300);
        for _ in 0..50 {
            let d = delay.pick();
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_swapped_bounds_are_normalized() {
        let delay = RandomDelay::from_millis(300, 100);
        let d = delay.pick();
        assert!(d >= Duration::from_millis(100));
        assert!(d <= Duration::from_millis(300));
    }

    #[test]
    fn test_none_is_zero() {
        assert_eq!(RandomDelay::none().pick(), Duration::ZERO);
    }
}
