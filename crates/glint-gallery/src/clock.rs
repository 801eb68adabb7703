/// Frame timer fed with millisecond timestamps (e.g. `performance.now()` or the
/// `requestAnimationFrame` argument).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clock {
    last_ms: Option<f64>,
    elapsed: f64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now_ms: f64) {
        self.last_ms = Some(now_ms);
        self.elapsed = 0.0;
    }

    pub fn is_started(&self) -> bool {
        self.last_ms.is_some()
    }

    /// Seconds since the previous call (or since `start`). The first call on an unstarted
    /// clock starts it and returns 0.
    pub fn delta(&mut self, now_ms: f64) -> f32 {
        let Some(last) = self.last_ms.replace(now_ms) else {
            return 0.0;
        };
        let diff = ((now_ms - last) / 1000.0).max(0.0);
        self.elapsed += diff;
        diff as f32
    }

    /// Seconds accumulated by `delta` since `start`.
    pub fn elapsed(&self) -> f32 {
        self.elapsed as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_and_elapsed() {
        let mut clock = Clock::new();
        assert_eq!(clock.delta(500.0), 0.0);
        assert!(clock.is_started());
        assert_eq!(clock.delta(750.0), 0.25);
        assert_eq!(clock.delta(1750.0), 1.0);
        assert_eq!(clock.elapsed(), 1.25);

        clock.start(10_000.0);
        assert_eq!(clock.elapsed(), 0.0);
        assert_eq!(clock.delta(10_500.0), 0.5);
    }

    #[test]
    fn time_never_runs_backwards() {
        let mut clock = Clock::new();
        clock.start(100.0);
        assert_eq!(clock.delta(50.0), 0.0);
        assert_eq!(clock.elapsed(), 0.0);
    }
}
