use tracing::debug;

/// Which image is shown and the progress of a cross-fade to the next one.
///
/// `mix` runs from 1 (current image) to 0 (next image). Navigation while a fade is in
/// flight is ignored. Indices wrap at both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    count: usize,
    current: usize,
    next: usize,
    mix: f32,
    duration: f32,
    elapsed: f32,
    animating: bool,
}

impl Transition {
    /// `count` images, fades lasting `duration` seconds. `count` is at least 1.
    pub fn new(count: usize, duration: f32) -> Self {
        Self {
            count: count.max(1),
            current: 0,
            next: 0,
            mix: 1.0,
            duration,
            elapsed: 0.0,
            animating: false,
        }
    }

    pub fn next(&mut self) -> bool {
        let target = (self.current + 1) % self.count;
        self.begin(target)
    }

    pub fn previous(&mut self) -> bool {
        let target = (self.current + self.count - 1) % self.count;
        self.begin(target)
    }

    fn begin(&mut self, target: usize) -> bool {
        if self.animating {
            return false;
        }
        debug!(from = self.current, to = target, "transition started");
        self.next = target;
        self.elapsed = 0.0;
        self.animating = true;
        true
    }

    /// Advance by `dt` seconds. Returns `true` on the frame the fade completes.
    pub fn update(&mut self, dt: f32) -> bool {
        if !self.animating {
            return false;
        }
        self.elapsed += dt.max(0.0);
        if self.elapsed >= self.duration {
            self.current = self.next;
            self.mix = 1.0;
            self.elapsed = 0.0;
            self.animating = false;
            return true;
        }
        self.mix = 1.0 - self.elapsed / self.duration;
        false
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Image being faded in; equal to `current()` when idle.
    pub fn upcoming(&self) -> usize {
        if self.animating {
            self.next
        } else {
            self.current
        }
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn image_count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_runs_to_completion_then_promotes() {
        let mut t = Transition::new(3, 1.0);
        assert!(t.next());
        assert_eq!((t.current(), t.upcoming()), (0, 1));

        assert!(!t.update(0.25));
        assert!((t.mix() - 0.75).abs() < 1e-6);
        assert!(!t.update(0.5));
        assert!((t.mix() - 0.25).abs() < 1e-6);

        assert!(t.update(0.3));
        assert_eq!(t.current(), 1);
        assert_eq!(t.mix(), 1.0);
        assert!(!t.is_animating());
    }

    #[test]
    fn navigation_is_ignored_mid_fade() {
        let mut t = Transition::new(3, 1.0);
        assert!(t.next());
        assert!(!t.next());
        assert!(!t.previous());
        assert_eq!(t.upcoming(), 1);
    }

    #[test]
    fn indices_wrap() {
        let mut t = Transition::new(3, 0.1);
        t.previous();
        t.update(1.0);
        assert_eq!(t.current(), 2);
        t.next();
        t.update(1.0);
        assert_eq!(t.current(), 0);
    }

    #[test]
    fn single_image_fades_into_itself() {
        let mut t = Transition::new(1, 0.5);
        assert!(t.next());
        assert_eq!(t.upcoming(), 0);
        assert!(t.update(0.5));
        assert_eq!(t.current(), 0);
    }
}
