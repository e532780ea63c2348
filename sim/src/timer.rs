use std::time::{Duration, Instant};

/// Monotonic time since the scene started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SceneTime(Duration);

impl SceneTime {
    pub const ZERO: SceneTime = SceneTime(Duration::ZERO);

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    #[inline]
    pub const fn elapsed(&self) -> Duration {
        self.0
    }

    #[inline]
    pub fn saturating_add(self, delta: Duration) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

impl std::fmt::Display for SceneTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

pub trait Clock {
    fn now(&self) -> SceneTime;
}

/// Simulated clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    now: SceneTime,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, dt: Duration) -> SceneTime {
        self.now = self.now.saturating_add(dt);
        self.now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SceneTime {
        self.now
    }
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> SceneTime {
        SceneTime(self.start.elapsed())
    }
}

/// A single delayed step. At most one registration is outstanding at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepTimer {
    due: Option<SceneTime>,
}

impl StepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a step due at `now + delay`. Returns `false` and leaves the existing
    /// registration alone if one is already pending.
    pub fn schedule(&mut self, now: SceneTime, delay: Duration) -> bool {
        if self.due.is_some() {
            return false;
        }

        self.due = Some(now.saturating_add(delay));
        true
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    #[inline]
    pub fn due(&self) -> Option<SceneTime> {
        self.due
    }

    #[inline]
    pub fn is_due(&self, now: SceneTime) -> bool {
        self.due.is_some_and(|due| now >= due)
    }

    /// Marks the pending step as run, allowing the next one to be scheduled.
    #[inline]
    pub fn complete(&mut self) {
        self.due = None;
    }

    /// Drops the pending step without running it. Returns whether one was pending.
    #[inline]
    pub fn cancel(&mut self) -> bool {
        self.due.take().is_some()
    }
}
