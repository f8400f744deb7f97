use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::utils::{duration_to_nanos, get_monotonic_time};

/// Shareable lazy clock that can change rate.
///
/// The clock samples the monotonic time once and then keeps returning it until cleared with
/// [`Clock::clear`] or moved with [`Clock::set_unadjusted`]. Everything computed between two such
/// calls therefore sees one consistent frame time.
#[derive(Debug, Default, Clone)]
pub struct Clock {
    inner: Rc<RefCell<ClockState>>,
}

#[derive(Debug)]
struct ClockState {
    /// Sampled source time, `None` when it must be fetched again.
    sampled: Option<Duration>,
    /// Source time that `adjusted` corresponds to.
    last_seen: Duration,
    /// Rate-adjusted time handed out to animations.
    adjusted: Duration,
    rate: f64,
    complete_instantly: bool,
}

impl Clock {
    /// Creates a clock frozen at `time` until it is moved explicitly.
    pub fn with_time(time: Duration) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ClockState::starting_at(Some(time)))),
        }
    }

    /// Returns the current rate-adjusted time.
    pub fn now(&self) -> Duration {
        self.inner.borrow_mut().adjusted_now()
    }

    /// Returns the current rate-adjusted time in nanoseconds.
    pub fn now_nanos(&self) -> u64 {
        duration_to_nanos(self.now())
    }

    /// Returns the underlying time not adjusted for rate change.
    pub fn now_unadjusted(&self) -> Duration {
        self.inner.borrow_mut().source_now()
    }

    /// Sets the unadjusted clock time.
    pub fn set_unadjusted(&mut self, time: Duration) {
        self.inner.borrow_mut().sampled = Some(time);
    }

    /// Clears the stored time so it's re-fetched again next.
    pub fn clear(&mut self) {
        self.inner.borrow_mut().sampled = None;
    }

    pub fn rate(&self) -> f64 {
        self.inner.borrow().rate
    }

    /// Sets the clock rate, clamped to `0..=1000`.
    pub fn set_rate(&mut self, rate: f64) {
        let mut inner = self.inner.borrow_mut();
        // Settle the time accumulated at the old rate first.
        inner.adjusted_now();
        inner.rate = rate.clamp(0., 1000.);
    }

    /// Returns whether animations should complete instantly.
    pub fn should_complete_instantly(&self) -> bool {
        self.inner.borrow().complete_instantly
    }

    pub fn set_complete_instantly(&mut self, value: bool) {
        self.inner.borrow_mut().complete_instantly = value;
    }
}

impl PartialEq for Clock {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Clock {}

impl ClockState {
    fn starting_at(sampled: Option<Duration>) -> Self {
        let time = sampled.unwrap_or_else(get_monotonic_time);
        Self {
            sampled: Some(time),
            last_seen: time,
            adjusted: time,
            rate: 1.,
            complete_instantly: false,
        }
    }

    fn source_now(&mut self) -> Duration {
        *self.sampled.get_or_insert_with(get_monotonic_time)
    }

    fn adjusted_now(&mut self) -> Duration {
        let time = self.source_now();
        if time == self.last_seen {
            return self.adjusted;
        }

        if self.last_seen < time {
            let delta = (time - self.last_seen).mul_f64(self.rate);
            self.adjusted = self.adjusted.saturating_add(delta);
        } else {
            let delta = (self.last_seen - time).mul_f64(self.rate);
            self.adjusted = self.adjusted.saturating_sub(delta);
        }

        self.last_seen = time;
        self.adjusted
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::starting_at(None)
    }
}
