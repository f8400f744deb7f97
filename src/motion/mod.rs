//! Values that follow an input through a [`MotionSpec`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::bail;
use serde::Serialize;

use crate::animation::{Clock, SpringState};
use crate::frame_clock::FrameTicks;
use crate::spec::{InputDirection, MotionSpec};

pub mod computations;
pub mod gesture;
pub mod guarantee;

use computations::{ComputedFrame, FrameContext, FrameInput, SegmentChangeType};
use gesture::GestureContext;
use guarantee::GuaranteeState;

pub const DEFAULT_STABLE_THRESHOLD: f32 = 0.01;
pub const DEFAULT_LABEL: &str = "MotionValue";

/// Output that follows an input through a [`MotionSpec`], smoothing jumps with springs.
///
/// The value only moves forward when frames are committed, either with [`MotionValue::advance`]
/// or by a driver running [`MotionValue::keep_running`]. Reading the output in between recomputes
/// it from the current input and clock time without committing anything.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct MotionValue {
    inner: Rc<Inner>,
}

struct Inner {
    label: RefCell<String>,
    input: Box<dyn Fn() -> f32>,
    gesture: Rc<dyn GestureContext>,
    clock: Clock,
    spec: RefCell<MotionSpec>,
    stable_threshold: Cell<f32>,
    /// Last committed frame.
    last: RefCell<ComputedFrame>,
    /// Frame computed from the current inputs, until something changes.
    current: RefCell<Option<CachedFrame>>,
    is_driving: Cell<bool>,
}

struct CachedFrame {
    frame: ComputedFrame,
    complete_instantly: bool,
}

/// Snapshot of a committed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameData {
    pub label: String,
    pub input: f32,
    pub direction: InputDirection,
    pub drag_offset: f32,
    pub frame_time_nanos: u64,
    pub segment: String,
    pub change: SegmentChangeType,
    pub guarantee: GuaranteeState,
    pub spring_state: SpringState,
    pub output: f32,
    pub output_target: f32,
    pub is_stable: bool,
}

impl MotionValue {
    pub fn new(
        input: impl Fn() -> f32 + 'static,
        gesture: Rc<dyn GestureContext>,
        spec: MotionSpec,
        clock: Clock,
    ) -> Self {
        let frame = FrameInput {
            input: input(),
            direction: gesture.direction(),
            drag_offset: gesture.drag_offset(),
            time_nanos: clock.now_nanos(),
        };
        let last = ComputedFrame::initial(&spec, frame);

        Self {
            inner: Rc::new(Inner {
                label: RefCell::new(String::from(DEFAULT_LABEL)),
                input: Box::new(input),
                gesture,
                clock,
                spec: RefCell::new(spec),
                stable_threshold: Cell::new(DEFAULT_STABLE_THRESHOLD),
                last: RefCell::new(last),
                current: RefCell::new(None),
                is_driving: Cell::new(false),
            }),
        }
    }

    /// Creates a value whose input is `source`'s output.
    ///
    /// The derived value shares the gesture and the clock, but has its own spec and frames, and
    /// needs its own driver.
    pub fn derived(source: &MotionValue, spec: MotionSpec) -> Self {
        let gesture = source.inner.gesture.clone();
        let clock = source.inner.clock.clone();
        let label = format!("{}-derived", source.label());
        let source = source.clone();
        Self::new(move || source.output(), gesture, spec, clock).with_label(label)
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        *self.inner.label.borrow_mut() = label.into();
        self
    }

    /// Sets the displacement and velocity below which the spring is considered at rest.
    pub fn with_stable_threshold(self, threshold: f32) -> Self {
        self.inner.stable_threshold.set(threshold);
        self.invalidate();
        self
    }

    pub fn label(&self) -> String {
        self.inner.label.borrow().clone()
    }

    pub fn stable_threshold(&self) -> f32 {
        self.inner.stable_threshold.get()
    }

    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    pub fn spec(&self) -> MotionSpec {
        self.inner.spec.borrow().clone()
    }

    /// Replaces the spec; the jump it causes is animated with the new spec's reset spring.
    pub fn set_spec(&self, spec: MotionSpec) {
        *self.inner.spec.borrow_mut() = spec;
        self.invalidate();
    }

    pub fn output(&self) -> f32 {
        self.with_current_frame(|frame| frame.output)
    }

    /// Output once all running animations have settled.
    pub fn output_target(&self) -> f32 {
        self.with_current_frame(|frame| frame.output_target)
    }

    pub fn is_stable(&self) -> bool {
        self.with_current_frame(|frame| frame.is_stable)
    }

    /// Commits a frame at the current input and clock time.
    pub fn advance(&self) {
        let frame = self.with_current_frame(ComputedFrame::clone);
        *self.inner.last.borrow_mut() = frame;
        self.invalidate();
    }

    pub fn frame_data(&self) -> FrameData {
        let last = self.inner.last.borrow();
        FrameData {
            label: self.label(),
            input: last.frame.input,
            direction: last.frame.direction,
            drag_offset: last.frame.drag_offset,
            frame_time_nanos: last.frame.time_nanos,
            segment: last.segment.key().to_string(),
            change: last.change,
            guarantee: last.guarantee,
            spring_state: last.spring_state,
            output: last.output,
            output_target: last.output_target,
            is_stable: last.is_stable,
        }
    }

    /// Commits a frame on every tick until the ticks end.
    ///
    /// Fails right away if another driver is already running for this value.
    pub async fn keep_running(&self, ticks: &FrameTicks) -> anyhow::Result<()> {
        self.keep_running_while(ticks, || true).await
    }

    /// Commits a frame on every tick while `condition` holds.
    ///
    /// `condition` is checked before waiting for each tick. Dropping the returned future stops
    /// driving.
    pub async fn keep_running_while(
        &self,
        ticks: &FrameTicks,
        mut condition: impl FnMut() -> bool,
    ) -> anyhow::Result<()> {
        let _guard = DrivingGuard::acquire(self)?;
        debug!(label = %self.label(), "started driving");

        // Commit the time since the last commit before the first tick.
        self.advance();

        while condition() {
            if ticks.next_frame().await.is_none() {
                break;
            }

            let _span = tracy_client::span!("MotionValue::advance");
            self.advance();
        }

        debug!(label = %self.label(), "stopped driving");
        Ok(())
    }

    fn sample(&self) -> FrameInput {
        let inner = &self.inner;
        FrameInput {
            input: (inner.input)(),
            direction: inner.gesture.direction(),
            drag_offset: inner.gesture.drag_offset(),
            time_nanos: inner.clock.now_nanos(),
        }
    }

    fn invalidate(&self) {
        self.inner.current.borrow_mut().take();
    }

    fn with_current_frame<R>(&self, f: impl FnOnce(&ComputedFrame) -> R) -> R {
        let inner = &self.inner;
        let current = self.sample();
        let complete_instantly = inner.clock.should_complete_instantly();

        if let Some(cached) = &*inner.current.borrow() {
            if cached.frame.frame == current && cached.complete_instantly == complete_instantly {
                return f(&cached.frame);
            }
        }

        let frame = {
            let spec = inner.spec.borrow();
            let last = inner.last.borrow();
            let label = inner.label.borrow();
            computations::compute_frame(&FrameContext {
                label: &label,
                spec: &spec,
                last: &last,
                current,
                stable_threshold: inner.stable_threshold.get(),
                complete_instantly,
            })
        };

        let result = f(&frame);
        *inner.current.borrow_mut() = Some(CachedFrame {
            frame,
            complete_instantly,
        });
        result
    }
}

impl std::fmt::Debug for MotionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionValue")
            .field("label", &*self.inner.label.borrow())
            .field("spec", &*self.inner.spec.borrow())
            .field("last", &*self.inner.last.borrow())
            .finish_non_exhaustive()
    }
}

struct DrivingGuard {
    inner: Rc<Inner>,
}

impl DrivingGuard {
    fn acquire(value: &MotionValue) -> anyhow::Result<Self> {
        if value.inner.is_driving.replace(true) {
            bail!("{} is already being driven", value.label());
        }
        Ok(Self {
            inner: value.inner.clone(),
        })
    }
}

impl Drop for DrivingGuard {
    fn drop(&mut self) {
        self.inner.is_driving.set(false);
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;
    use std::time::Duration;

    use approx::assert_abs_diff_eq;
    use futures_util::FutureExt;

    use super::gesture::ProvidedGestureContext;
    use super::*;
    use crate::animation::SpringParameters;
    use crate::frame_clock::FrameTicker;
    use crate::spec::{DirectionalBuilder, Mapping, MotionSpecBuilder};

    struct Harness {
        input: Rc<Cell<f32>>,
        clock: Clock,
        value: MotionValue,
    }

    impl Harness {
        fn new(spec: MotionSpec) -> Self {
            let input = Rc::new(Cell::new(0.));
            let clock = Clock::with_time(Duration::ZERO);
            let gesture = Rc::new(ProvidedGestureContext::new(InputDirection::Max, 0.));
            let value = MotionValue::new(
                {
                    let input = input.clone();
                    move || input.get()
                },
                gesture,
                spec,
                clock.clone(),
            );
            Self {
                input,
                clock,
                value,
            }
        }

        fn frame(&mut self, input: f32, time: Duration) {
            self.input.set(input);
            self.clock.set_unadjusted(time);
            self.value.advance();
        }
    }

    fn step_spec() -> MotionSpec {
        let spec = DirectionalBuilder::new(SpringParameters::default(), Mapping::Zero)
            .to_breakpoint(1.)
            .continue_with(Mapping::One)
            .build()
            .unwrap();
        MotionSpecBuilder::new(spec).build()
    }

    #[test]
    fn reading_is_idempotent() {
        let mut h = Harness::new(step_spec());
        h.frame(1.5, Duration::from_millis(16));

        h.clock.set_unadjusted(Duration::from_millis(24));
        let first = h.value.output();
        assert_eq!(h.value.output(), first);
        assert_eq!(h.value.is_stable(), h.value.is_stable());
        assert!(!h.value.is_stable());
        // Reading did not commit.
        assert_eq!(
            h.value.frame_data().frame_time_nanos,
            Duration::from_millis(16).as_nanos() as u64
        );
    }

    #[test]
    fn output_settles_on_target() {
        let mut h = Harness::new(step_spec());
        h.frame(1.5, Duration::from_millis(16));
        assert_eq!(h.value.output_target(), 1.);

        let mut last = h.value.output();
        for i in 2..200 {
            h.frame(1.5, Duration::from_millis(16 * i));
            let output = h.value.output();
            assert!(output <= 1. + 2e-3, "overshoot at frame {i}: {output}");
            last = output;
        }
        assert_eq!(last, 1.);
        assert!(h.value.is_stable());
    }

    #[test]
    fn set_spec_animates_the_jump() {
        let mut h = Harness::new(MotionSpec::identity());
        h.frame(0.5, Duration::from_millis(16));
        assert_eq!(h.value.output(), 0.5);

        h.value.set_spec(MotionSpec::from_mapping(Mapping::Fixed(10.)));
        h.frame(0.5, Duration::from_millis(32));
        let data = h.value.frame_data();
        assert_eq!(data.change, SegmentChangeType::Spec);
        assert_eq!(data.output_target, 10.);
        assert!(data.output < 10.);
    }

    #[test]
    fn derived_value_follows_source() {
        let mut h = Harness::new(step_spec());
        let doubled = MotionSpec::from_mapping(Mapping::linear(2., 0.));
        let derived = MotionValue::derived(&h.value, doubled).with_stable_threshold(0.001);
        assert_eq!(derived.label(), "MotionValue-derived");
        assert_eq!(derived.stable_threshold(), 0.001);

        h.frame(0.5, Duration::from_millis(16));
        derived.advance();
        assert_eq!(derived.output(), 0.);

        h.frame(1.5, Duration::from_millis(32));
        derived.advance();
        assert_abs_diff_eq!(derived.output(), 2. * h.value.output());
    }

    #[test]
    fn complete_instantly() {
        let mut h = Harness::new(step_spec());
        h.clock.set_complete_instantly(true);
        h.frame(1.5, Duration::from_millis(16));
        assert_eq!(h.value.output(), 1.);
        assert!(h.value.is_stable());
    }

    #[test]
    fn complete_instantly_after_reading() {
        let mut h = Harness::new(step_spec());
        h.frame(1.5, Duration::from_millis(16));

        h.clock.set_unadjusted(Duration::from_millis(32));
        assert!(h.value.output() < 1.);
        assert!(!h.value.is_stable());

        h.clock.set_complete_instantly(true);
        h.value.advance();
        let data = h.value.frame_data();
        assert_eq!(data.output, 1.);
        assert!(data.is_stable);
    }

    #[test]
    fn driver_commits_on_ticks() {
        let h = Harness::new(step_spec());
        let mut ticker = FrameTicker::new(h.clock.clone());
        let ticks = ticker.subscribe();

        let mut driver = pin!(h.value.keep_running(&ticks));
        assert!(driver.as_mut().now_or_never().is_none());

        h.input.set(0.5);
        ticker.tick(Duration::from_millis(16));
        assert!(driver.as_mut().now_or_never().is_none());
        let data = h.value.frame_data();
        assert_eq!(data.input, 0.5);
        assert_eq!(data.frame_time_nanos, 16_000_000);

        let second = h.value.keep_running(&ticks).now_or_never();
        assert!(matches!(second, Some(Err(_))));

        drop(ticker);
        assert!(matches!(driver.as_mut().now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn driver_stops_on_condition_and_releases() {
        let h = Harness::new(step_spec());
        let mut ticker = FrameTicker::new(h.clock.clone());
        let ticks = ticker.subscribe();

        let frames = Cell::new(0);
        let mut driver = pin!(h.value.keep_running_while(&ticks, || {
            frames.set(frames.get() + 1);
            frames.get() <= 2
        }));

        assert!(driver.as_mut().now_or_never().is_none());
        ticker.tick(Duration::from_millis(16));
        assert!(driver.as_mut().now_or_never().is_none());
        ticker.tick(Duration::from_millis(32));
        assert!(matches!(driver.as_mut().now_or_never(), Some(Ok(()))));

        // The flag is released, so a new driver may start.
        let again = pin!(h.value.keep_running(&ticks));
        assert!(again.now_or_never().is_none());
    }

    #[test]
    fn dropping_driver_releases() {
        let h = Harness::new(step_spec());
        let mut ticker = FrameTicker::new(h.clock.clone());
        let ticks = ticker.subscribe();

        {
            let driver = pin!(h.value.keep_running(&ticks));
            assert!(driver.now_or_never().is_none());
        }

        let driver = pin!(h.value.keep_running(&ticks));
        assert!(driver.now_or_never().is_none());
        ticker.tick(Duration::from_millis(16));
    }
}
