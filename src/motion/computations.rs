//! Per-frame computation of a motion value.
//!
//! One frame runs these stages in order, each one reading the results of the previous ones:
//!
//! 1. [`compute_segment`]: which segment applies to the current input.
//! 2. [`classify_segment_change`]: how it relates to the last frame's segment.
//! 3. [`compute_guarantee_state`]: progress towards the entry breakpoint's guarantee.
//! 4. [`compute_animation`]: the spring animation absorbing any jump in the mapped value.
//! 5. [`compute_spring_state`]: the spring advanced to the current frame time.
//!
//! [`compute_frame`] runs all of them and composes the output.

use serde::Serialize;

use super::guarantee::GuaranteeState;
use crate::animation::{SpringParameters, SpringState};
use crate::spec::{Guarantee, InputDirection, Mapping, MotionSpec, SegmentData, SegmentKey};
use crate::utils::{crossing_fraction, lerp, lerp_nanos};

/// Values sampled from the outside world for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameInput {
    pub input: f32,
    pub direction: InputDirection,
    pub drag_offset: f32,
    pub time_nanos: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentChangeType {
    /// Still in the same segment.
    Same,
    /// Same breakpoints, but the direction flipped.
    SameOppositeDirection,
    /// The segment changed because the direction flipped.
    Direction,
    /// One or more breakpoints were crossed in the same direction.
    Traverse,
    /// The segment changed because the spec was replaced.
    Spec,
}

/// Spring animation smoothing over one jump of the mapped value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiscontinuityAnimation {
    /// Accumulated size of the jumps being animated.
    pub target_value: f32,
    pub spring_start_state: SpringState,
    pub spring_parameters: SpringParameters,
    pub spring_start_time_nanos: u64,
}

impl DiscontinuityAnimation {
    pub const NONE: Self = Self {
        target_value: 0.,
        spring_start_state: SpringState::AT_REST,
        spring_parameters: SpringParameters::SNAP,
        spring_start_time_nanos: 0,
    };

    pub fn is_at_rest(&self) -> bool {
        self.target_value == 0. && self.spring_start_state.is_at_rest()
    }
}

/// Result of one frame, which also becomes the "last frame" of the next one.
#[derive(Debug, Clone)]
pub struct ComputedFrame {
    pub frame: FrameInput,
    pub segment: SegmentData,
    pub change: SegmentChangeType,
    pub guarantee: GuaranteeState,
    pub animation: DiscontinuityAnimation,
    pub spring_state: SpringState,
    pub output: f32,
    pub output_target: f32,
    pub is_stable: bool,
}

impl ComputedFrame {
    /// A frame at rest in the segment `spec` assigns to `frame`.
    pub fn initial(spec: &MotionSpec, frame: FrameInput) -> Self {
        let segment = spec.segment_at_input(frame.input, frame.direction);
        let output = segment.mapping.map(frame.input);
        Self {
            frame,
            segment,
            change: SegmentChangeType::Same,
            guarantee: GuaranteeState::Inactive,
            animation: DiscontinuityAnimation::NONE,
            spring_state: SpringState::AT_REST,
            output,
            output_target: output,
            is_stable: true,
        }
    }
}

/// Everything one frame computation reads.
pub struct FrameContext<'a> {
    pub label: &'a str,
    pub spec: &'a MotionSpec,
    pub last: &'a ComputedFrame,
    pub current: FrameInput,
    pub stable_threshold: f32,
    /// Animations are disabled; every spring resolves immediately.
    pub complete_instantly: bool,
}

impl FrameContext<'_> {
    fn elapsed_secs(&self) -> f32 {
        let elapsed = self
            .current
            .time_nanos
            .saturating_sub(self.last.frame.time_nanos);
        (elapsed as f64 / 1_000_000_000.) as f32
    }

    fn report_non_finite(&self, what: &str, from: SegmentKey, to: SegmentKey, delta: f32) {
        error!(
            label = self.label,
            input = self.current.input,
            last_input = self.last.frame.input,
            %from,
            %to,
            delta,
            "non-finite {what}, ignoring the discontinuity"
        );
    }
}

pub fn compute_frame(ctx: &FrameContext) -> ComputedFrame {
    let _span = tracy_client::span!("compute_frame");

    let segment = compute_segment(ctx);
    let change = classify_segment_change(ctx, &segment);
    let guarantee = compute_guarantee_state(ctx, &segment, change);
    let mut animation = compute_animation(ctx, &segment, change, guarantee);
    let spring_state = compute_spring_state(ctx, &animation);

    let mapped = segment.mapping.map(ctx.current.input);
    let direct_mapped = mapped - animation.target_value;
    let animated_delta = animation.target_value + spring_state.displacement;
    let output = direct_mapped + animated_delta;
    let output_target = direct_mapped + animation.target_value;
    let is_stable = spring_state.is_at_rest();

    if is_stable {
        // Nothing left to animate, the accumulated target no longer matters.
        animation = DiscontinuityAnimation::NONE;
    }

    trace!(
        label = ctx.label,
        input = ctx.current.input,
        ?change,
        output,
        is_stable,
        "computed frame"
    );

    ComputedFrame {
        frame: ctx.current,
        segment,
        change,
        guarantee,
        animation,
        spring_state,
        output,
        output_target,
        is_stable,
    }
}

/// Stage 1: the segment for the current input.
pub fn compute_segment(ctx: &FrameContext) -> SegmentData {
    let last = &ctx.last.segment;
    let FrameInput {
        input, direction, ..
    } = ctx.current;

    if last.spec != *ctx.spec || !last.is_valid_for_input(input, direction) {
        ctx.spec.on_change_segment(last, input, direction)
    } else {
        last.clone()
    }
}

/// Stage 2: why the segment (possibly) changed.
pub fn classify_segment_change(ctx: &FrameContext, segment: &SegmentData) -> SegmentChangeType {
    let last = &ctx.last.segment;
    let FrameInput {
        input, direction, ..
    } = ctx.current;
    let spec_changed = segment.spec != last.spec;

    let key = segment.key();
    let last_key = last.key();

    if key == last_key {
        // Rebuilt specs keep breakpoint keys, but may still map differently.
        if spec_changed && mappings_differ(&segment.mapping, &last.mapping, input) {
            return SegmentChangeType::Spec;
        }
        return SegmentChangeType::Same;
    }

    if key.min_breakpoint == last_key.min_breakpoint
        && key.max_breakpoint == last_key.max_breakpoint
    {
        return SegmentChangeType::SameOppositeDirection;
    }

    if spec_changed {
        let previous = last.spec.segment_at_input(input, direction);
        if previous.key() != key {
            return SegmentChangeType::Spec;
        }
    }

    if segment.direction != last.direction {
        SegmentChangeType::Direction
    } else {
        SegmentChangeType::Traverse
    }
}

fn mappings_differ(a: &Mapping, b: &Mapping, input: f32) -> bool {
    let (a, b) = (a.map(input), b.map(input));
    a != b && !(a.is_nan() && b.is_nan())
}

/// Stage 3: guarantee progress, advanced to the current frame.
pub fn compute_guarantee_state(
    ctx: &FrameContext,
    segment: &SegmentData,
    change: SegmentChangeType,
) -> GuaranteeState {
    let last = &ctx.last.frame;
    let current = &ctx.current;
    let entry = segment.entry_breakpoint();

    let origin = match change {
        SegmentChangeType::Same => ctx.last.guarantee,
        SegmentChangeType::SameOppositeDirection | SegmentChangeType::Spec => {
            GuaranteeState::Inactive
        }
        SegmentChangeType::Direction => {
            GuaranteeState::starting_for(entry, current.input, current.drag_offset)
        }
        SegmentChangeType::Traverse => {
            let fraction = crossing_fraction(entry.position, last.input, current.input);
            let drag_offset = lerp(last.drag_offset, current.drag_offset, fraction);
            GuaranteeState::starting_for(entry, entry.position, drag_offset)
        }
    };

    match entry.guarantee {
        Guarantee::None => GuaranteeState::Inactive,
        Guarantee::InputDelta(_) => origin.with_current_value(current.input, current.direction),
        Guarantee::GestureDragDelta(_) => {
            origin.with_current_value(current.drag_offset, current.direction)
        }
    }
}

/// Stage 4: the animation absorbing discontinuities of the mapped value.
pub fn compute_animation(
    ctx: &FrameContext,
    segment: &SegmentData,
    change: SegmentChangeType,
    guarantee: GuaranteeState,
) -> DiscontinuityAnimation {
    let last = ctx.last;

    match change {
        SegmentChangeType::Same => {
            if last.animation.is_at_rest() || last.guarantee == guarantee {
                last.animation
            } else {
                // Same target, but the guarantee tightened the spring.
                DiscontinuityAnimation {
                    spring_start_state: last.spring_state,
                    spring_parameters: guarantee
                        .updated_spring_parameters(segment.entry_breakpoint()),
                    spring_start_time_nanos: last.frame.time_nanos,
                    ..last.animation
                }
            }
        }
        SegmentChangeType::Direction => {
            let spring = guarantee.updated_spring_parameters(segment.entry_breakpoint());
            discontinuity(ctx, segment, spring)
        }
        SegmentChangeType::SameOppositeDirection | SegmentChangeType::Spec => {
            discontinuity(ctx, segment, ctx.spec.reset_spring())
        }
        SegmentChangeType::Traverse => traverse(ctx, segment, guarantee),
    }
}

/// Starts a new animation for the jump between the last and the current mapping.
fn discontinuity(
    ctx: &FrameContext,
    segment: &SegmentData,
    spring: SpringParameters,
) -> DiscontinuityAnimation {
    let last = ctx.last;
    let input = ctx.current.input;

    let delta = segment.mapping.map(input) - last.segment.mapping.map(input);
    if !delta.is_finite() {
        ctx.report_non_finite("mapping delta", last.segment.key(), segment.key(), delta);
        return last.animation;
    }
    if delta == 0. {
        return last.animation;
    }

    let target_value = delta - last.spring_state.displacement;
    let velocity = last.spring_state.velocity + direct_mapped_velocity(ctx, segment);

    DiscontinuityAnimation {
        target_value,
        spring_start_state: SpringState::new(-target_value, velocity),
        spring_parameters: spring,
        spring_start_time_nanos: last.frame.time_nanos,
    }
}

/// Walks the breakpoints crossed since the last frame, one at a time.
///
/// The spring is advanced to the moment each breakpoint was crossed (interpolated within the
/// frame) and absorbs that breakpoint's jump. Guarantees are tracked per crossed segment.
fn traverse(
    ctx: &FrameContext,
    segment: &SegmentData,
    guarantee: GuaranteeState,
) -> DiscontinuityAnimation {
    let last = ctx.last;
    let last_frame = &last.frame;
    let current = &ctx.current;

    let spec = segment.spec.get(segment.direction);
    let breakpoints = spec.breakpoints();
    let mappings = spec.mappings();

    let source = spec
        .find_breakpoint_index(last.segment.min_breakpoint.key)
        .filter(|&i| {
            breakpoints
                .get(i + 1)
                .is_some_and(|b| b.key == last.segment.max_breakpoint.key)
        });
    let Some(mut index) = source else {
        debug!(
            label = ctx.label,
            from = %last.segment.key(),
            to = %segment.key(),
            "last segment is missing from the spec, animating the jump directly"
        );
        return discontinuity(ctx, segment, ctx.spec.reset_spring());
    };
    let target_index = segment.index;

    let mut time = last_frame.time_nanos;
    let mut spring_state = last.spring_state;
    let mut target_value = last.animation.target_value;
    let mut spring = last.animation.spring_parameters;
    let mut segment_guarantee = last.guarantee;
    let mut entry = last.segment.entry_breakpoint().clone();

    while index != target_index {
        let forward = target_index > index;
        let (breakpoint_index, next_index) = if forward {
            (index + 1, index + 1)
        } else {
            (index, index - 1)
        };
        let breakpoint = &breakpoints[breakpoint_index];

        let fraction = crossing_fraction(breakpoint.position, last_frame.input, current.input);
        let crossing_time = lerp_nanos(last_frame.time_nanos, current.time_nanos, fraction);
        let drag_offset = lerp(last_frame.drag_offset, current.drag_offset, fraction);

        if segment_guarantee.is_active() && !spring_state.is_at_rest() {
            let value = match entry.guarantee {
                Guarantee::GestureDragDelta(_) => drag_offset,
                _ => breakpoint.position,
            };
            segment_guarantee = segment_guarantee.with_current_value(value, segment.direction);
            spring = segment_guarantee.updated_spring_parameters(&entry);
        }

        spring_state =
            spring_state.calculate_updated_state(crossing_time.saturating_sub(time), spring);
        time = crossing_time;

        let before = mappings[index].map(breakpoint.position);
        let after = mappings[next_index].map(breakpoint.position);
        let delta = after - before;
        if delta.is_finite() {
            target_value += delta;
            spring_state = spring_state.nudge(-delta, 0.);
        } else {
            let from = segment_key(spec, index, segment.direction);
            let to = segment_key(spec, next_index, segment.direction);
            ctx.report_non_finite("breakpoint delta", from, to, delta);
        }

        index = next_index;
        entry = breakpoint.clone();
        segment_guarantee = GuaranteeState::starting_for(breakpoint, breakpoint.position, drag_offset);
        spring = breakpoint.spring;
    }

    let velocity = direct_mapped_velocity(ctx, segment);
    if velocity != 0. {
        spring_state = spring_state.nudge(0., velocity);
    }

    DiscontinuityAnimation {
        target_value,
        spring_start_state: spring_state,
        spring_parameters: guarantee.updated_spring_parameters(segment.entry_breakpoint()),
        spring_start_time_nanos: time,
    }
}

fn segment_key(
    spec: &crate::spec::DirectionalMotionSpec,
    index: usize,
    direction: InputDirection,
) -> SegmentKey {
    let breakpoints = spec.breakpoints();
    SegmentKey::new(breakpoints[index].key, breakpoints[index + 1].key, direction)
}

/// Velocity the spring takes over when switching from the last to the current mapping.
///
/// Keeps the output velocity continuous: whatever speed the old mapping contributed over the
/// last frame and the new one does not is handed to the spring.
fn direct_mapped_velocity(ctx: &FrameContext, segment: &SegmentData) -> f32 {
    let elapsed = ctx.elapsed_secs();
    if elapsed <= 0. {
        return 0.;
    }

    let (from, to) = (ctx.last.frame.input, ctx.current.input);
    let last_mapping = &ctx.last.segment.mapping;
    let old = last_mapping.map(to) - last_mapping.map(from);
    let new = segment.mapping.map(to) - segment.mapping.map(from);

    let velocity = (old - new) / elapsed;
    if velocity.is_finite() {
        velocity
    } else {
        0.
    }
}

/// Stage 5: the spring at the current frame time, snapped to rest once stable.
pub fn compute_spring_state(ctx: &FrameContext, animation: &DiscontinuityAnimation) -> SpringState {
    if animation.is_at_rest() || ctx.complete_instantly {
        return SpringState::AT_REST;
    }

    let elapsed = ctx
        .current
        .time_nanos
        .saturating_sub(animation.spring_start_time_nanos);
    let state = animation
        .spring_start_state
        .calculate_updated_state(elapsed, animation.spring_parameters);

    if !state.displacement.is_finite() || !state.velocity.is_finite() {
        error!(
            label = ctx.label,
            ?animation,
            "spring integration produced a non-finite state, resetting it"
        );
        return SpringState::AT_REST;
    }

    if state.is_stable(animation.spring_parameters, ctx.stable_threshold) {
        SpringState::AT_REST
    } else {
        state
    }
}
