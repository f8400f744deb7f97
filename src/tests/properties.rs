use std::time::Duration;

use approx::assert_abs_diff_eq;
use proptest::prelude::*;

use super::fixture::*;
use crate::animation::{SpringParameters, SpringState};
use crate::motion::computations::{compute_frame, ComputedFrame, FrameContext, FrameInput};
use crate::spec::{Guarantee, InputDirection, MotionSpec};

fn arbitrary_direction() -> impl Strategy<Value = InputDirection> {
    prop_oneof![Just(InputDirection::Max), Just(InputDirection::Min)]
}

/// Input, direction and frame duration in milliseconds.
fn arbitrary_frames() -> impl Strategy<Value = Vec<(f32, InputDirection, u64)>> {
    prop::collection::vec((-1f32..4., arbitrary_direction(), 0u64..40), 1..40)
}

fn energy(state: SpringState, params: SpringParameters) -> f64 {
    let d = f64::from(state.displacement);
    let v = f64::from(state.velocity);
    f64::from(params.stiffness) * d * d + v * v
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    #[test]
    fn identity_spec_follows_input(frames in arbitrary_frames()) {
        let mut f = Fixture::new(MotionSpec::identity());
        for (input, direction, ms) in frames {
            f.gesture.set_direction(direction);
            let data = f.frame_after(input, Duration::from_millis(ms));
            prop_assert_eq!(data.output, input);
            prop_assert!(data.is_stable);
            prop_assert_eq!(f.value.output(), input);
        }
    }

    #[test]
    fn drag_offset_is_irrelevant_without_guarantees(
        frames in arbitrary_frames(),
        offsets in prop::collection::vec(-500f32..500., 40),
    ) {
        let spec = hysteresis();
        let mut plain = Fixture::new(spec.clone());
        let mut dragged = Fixture::new(spec);

        for ((input, direction, ms), offset) in frames.into_iter().zip(offsets) {
            let elapsed = Duration::from_millis(ms);
            plain.gesture.set_direction(direction);
            dragged.gesture.set_direction(direction);
            dragged.gesture.set_drag_offset(offset);

            let a = plain.frame_after(input, elapsed);
            let b = dragged.frame_after(input, elapsed);
            prop_assert_eq!(a.output, b.output);
            prop_assert_eq!(a.is_stable, b.is_stable);
        }
    }

    #[test]
    fn segment_changes_are_continuous(frames in arbitrary_frames()) {
        let spec = hysteresis();
        let mut last = ComputedFrame::initial(
            &spec,
            FrameInput {
                input: 0.,
                direction: InputDirection::Max,
                drag_offset: 0.,
                time_nanos: 0,
            },
        );

        for (input, direction, ms) in frames {
            let ctx = |current| FrameContext {
                label: "continuity",
                spec: &spec,
                last: &last,
                current,
                stable_threshold: 0.01,
                complete_instantly: false,
            };

            // No time passes, so the output may not move however the segment changed.
            let instant = FrameInput {
                input,
                direction,
                drag_offset: input,
                time_nanos: last.frame.time_nanos,
            };
            let frame = compute_frame(&ctx(instant));
            let expected = last.segment.mapping.map(input) + last.spring_state.displacement;
            assert_abs_diff_eq!(frame.output, expected, epsilon = 0.011);

            let next = FrameInput {
                time_nanos: last.frame.time_nanos + ms * 1_000_000,
                ..instant
            };
            last = compute_frame(&ctx(next));
            prop_assert!(last.output.is_finite());
        }
    }

    #[test]
    fn guarantee_bound_settles_spring(
        distance in 0.05f32..2.,
        steps in prop::collection::vec(0.01f32..0.5, 1..60),
    ) {
        let mut f = Fixture::new(step_with_guarantee(Guarantee::InputDelta(distance)));
        let mut input = 0.;
        for step in steps {
            input += step;
            let data = f.frame(input);
            if input - 1. >= distance {
                prop_assert!(data.is_stable, "not stable at {} with bound {}", input, distance);
                prop_assert_eq!(data.output, 1.);
            }
        }
    }

    #[test]
    fn spring_energy_never_grows(
        stiffness in 1f32..5000.,
        damping_ratio in 0.05f32..3.,
        displacement in -100f32..100.,
        velocity in -1000f32..1000.,
        first_ms in 0u64..200,
        extra_ms in 0u64..200,
    ) {
        let params = SpringParameters::new(stiffness, damping_ratio);
        let start = SpringState::new(displacement, velocity);

        let first = start.calculate_updated_state(first_ms * 1_000_000, params);
        let second = start.calculate_updated_state((first_ms + extra_ms) * 1_000_000, params);

        prop_assert!(first.displacement.is_finite() && first.velocity.is_finite());
        let (e0, e1, e2) = (energy(start, params), energy(first, params), energy(second, params));
        prop_assert!(e1 <= e0 * (1. + 1e-4) + 1e-6);
        prop_assert!(e2 <= e1 * (1. + 1e-4) + 1e-6);
    }
}
