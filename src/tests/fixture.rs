use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::animation::{Clock, SpringParameters};
use crate::motion::gesture::ProvidedGestureContext;
use crate::motion::{FrameData, MotionValue};
use crate::spec::{
    DirectionalBuilder, Guarantee, InputDirection, Mapping, MotionSpec, MotionSpecBuilder,
};

pub const FRAME: Duration = Duration::from_nanos(16_666_667);

/// A motion value with every collaborator under test control.
pub struct Fixture {
    pub input: Rc<Cell<f32>>,
    pub gesture: Rc<ProvidedGestureContext>,
    pub clock: Clock,
    pub value: MotionValue,
    pub time: Duration,
}

impl Fixture {
    pub fn new(spec: MotionSpec) -> Self {
        Self::starting_at(spec, 0.)
    }

    pub fn starting_at(spec: MotionSpec, input: f32) -> Self {
        let time = Duration::from_secs(1);
        let clock = Clock::with_time(time);
        let gesture = Rc::new(ProvidedGestureContext::new(InputDirection::Max, input));
        let input = Rc::new(Cell::new(input));

        let value = MotionValue::new(
            {
                let input = input.clone();
                move || input.get()
            },
            gesture.clone(),
            spec,
            clock.clone(),
        )
        .with_label("fixture");

        Self {
            input,
            gesture,
            clock,
            value,
            time,
        }
    }

    /// Commits a frame one refresh interval later.
    pub fn frame(&mut self, input: f32) -> FrameData {
        self.frame_after(input, FRAME)
    }

    pub fn frame_after(&mut self, input: f32, elapsed: Duration) -> FrameData {
        self.input.set(input);
        self.time += elapsed;
        self.clock.set_unadjusted(self.time);
        self.value.advance();
        self.value.frame_data()
    }

    pub fn drag(&mut self, input: f32, drag_offset: f32, direction: InputDirection) -> FrameData {
        self.gesture.set_drag_offset(drag_offset);
        self.gesture.set_direction(direction);
        self.frame(input)
    }

    /// Commits frames at `input` until the value is stable, returning the outputs on the way.
    pub fn settle(&mut self, input: f32) -> Vec<f32> {
        let mut outputs = Vec::new();
        for _ in 0..600 {
            let data = self.frame(input);
            outputs.push(data.output);
            if data.is_stable {
                return outputs;
            }
        }
        panic!("value did not settle: {:?}", self.value.frame_data());
    }
}

/// `Zero` below 1, `One` from 1 to 2, `Two` above.
pub fn zero_one_two() -> MotionSpec {
    let spec = DirectionalBuilder::new(SpringParameters::default(), Mapping::Zero)
        .to_breakpoint(1.)
        .continue_with(Mapping::One)
        .to_breakpoint(2.)
        .continue_with(Mapping::Two)
        .build()
        .unwrap();
    MotionSpecBuilder::new(spec).build()
}

/// `Zero` below 1 and `One` above, with `guarantee` on the breakpoint.
pub fn step_with_guarantee(guarantee: Guarantee) -> MotionSpec {
    let spec = DirectionalBuilder::new(SpringParameters::default(), Mapping::Zero)
        .to_breakpoint(1.)
        .guarantee(guarantee)
        .spring(SpringParameters::new(100., 0.9))
        .continue_with(Mapping::One)
        .build()
        .unwrap();
    MotionSpecBuilder::new(spec).build()
}

/// Like [`zero_one_two`], but moving back switches at 0.5 and 1.5.
pub fn hysteresis() -> MotionSpec {
    let build = |first: f32, second: f32| {
        DirectionalBuilder::new(SpringParameters::default(), Mapping::Zero)
            .to_breakpoint(first)
            .continue_with(Mapping::One)
            .to_breakpoint(second)
            .continue_with(Mapping::Two)
            .build()
            .unwrap()
    };
    MotionSpecBuilder::new(build(1., 2.))
        .min_direction(build(0.5, 1.5))
        .build()
}
