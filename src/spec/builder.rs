//! Fluent construction of specs.
//!
//! ```
//! use mechanics::animation::SpringParameters;
//! use mechanics::spec::{DirectionalBuilder, Guarantee, Mapping, MotionSpecBuilder};
//!
//! let spec = DirectionalBuilder::new(SpringParameters::default(), Mapping::Zero)
//!     .to_breakpoint(50.)
//!     .guarantee(Guarantee::InputDelta(20.))
//!     .jump_to(0.2)
//!     .continue_with_target_value(1.)
//!     .to_breakpoint(150.)
//!     .continue_with_constant_value()
//!     .build()
//!     .unwrap();
//! let spec = MotionSpecBuilder::new(spec).build();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure};

use super::{
    Breakpoint, BreakpointKey, DirectionalMotionSpec, Guarantee, InputDirection, Mapping,
    MotionSpec, OnChangeSegmentHandler, SegmentData, SegmentKey,
};
use crate::animation::SpringParameters;

/// Builds a [`DirectionalMotionSpec`] from left to right.
///
/// Every [`to_breakpoint`](Self::to_breakpoint) must be followed by exactly one `continue_*`
/// call declaring the segment after it. Mistakes are collected and reported by
/// [`build`](Self::build).
#[derive(Debug)]
pub struct DirectionalBuilder {
    default_spring: SpringParameters,
    breakpoints: Vec<Breakpoint>,
    segments: Vec<Segment>,
    start: Start,
    error: Option<anyhow::Error>,
}

#[derive(Debug)]
enum Segment {
    Mapping(Mapping),
    Constant(Start),
    FractionalInput(Start, f32),
    TargetValue(Start, f32),
}

#[derive(Debug, Clone, Copy)]
enum Start {
    /// Value of the previous segment's mapping at the breakpoint.
    Continue,
    JumpTo(f32),
    JumpBy(f32),
}

impl DirectionalBuilder {
    pub fn new(default_spring: SpringParameters, initial_mapping: Mapping) -> Self {
        Self {
            default_spring,
            breakpoints: vec![Breakpoint::min_limit(default_spring)],
            segments: vec![Segment::Mapping(initial_mapping)],
            start: Start::Continue,
            error: None,
        }
    }

    fn fail(&mut self, error: anyhow::Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn has_open_breakpoint(&self) -> bool {
        self.breakpoints.len() > self.segments.len()
    }

    fn open_breakpoint(&mut self, what: &str) -> Option<&mut Breakpoint> {
        if !self.has_open_breakpoint() {
            self.fail(anyhow!("{what} must directly follow to_breakpoint"));
            return None;
        }
        self.breakpoints.last_mut()
    }

    pub fn to_breakpoint(mut self, position: f32) -> Self {
        if self.has_open_breakpoint() {
            let last = self.breakpoints[self.breakpoints.len() - 1].position;
            self.fail(anyhow!("breakpoint at {last} is not followed by a mapping"));
            return self;
        }

        self.breakpoints.push(Breakpoint::new(
            BreakpointKey::new(),
            position,
            self.default_spring,
            Guarantee::None,
        ));
        self.start = Start::Continue;
        self
    }

    pub fn key(mut self, key: BreakpointKey) -> Self {
        if let Some(breakpoint) = self.open_breakpoint("key") {
            breakpoint.key = key;
        }
        self
    }

    pub fn spring(mut self, spring: SpringParameters) -> Self {
        if let Some(breakpoint) = self.open_breakpoint("spring") {
            breakpoint.spring = spring;
        }
        self
    }

    pub fn guarantee(mut self, guarantee: Guarantee) -> Self {
        if let Some(breakpoint) = self.open_breakpoint("guarantee") {
            breakpoint.guarantee = guarantee;
        }
        self
    }

    /// Starts the next segment at `value` instead of where the previous one ended.
    pub fn jump_to(mut self, value: f32) -> Self {
        if self.open_breakpoint("jump_to").is_some() {
            self.start = Start::JumpTo(value);
        }
        self
    }

    /// Starts the next segment `delta` away from where the previous one ended.
    pub fn jump_by(mut self, delta: f32) -> Self {
        if self.open_breakpoint("jump_by").is_some() {
            self.start = Start::JumpBy(delta);
        }
        self
    }

    fn push_segment(mut self, segment: Segment) -> Self {
        if self.open_breakpoint("a mapping").is_some() {
            self.segments.push(segment);
            self.start = Start::Continue;
        }
        self
    }

    pub fn continue_with(mut self, mapping: Mapping) -> Self {
        if !matches!(self.start, Start::Continue) {
            self.fail(anyhow!("jumps cannot be combined with an explicit mapping"));
        }
        self.push_segment(Segment::Mapping(mapping))
    }

    pub fn continue_with_constant_value(self) -> Self {
        let start = self.start;
        self.push_segment(Segment::Constant(start))
    }

    /// Continues linearly with slope `fraction`.
    pub fn continue_with_fractional_input(self, fraction: f32) -> Self {
        let start = self.start;
        self.push_segment(Segment::FractionalInput(start, fraction))
    }

    /// Continues linearly, reaching `target` at the next breakpoint.
    pub fn continue_with_target_value(self, target: f32) -> Self {
        let start = self.start;
        self.push_segment(Segment::TargetValue(start, target))
    }

    pub fn build(self) -> anyhow::Result<DirectionalMotionSpec> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.has_open_breakpoint() {
            let last = self.breakpoints[self.breakpoints.len() - 1].position;
            bail!("breakpoint at {last} is not followed by a mapping");
        }

        let mut breakpoints = self.breakpoints;
        breakpoints.push(Breakpoint::max_limit(self.default_spring));

        let mut mappings: Vec<Mapping> = Vec::with_capacity(self.segments.len());
        for (i, segment) in self.segments.into_iter().enumerate() {
            let position = breakpoints[i].position;
            let start_value = |start: Start| {
                let previous = mappings.last().map_or(0., |m| m.map(position));
                match start {
                    Start::Continue => previous,
                    Start::JumpTo(value) => value,
                    Start::JumpBy(delta) => previous + delta,
                }
            };

            let mapping = match segment {
                Segment::Mapping(mapping) => mapping,
                Segment::Constant(start) => Mapping::Fixed(start_value(start)),
                Segment::FractionalInput(start, fraction) => Mapping::linear(
                    fraction,
                    start_value(start) - fraction * position,
                ),
                Segment::TargetValue(start, target) => {
                    let end = breakpoints[i + 1].position;
                    ensure!(
                        end.is_finite(),
                        "the last segment cannot continue with a target value"
                    );
                    Mapping::through_points(position, start_value(start), end, target)
                }
            };
            mappings.push(mapping);
        }

        DirectionalMotionSpec::new(breakpoints, mappings)
    }
}

/// Combines directional specs into a [`MotionSpec`].
pub struct MotionSpecBuilder {
    max_direction: DirectionalMotionSpec,
    min_direction: Option<DirectionalMotionSpec>,
    reset_spring: SpringParameters,
    segment_handlers: HashMap<SegmentKey, OnChangeSegmentHandler>,
}

impl MotionSpecBuilder {
    /// The spec is used for both directions unless [`min_direction`](Self::min_direction) is set.
    pub fn new(max_direction: DirectionalMotionSpec) -> Self {
        Self {
            max_direction,
            min_direction: None,
            reset_spring: SpringParameters::default(),
            segment_handlers: HashMap::new(),
        }
    }

    pub fn min_direction(mut self, spec: DirectionalMotionSpec) -> Self {
        self.min_direction = Some(spec);
        self
    }

    /// Spring that smooths over discontinuities caused by replacing the spec.
    pub fn reset_spring(mut self, spring: SpringParameters) -> Self {
        self.reset_spring = spring;
        self
    }

    pub fn on_change_segment(
        mut self,
        key: SegmentKey,
        handler: impl Fn(&MotionSpec, &SegmentData, f32, InputDirection) -> Option<SegmentData>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.segment_handlers.insert(key, Arc::new(handler));
        self
    }

    pub fn build(self) -> MotionSpec {
        let min_direction = self
            .min_direction
            .unwrap_or_else(|| self.max_direction.clone());
        MotionSpec::new(
            self.max_direction,
            min_direction,
            self.reset_spring,
            self.segment_handlers,
        )
    }
}
