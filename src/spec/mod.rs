//! Piecewise description of how an input maps to an output.
//!
//! A [`DirectionalMotionSpec`] splits the input axis at breakpoints into segments, each with its
//! own [`Mapping`]. A [`MotionSpec`] holds one of those per [`InputDirection`], so that moving
//! back can use different breakpoints than moving forward.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::animation::SpringParameters;
use crate::utils::id::IdCounter;

pub mod builder;
pub use builder::{DirectionalBuilder, MotionSpecBuilder};

mod mapping;
pub use mapping::Mapping;

static BREAKPOINT_IDS: IdCounter = IdCounter::starting_at(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDirection {
    /// Input moving towards larger values.
    Max,
    /// Input moving towards smaller values.
    Min,
}

impl InputDirection {
    pub fn sign(self) -> f32 {
        match self {
            InputDirection::Max => 1.,
            InputDirection::Min => -1.,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            InputDirection::Max => InputDirection::Min,
            InputDirection::Min => InputDirection::Max,
        }
    }
}

/// Bound on how long the spring entering a segment may take to settle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guarantee {
    #[default]
    None,
    /// Settled once the input moved this far past the origin.
    InputDelta(f32),
    /// Settled once the gesture was dragged this far past the origin.
    GestureDragDelta(f32),
}

impl Guarantee {
    pub fn max_distance(&self) -> Option<f32> {
        match *self {
            Guarantee::None => None,
            Guarantee::InputDelta(distance) | Guarantee::GestureDragDelta(distance) => {
                Some(distance)
            }
        }
    }
}

/// Identity of a breakpoint, stable across spec rebuilds.
#[derive(Clone, Copy)]
pub struct BreakpointKey {
    id: u64,
    label: Option<&'static str>,
}

impl BreakpointKey {
    pub const MIN_LIMIT: Self = Self {
        id: 0,
        label: Some("min-limit"),
    };
    pub const MAX_LIMIT: Self = Self {
        id: u64::MAX,
        label: Some("max-limit"),
    };

    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: BREAKPOINT_IDS.next(),
            label: None,
        }
    }

    pub fn labeled(label: &'static str) -> Self {
        Self {
            label: Some(label),
            ..Self::new()
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        self.label
    }
}

impl PartialEq for BreakpointKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BreakpointKey {}

impl Hash for BreakpointKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for BreakpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            Some(label) => write!(f, "{label}"),
            None => write!(f, "#{}", self.id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub key: BreakpointKey,
    pub position: f32,
    pub spring: SpringParameters,
    pub guarantee: Guarantee,
}

impl Breakpoint {
    pub fn new(
        key: BreakpointKey,
        position: f32,
        spring: SpringParameters,
        guarantee: Guarantee,
    ) -> Self {
        Self {
            key,
            position,
            spring,
            guarantee,
        }
    }

    pub fn min_limit(spring: SpringParameters) -> Self {
        Self::new(
            BreakpointKey::MIN_LIMIT,
            f32::NEG_INFINITY,
            spring,
            Guarantee::None,
        )
    }

    pub fn max_limit(spring: SpringParameters) -> Self {
        Self::new(
            BreakpointKey::MAX_LIMIT,
            f32::INFINITY,
            spring,
            Guarantee::None,
        )
    }
}

/// Identifies a segment independently of where its breakpoints are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentKey {
    pub min_breakpoint: BreakpointKey,
    pub max_breakpoint: BreakpointKey,
    pub direction: InputDirection,
}

impl SegmentKey {
    pub fn new(
        min_breakpoint: BreakpointKey,
        max_breakpoint: BreakpointKey,
        direction: InputDirection,
    ) -> Self {
        Self {
            min_breakpoint,
            max_breakpoint,
            direction,
        }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}..{:?} ({:?})",
            self.min_breakpoint, self.max_breakpoint, self.direction
        )
    }
}

/// A segment resolved against a particular spec.
#[derive(Debug, Clone)]
pub struct SegmentData {
    pub spec: MotionSpec,
    pub index: usize,
    pub min_breakpoint: Breakpoint,
    pub max_breakpoint: Breakpoint,
    pub mapping: Mapping,
    pub direction: InputDirection,
}

impl SegmentData {
    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(
            self.min_breakpoint.key,
            self.max_breakpoint.key,
            self.direction,
        )
    }

    /// The breakpoint crossed when entering this segment while moving in its direction.
    pub fn entry_breakpoint(&self) -> &Breakpoint {
        match self.direction {
            InputDirection::Max => &self.min_breakpoint,
            InputDirection::Min => &self.max_breakpoint,
        }
    }

    /// Whether this segment still applies to `input` moving in `direction`.
    ///
    /// Both bounds are inclusive, so landing exactly on a breakpoint keeps the segment.
    pub fn is_valid_for_input(&self, input: f32, direction: InputDirection) -> bool {
        direction == self.direction
            && input >= self.min_breakpoint.position
            && input <= self.max_breakpoint.position
    }
}

/// Breakpoints and mappings for one input direction.
///
/// Segment `i` spans `breakpoints[i]..=breakpoints[i + 1]` and uses `mappings[i]`. The first and
/// last breakpoints are sentinels at negative and positive infinity.
#[derive(Debug, Clone)]
pub struct DirectionalMotionSpec {
    breakpoints: Vec<Breakpoint>,
    mappings: Vec<Mapping>,
}

impl DirectionalMotionSpec {
    pub fn new(breakpoints: Vec<Breakpoint>, mappings: Vec<Mapping>) -> anyhow::Result<Self> {
        ensure!(
            breakpoints.len() == mappings.len() + 1,
            "expected one more breakpoint than mappings, got {} breakpoints and {} mappings",
            breakpoints.len(),
            mappings.len()
        );
        ensure!(!mappings.is_empty(), "at least one mapping is required");

        let first = &breakpoints[0];
        let last = &breakpoints[breakpoints.len() - 1];
        ensure!(
            first.position == f32::NEG_INFINITY && first.key == BreakpointKey::MIN_LIMIT,
            "the first breakpoint must be the min limit"
        );
        ensure!(
            last.position == f32::INFINITY && last.key == BreakpointKey::MAX_LIMIT,
            "the last breakpoint must be the max limit"
        );

        let inner = &breakpoints[1..breakpoints.len() - 1];
        for (i, breakpoint) in inner.iter().enumerate() {
            ensure!(
                breakpoint.position.is_finite(),
                "breakpoint {:?} has a non-finite position {}",
                breakpoint.key,
                breakpoint.position
            );
            ensure!(
                !inner[..i].iter().any(|other| other.key == breakpoint.key),
                "breakpoint key {:?} is used more than once",
                breakpoint.key
            );
            if let Some(guarantee) = breakpoint.guarantee.max_distance() {
                ensure!(
                    guarantee.is_finite() && guarantee > 0.,
                    "breakpoint {:?} has an invalid guarantee distance {guarantee}",
                    breakpoint.key
                );
            }
        }

        for pair in breakpoints.windows(2) {
            ensure!(
                pair[0].position < pair[1].position,
                "breakpoints must be strictly increasing, but {:?} at {} is followed by {:?} at {}",
                pair[0].key,
                pair[0].position,
                pair[1].key,
                pair[1].position
            );
        }

        Ok(Self {
            breakpoints,
            mappings,
        })
    }

    /// Single segment covering the whole input axis.
    pub fn from_mapping(mapping: Mapping, spring: SpringParameters) -> Self {
        Self {
            breakpoints: vec![Breakpoint::min_limit(spring), Breakpoint::max_limit(spring)],
            mappings: vec![mapping],
        }
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn segment_count(&self) -> usize {
        self.mappings.len()
    }

    /// Index of the segment containing `input`.
    ///
    /// On a breakpoint, [`InputDirection::Max`] picks the segment starting there and
    /// [`InputDirection::Min`] the segment ending there.
    pub fn find_segment_index(&self, input: f32, direction: InputDirection) -> usize {
        let last = self.segment_count() - 1;
        let count = match direction {
            InputDirection::Max => self.breakpoints.partition_point(|b| b.position <= input),
            InputDirection::Min => self.breakpoints.partition_point(|b| b.position < input),
        };
        count.saturating_sub(1).min(last)
    }

    pub fn find_breakpoint_index(&self, key: BreakpointKey) -> Option<usize> {
        self.breakpoints.iter().position(|b| b.key == key)
    }
}

pub type OnChangeSegmentHandler =
    Arc<dyn Fn(&MotionSpec, &SegmentData, f32, InputDirection) -> Option<SegmentData> + Send + Sync>;

/// Full motion spec: one [`DirectionalMotionSpec`] per direction.
///
/// Cheap to clone; clones compare equal, independently built specs never do.
#[derive(Clone)]
pub struct MotionSpec {
    inner: Arc<Inner>,
}

struct Inner {
    max_direction: DirectionalMotionSpec,
    min_direction: DirectionalMotionSpec,
    reset_spring: SpringParameters,
    segment_handlers: HashMap<SegmentKey, OnChangeSegmentHandler>,
}

impl MotionSpec {
    pub fn new(
        max_direction: DirectionalMotionSpec,
        min_direction: DirectionalMotionSpec,
        reset_spring: SpringParameters,
        segment_handlers: HashMap<SegmentKey, OnChangeSegmentHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_direction,
                min_direction,
                reset_spring,
                segment_handlers,
            }),
        }
    }

    /// Same spec for both directions, no handlers.
    pub fn symmetric(spec: DirectionalMotionSpec, reset_spring: SpringParameters) -> Self {
        Self::new(spec.clone(), spec, reset_spring, HashMap::new())
    }

    pub fn from_mapping(mapping: Mapping) -> Self {
        let spring = SpringParameters::default();
        Self::symmetric(DirectionalMotionSpec::from_mapping(mapping, spring), spring)
    }

    pub fn identity() -> Self {
        Self::from_mapping(Mapping::Identity)
    }

    pub fn get(&self, direction: InputDirection) -> &DirectionalMotionSpec {
        match direction {
            InputDirection::Max => &self.inner.max_direction,
            InputDirection::Min => &self.inner.min_direction,
        }
    }

    pub fn reset_spring(&self) -> SpringParameters {
        self.inner.reset_spring
    }

    pub fn segment_at_index(&self, index: usize, direction: InputDirection) -> Option<SegmentData> {
        (index < self.get(direction).segment_count()).then(|| self.resolve(index, direction))
    }

    pub fn segment_at_input(&self, input: f32, direction: InputDirection) -> SegmentData {
        let index = self.get(direction).find_segment_index(input, direction);
        self.resolve(index, direction)
    }

    fn resolve(&self, index: usize, direction: InputDirection) -> SegmentData {
        let spec = self.get(direction);
        SegmentData {
            spec: self.clone(),
            index,
            min_breakpoint: spec.breakpoints[index].clone(),
            max_breakpoint: spec.breakpoints[index + 1].clone(),
            mapping: spec.mappings[index].clone(),
            direction,
        }
    }

    /// Resolves the segment after `last` stopped being valid.
    ///
    /// A handler registered for `last`'s key may pick the segment instead, for example to stay in
    /// `last` a little longer after a direction change.
    pub fn on_change_segment(
        &self,
        last: &SegmentData,
        input: f32,
        direction: InputDirection,
    ) -> SegmentData {
        if let Some(handler) = self.inner.segment_handlers.get(&last.key()) {
            if let Some(segment) = handler(self, last, input, direction) {
                return segment;
            }
        }

        self.segment_at_input(input, direction)
    }
}

impl PartialEq for MotionSpec {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MotionSpec {}

impl fmt::Debug for MotionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionSpec")
            .field("max_direction", &self.inner.max_direction)
            .field("min_direction", &self.inner.min_direction)
            .field("reset_spring", &self.inner.reset_spring)
            .field("segment_handlers", &self.inner.segment_handlers.len())
            .finish()
    }
}

impl Default for MotionSpec {
    fn default() -> Self {
        Self::identity()
    }
}
