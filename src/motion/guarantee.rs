use serde::Serialize;

use crate::animation::SpringParameters;
use crate::spec::{Breakpoint, Guarantee, InputDirection};

/// Progress towards the bound of a segment's [`Guarantee`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub enum GuaranteeState {
    #[default]
    Inactive,
    Active { origin: f32, current: f32 },
}

impl GuaranteeState {
    pub fn with_start_value(origin: f32) -> Self {
        Self::Active {
            origin,
            current: origin,
        }
    }

    /// Starts tracking `breakpoint`'s guarantee, or `Inactive` if it has none.
    pub fn starting_for(breakpoint: &Breakpoint, input: f32, drag_offset: f32) -> Self {
        match breakpoint.guarantee {
            Guarantee::None => Self::Inactive,
            Guarantee::InputDelta(_) => Self::with_start_value(input),
            Guarantee::GestureDragDelta(_) => Self::with_start_value(drag_offset),
        }
    }

    pub fn with_current_value(self, value: f32, _direction: InputDirection) -> Self {
        match self {
            Self::Inactive => Self::Inactive,
            Self::Active { origin, .. } => Self::Active {
                origin,
                current: value,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Distance consumed towards the bound.
    pub fn consumed(&self) -> f32 {
        match *self {
            Self::Inactive => 0.,
            Self::Active { origin, current } => (current - origin).abs(),
        }
    }

    /// Spring to use for `breakpoint` given the progress so far.
    ///
    /// The nominal spring is stiffened towards [`SpringParameters::SNAP`] in proportion to the
    /// consumed fraction of the bound, reaching it when the bound is reached.
    pub fn updated_spring_parameters(&self, breakpoint: &Breakpoint) -> SpringParameters {
        let Self::Active { .. } = self else {
            return breakpoint.spring;
        };
        let Some(bound) = breakpoint.guarantee.max_distance() else {
            return breakpoint.spring;
        };

        let consumed = self.consumed();
        if !consumed.is_finite() || consumed >= bound {
            return SpringParameters::SNAP;
        }

        breakpoint
            .spring
            .lerp(SpringParameters::SNAP, consumed / bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::BreakpointKey;

    fn breakpoint(guarantee: Guarantee) -> Breakpoint {
        Breakpoint::new(
            BreakpointKey::new(),
            0.,
            SpringParameters::new(300., 0.8),
            guarantee,
        )
    }

    #[test]
    fn inactive_keeps_nominal_spring() {
        let b = breakpoint(Guarantee::InputDelta(10.));
        assert_eq!(
            GuaranteeState::Inactive.updated_spring_parameters(&b),
            b.spring
        );
        let moved = GuaranteeState::Inactive.with_current_value(5., InputDirection::Max);
        assert_eq!(moved, GuaranteeState::Inactive);
    }

    #[test]
    fn tightens_until_snap() {
        let b = breakpoint(Guarantee::InputDelta(10.));
        let start = GuaranteeState::with_start_value(2.);
        assert_eq!(start.updated_spring_parameters(&b), b.spring);

        let half = start.with_current_value(7., InputDirection::Max);
        assert_eq!(half.consumed(), 5.);
        let params = half.updated_spring_parameters(&b);
        assert!(params.stiffness > b.spring.stiffness);
        assert!(!params.is_snap());

        let done = start.with_current_value(12., InputDirection::Max);
        assert!(done.updated_spring_parameters(&b).is_snap());

        let backwards = start.with_current_value(-8., InputDirection::Min);
        assert!(backwards.updated_spring_parameters(&b).is_snap());
    }

    #[test]
    fn no_guarantee_on_breakpoint() {
        let b = breakpoint(Guarantee::None);
        let state = GuaranteeState::with_start_value(0.).with_current_value(100., InputDirection::Max);
        assert_eq!(state.updated_spring_parameters(&b), b.spring);
        assert_eq!(
            GuaranteeState::starting_for(&b, 1., 2.),
            GuaranteeState::Inactive
        );
    }

    #[test]
    fn starts_from_input_or_drag() {
        let input = breakpoint(Guarantee::InputDelta(1.));
        let drag = breakpoint(Guarantee::GestureDragDelta(1.));
        assert_eq!(
            GuaranteeState::starting_for(&input, 3., 40.),
            GuaranteeState::with_start_value(3.)
        );
        assert_eq!(
            GuaranteeState::starting_for(&drag, 3., 40.),
            GuaranteeState::with_start_value(40.)
        );
    }
}
