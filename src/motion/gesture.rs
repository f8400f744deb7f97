//! Where a [`MotionValue`](super::MotionValue) learns about the user's gesture.

use std::cell::Cell;

use anyhow::ensure;

use crate::spec::InputDirection;

/// Read-only view of the gesture driving an input.
pub trait GestureContext {
    /// Direction the gesture is currently moving in.
    fn direction(&self) -> InputDirection;
    /// Raw accumulated drag distance, independent of how the input is derived from it.
    fn drag_offset(&self) -> f32;
}

/// Gesture context whose values are set directly by the host.
#[derive(Debug)]
pub struct ProvidedGestureContext {
    direction: Cell<InputDirection>,
    drag_offset: Cell<f32>,
}

impl ProvidedGestureContext {
    pub fn new(direction: InputDirection, drag_offset: f32) -> Self {
        Self {
            direction: Cell::new(direction),
            drag_offset: Cell::new(drag_offset),
        }
    }

    pub fn set_direction(&self, direction: InputDirection) {
        self.direction.set(direction);
    }

    pub fn set_drag_offset(&self, drag_offset: f32) {
        self.drag_offset.set(drag_offset);
    }
}

impl GestureContext for ProvidedGestureContext {
    fn direction(&self) -> InputDirection {
        self.direction.get()
    }

    fn drag_offset(&self) -> f32 {
        self.drag_offset.get()
    }
}

/// Gesture context deriving the direction from the drag offset.
///
/// The direction only flips once the offset has moved back by at least `direction_change_slop`
/// from the furthest point reached in the current direction, so jitter does not flip it.
#[derive(Debug)]
pub struct DistanceGestureContext {
    direction: Cell<InputDirection>,
    drag_offset: Cell<f32>,
    furthest_drag_offset: Cell<f32>,
    direction_change_slop: f32,
}

impl DistanceGestureContext {
    pub fn new(
        initial_drag_offset: f32,
        initial_direction: InputDirection,
        direction_change_slop: f32,
    ) -> anyhow::Result<Self> {
        ensure!(
            direction_change_slop.is_finite() && direction_change_slop >= 0.,
            "direction change slop must be finite and non-negative, got {direction_change_slop}"
        );

        Ok(Self {
            direction: Cell::new(initial_direction),
            drag_offset: Cell::new(initial_drag_offset),
            furthest_drag_offset: Cell::new(initial_drag_offset),
            direction_change_slop,
        })
    }

    pub fn direction_change_slop(&self) -> f32 {
        self.direction_change_slop
    }

    pub fn set_drag_offset(&self, drag_offset: f32) {
        if self.drag_offset.get() == drag_offset {
            return;
        }
        self.drag_offset.set(drag_offset);

        let direction = self.direction.get();
        let furthest = self.furthest_drag_offset.get();
        // Positive when moving further along the current direction.
        let progress = (drag_offset - furthest) * direction.sign();

        if progress > 0. {
            self.furthest_drag_offset.set(drag_offset);
        } else if -progress >= self.direction_change_slop && progress != 0. {
            trace!(?direction, drag_offset, "gesture changed direction");
            self.direction.set(direction.opposite());
            self.furthest_drag_offset.set(drag_offset);
        }
    }

    /// Adds `delta` to the drag offset.
    pub fn drag_by(&self, delta: f32) {
        self.set_drag_offset(self.drag_offset.get() + delta);
    }

    pub fn reset(&self, drag_offset: f32, direction: InputDirection) {
        self.drag_offset.set(drag_offset);
        self.furthest_drag_offset.set(drag_offset);
        self.direction.set(direction);
    }
}

impl GestureContext for DistanceGestureContext {
    fn direction(&self) -> InputDirection {
        self.direction.get()
    }

    fn drag_offset(&self) -> f32 {
        self.drag_offset.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_only_past_slop() {
        let gesture = DistanceGestureContext::new(0., InputDirection::Max, 5.).unwrap();

        gesture.set_drag_offset(20.);
        assert_eq!(gesture.direction(), InputDirection::Max);

        gesture.set_drag_offset(16.);
        assert_eq!(gesture.direction(), InputDirection::Max);

        gesture.set_drag_offset(15.);
        assert_eq!(gesture.direction(), InputDirection::Min);

        // Furthest point was reset to 15, going further down keeps Min.
        gesture.set_drag_offset(10.);
        assert_eq!(gesture.direction(), InputDirection::Min);
        gesture.set_drag_offset(14.);
        assert_eq!(gesture.direction(), InputDirection::Min);
        gesture.set_drag_offset(15.);
        assert_eq!(gesture.direction(), InputDirection::Max);
    }

    #[test]
    fn zero_slop_flips_immediately() {
        let gesture = DistanceGestureContext::new(0., InputDirection::Max, 0.).unwrap();
        gesture.drag_by(3.);
        gesture.drag_by(-0.5);
        assert_eq!(gesture.direction(), InputDirection::Min);
        assert_eq!(gesture.drag_offset(), 2.5);
    }

    #[test]
    fn reset_and_validation() {
        let gesture = DistanceGestureContext::new(0., InputDirection::Max, 1.).unwrap();
        gesture.reset(50., InputDirection::Min);
        assert_eq!(gesture.direction(), InputDirection::Min);
        gesture.set_drag_offset(50.5);
        assert_eq!(gesture.direction(), InputDirection::Min);

        assert!(DistanceGestureContext::new(0., InputDirection::Max, -1.).is_err());
        assert!(DistanceGestureContext::new(0., InputDirection::Max, f32::NAN).is_err());
    }

    #[test]
    fn provided_values() {
        let gesture = ProvidedGestureContext::new(InputDirection::Min, 1.);
        gesture.set_direction(InputDirection::Max);
        gesture.set_drag_offset(7.);
        assert_eq!(gesture.direction(), InputDirection::Max);
        assert_eq!(gesture.drag_offset(), 7.);
    }
}
