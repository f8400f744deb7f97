//! Continuous input-to-output motion mapping.
//!
//! A [`MotionSpec`](spec::MotionSpec) describes piecewise mappings from an input value (usually
//! derived from a gesture) to an output value. A [`MotionValue`](motion::MotionValue) follows the
//! input through the spec frame by frame and smooths every jump between segments with a spring,
//! so the output stays continuous.

#[macro_use]
extern crate tracing;

pub mod animation;
pub mod cli;
pub mod config;
pub mod frame_clock;
pub mod motion;
pub mod spec;
pub mod utils;

#[cfg(test)]
mod tests;
