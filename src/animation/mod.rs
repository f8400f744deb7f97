//! Time-based building blocks: the spring model and the shared animation clock.

mod spring;
pub use spring::{SpringParameters, SpringState};

mod clock;
pub use clock::Clock;
