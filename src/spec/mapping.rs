use std::fmt;
use std::sync::Arc;

/// Function from the input to the raw, unanimated output of one segment.
#[derive(Clone)]
pub enum Mapping {
    Identity,
    Fixed(f32),
    /// `factor * input + offset`.
    Linear {
        factor: f32,
        offset: f32,
    },
    Zero,
    One,
    Two,
    /// Caller-supplied pure function.
    Custom(Arc<dyn Fn(f32) -> f32 + Send + Sync>),
}

impl Mapping {
    pub fn linear(factor: f32, offset: f32) -> Self {
        Self::Linear { factor, offset }
    }

    /// Linear mapping through `(x1, y1)` and `(x2, y2)`.
    ///
    /// Degenerates to a fixed `y2` when both points share an input.
    pub fn through_points(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        if x1 == x2 {
            return Self::Fixed(y2);
        }

        let factor = (y2 - y1) / (x2 - x1);
        Self::Linear {
            factor,
            offset: y1 - factor * x1,
        }
    }

    pub fn custom(f: impl Fn(f32) -> f32 + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn map(&self, input: f32) -> f32 {
        match self {
            Mapping::Identity => input,
            Mapping::Fixed(value) => *value,
            Mapping::Linear { factor, offset } => factor * input + offset,
            Mapping::Zero => 0.,
            Mapping::One => 1.,
            Mapping::Two => 2.,
            Mapping::Custom(f) => f(input),
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapping::Identity => write!(f, "Identity"),
            Mapping::Fixed(value) => write!(f, "Fixed({value})"),
            Mapping::Linear { factor, offset } => write!(f, "Linear({factor} * x + {offset})"),
            Mapping::Zero => write!(f, "Zero"),
            Mapping::One => write!(f, "One"),
            Mapping::Two => write!(f, "Two"),
            Mapping::Custom(_) => write!(f, "Custom"),
        }
    }
}
