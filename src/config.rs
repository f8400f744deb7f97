//! Declarative spec descriptions, read from JSON.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::animation::SpringParameters;
use crate::spec::{
    DirectionalBuilder, DirectionalMotionSpec, Guarantee, Mapping, MotionSpec, MotionSpecBuilder,
};

/// Spec used when none is given.
pub const DEFAULT_SPEC: &str = include_str!("../resources/default-spec.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecConfig {
    pub max_direction: DirectionalConfig,
    /// Defaults to `max_direction`.
    #[serde(default)]
    pub min_direction: Option<DirectionalConfig>,
    #[serde(default)]
    pub reset_spring: Option<SpringParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectionalConfig {
    /// Spring of breakpoints that do not set one.
    #[serde(default)]
    pub default_spring: Option<SpringParameters>,
    pub initial: MappingConfig,
    #[serde(default)]
    pub breakpoints: Vec<BreakpointConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakpointConfig {
    pub position: f32,
    #[serde(default)]
    pub spring: Option<SpringParameters>,
    #[serde(default)]
    pub guarantee: Guarantee,
    #[serde(default)]
    pub jump: Option<JumpConfig>,
    pub segment: SegmentConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpConfig {
    To(f32),
    By(f32),
}

/// Segment following a breakpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentConfig {
    Mapping(MappingConfig),
    /// Keeps the value reached at the breakpoint.
    Constant,
    FractionalInput(f32),
    /// Moves linearly to this value at the next breakpoint.
    TargetValue(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingConfig {
    Identity,
    Zero,
    One,
    Two,
    Fixed(f32),
    Linear { factor: f32, offset: f32 },
}

impl MappingConfig {
    pub fn to_mapping(self) -> Mapping {
        match self {
            MappingConfig::Identity => Mapping::Identity,
            MappingConfig::Zero => Mapping::Zero,
            MappingConfig::One => Mapping::One,
            MappingConfig::Two => Mapping::Two,
            MappingConfig::Fixed(value) => Mapping::Fixed(value),
            MappingConfig::Linear { factor, offset } => Mapping::linear(factor, offset),
        }
    }
}

impl SpecConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("error reading {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("error parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_spec(self) -> anyhow::Result<MotionSpec> {
        let max_direction = self
            .max_direction
            .build()
            .context("invalid max direction")?;
        let mut builder = MotionSpecBuilder::new(max_direction);

        if let Some(min_direction) = self.min_direction {
            let min_direction = min_direction.build().context("invalid min direction")?;
            builder = builder.min_direction(min_direction);
        }
        if let Some(spring) = self.reset_spring {
            builder = builder.reset_spring(spring);
        }

        Ok(builder.build())
    }
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            max_direction: DirectionalConfig {
                default_spring: None,
                initial: MappingConfig::Identity,
                breakpoints: Vec::new(),
            },
            min_direction: None,
            reset_spring: None,
        }
    }
}

impl DirectionalConfig {
    pub fn build(self) -> anyhow::Result<DirectionalMotionSpec> {
        let spring = self.default_spring.unwrap_or_default();
        let mut builder = DirectionalBuilder::new(spring, self.initial.to_mapping());

        for breakpoint in self.breakpoints {
            builder = builder
                .to_breakpoint(breakpoint.position)
                .guarantee(breakpoint.guarantee);
            if let Some(spring) = breakpoint.spring {
                builder = builder.spring(spring);
            }
            builder = match breakpoint.jump {
                Some(JumpConfig::To(value)) => builder.jump_to(value),
                Some(JumpConfig::By(delta)) => builder.jump_by(delta),
                None => builder,
            };
            builder = match breakpoint.segment {
                SegmentConfig::Mapping(mapping) => builder.continue_with(mapping.to_mapping()),
                SegmentConfig::Constant => builder.continue_with_constant_value(),
                SegmentConfig::FractionalInput(fraction) => {
                    builder.continue_with_fractional_input(fraction)
                }
                SegmentConfig::TargetValue(target) => builder.continue_with_target_value(target),
            };
        }

        builder.build()
    }
}
