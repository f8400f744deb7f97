use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::utils::version;

#[derive(Parser)]
#[command(author, version = version(), about, long_about = None)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Sub,
}

#[derive(Subcommand)]
pub enum Sub {
    /// Drag through a spec and print the motion value of every frame.
    Simulate(SimulateArgs),
    /// Validate a spec description.
    Validate {
        /// Path to the JSON spec description.
        spec: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to a JSON spec description (default: a built-in demo spec).
    #[arg(short, long)]
    pub spec: Option<PathBuf>,

    /// Drag offset at the start of the drag.
    #[arg(long, default_value_t = 0., allow_negative_numbers = true)]
    pub from: f32,

    /// Drag offset at the end of the drag.
    #[arg(long, default_value_t = 200., allow_negative_numbers = true)]
    pub to: f32,

    /// Number of frames the drag takes.
    #[arg(long, default_value_t = 30)]
    pub frames: u32,

    /// Frames to keep running after the drag ended.
    #[arg(long, default_value_t = 30)]
    pub settle_frames: u32,

    /// Refresh rate in Hz.
    #[arg(long, default_value_t = 60.)]
    pub refresh: f64,

    /// Animation clock rate, below 1 for slow motion.
    #[arg(long, default_value_t = 1.)]
    pub rate: f64,

    /// Drag distance back that flips the gesture direction.
    #[arg(long, default_value_t = 0.)]
    pub slop: f32,

    /// Print one JSON object per frame.
    #[arg(short, long)]
    pub json: bool,
}
