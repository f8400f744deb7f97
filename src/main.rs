#[macro_use]
extern crate tracing;

use std::cell::Cell;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, ensure};
use calloop::timer::{TimeoutAction, Timer};
use calloop::EventLoop;
use clap::Parser;
use mechanics::animation::Clock;
use mechanics::cli::{Cli, SimulateArgs, Sub};
use mechanics::config::{SpecConfig, DEFAULT_SPEC};
use mechanics::frame_clock::{FrameClock, FrameTicker};
use mechanics::motion::gesture::DistanceGestureContext;
use mechanics::motion::{FrameData, MotionValue};
use mechanics::spec::{InputDirection, MotionSpec};
use mechanics::utils::{lerp, version};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "mechanics=debug";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    tracy_client::Client::start();

    match cli.subcommand {
        Sub::Validate { spec } => {
            load_spec(Some(spec))?;
            info!("spec is valid");
        }
        Sub::Simulate(args) => {
            info!("starting version {}", &version());
            let frames = simulate(args.clone())?;
            print_frames(&frames, args.json)?;
        }
    }

    Ok(())
}

fn env_spec_path() -> Option<PathBuf> {
    env::var_os("MECHANICS_SPEC")
        .filter(|x| !x.is_empty())
        .map(PathBuf::from)
}

fn load_spec(path: Option<PathBuf>) -> anyhow::Result<MotionSpec> {
    let config = match path.or_else(env_spec_path) {
        Some(path) => {
            debug!("loading spec from {path:?}");
            SpecConfig::load(&path)?
        }
        None => SpecConfig::parse(DEFAULT_SPEC)?,
    };
    config.into_spec()
}

struct Simulation {
    args: SimulateArgs,
    input: Rc<Cell<f32>>,
    gesture: Rc<DistanceGestureContext>,
    value: MotionValue,
    ticker: Option<FrameTicker>,
    frame_clock: FrameClock,
    frame: u32,
    recorded: Vec<FrameData>,
}

impl Simulation {
    fn total_frames(&self) -> u32 {
        self.args.frames + self.args.settle_frames
    }

    /// Records the frame committed for the previous tick and ticks the next one.
    ///
    /// Returns `false` once the simulation is over.
    fn on_timer(&mut self) -> bool {
        if self.frame > 0 {
            self.recorded.push(self.value.frame_data());
        }

        if self.frame > self.total_frames() {
            // Ends the driver.
            self.ticker = None;
            return false;
        }
        let Some(ticker) = &mut self.ticker else {
            return false;
        };

        let progress = (self.frame as f32 / self.args.frames.max(1) as f32).min(1.);
        let offset = lerp(self.args.from, self.args.to, progress);
        self.input.set(offset);
        self.gesture.set_drag_offset(offset);

        let frame_time = self.frame_clock.next_presentation_time();
        ticker.tick(frame_time);
        self.frame_clock.presented(frame_time);

        self.frame += 1;
        true
    }
}

fn simulate(args: SimulateArgs) -> anyhow::Result<Vec<FrameData>> {
    ensure!(
        args.refresh.is_finite() && args.refresh > 0.,
        "refresh rate must be positive, got {}",
        args.refresh
    );
    let refresh_interval = Duration::from_secs_f64(1. / args.refresh);

    let spec = load_spec(args.spec.clone())?;

    let mut clock = Clock::default();
    clock.set_rate(args.rate);

    let direction = if args.to >= args.from {
        InputDirection::Max
    } else {
        InputDirection::Min
    };
    let gesture = Rc::new(DistanceGestureContext::new(args.from, direction, args.slop)?);

    let input = Rc::new(Cell::new(args.from));
    let value = MotionValue::new(
        {
            let input = input.clone();
            move || input.get()
        },
        gesture.clone(),
        spec,
        clock.clone(),
    )
    .with_label("simulation");

    let mut ticker = FrameTicker::new(clock);
    let ticks = ticker.subscribe();

    let mut event_loop = EventLoop::<Simulation>::try_new()?;
    let handle = event_loop.handle();
    let signal = event_loop.get_signal();

    let (executor, scheduler) = calloop::futures::executor::<anyhow::Result<()>>()?;
    handle
        .insert_source(executor, |result, _, _| {
            if let Err(err) = result {
                warn!("error driving the motion value: {err:?}");
            }
        })
        .map_err(|err| err.error)?;

    let driver = value.clone();
    scheduler
        .schedule(async move { driver.keep_running(&ticks).await })
        .map_err(|err| anyhow!("error scheduling the driver: {err}"))?;

    handle
        .insert_source(Timer::immediate(), move |_, _, state: &mut Simulation| {
            if state.on_timer() {
                TimeoutAction::ToDuration(refresh_interval)
            } else {
                signal.stop();
                TimeoutAction::Drop
            }
        })
        .map_err(|err| err.error)?;

    let mut state = Simulation {
        args,
        input,
        gesture,
        value,
        ticker: Some(ticker),
        frame_clock: FrameClock::new(Some(refresh_interval), false),
        frame: 0,
        recorded: Vec::new(),
    };

    event_loop.run(None, &mut state, |_| ())?;

    debug!("simulated {} frames", state.recorded.len());
    Ok(state.recorded)
}

fn print_frames(frames: &[FrameData], json: bool) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();

    for (i, frame) in frames.iter().enumerate() {
        if json {
            serde_json::to_writer(&mut out, frame)?;
            writeln!(out)?;
            continue;
        }

        let stable = if frame.is_stable { "" } else { " animating" };
        writeln!(
            out,
            "{i:>4} input {:>9.3} output {:>9.4} target {:>9.4} {:?} {}{stable}",
            frame.input, frame.output, frame.output_target, frame.change, frame.segment,
        )?;
    }

    out.flush()?;
    Ok(())
}
