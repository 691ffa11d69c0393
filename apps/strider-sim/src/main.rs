//! Strider walking simulation CLI.
//!
//! Provides three modes of operation:
//! - `walk`: Prepare and walk the supervisor against mock collaborators
//! - `adaptation-sweep`: Solve the step-adaptation QP over a range of DCM errors
//! - `default-config`: Print the default configuration as TOML

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use nalgebra::Vector2;
use strider_adapt::{StepAdaptationEngine, StepAdaptationRequest};
use strider_core::config::StepAdaptationConfig;
use strider_core::WalkingConfig;
use strider_test_utils::{
    straight_walk, PassthroughKinematics, RecordingIk, ScriptedPlanner, SimulatedRobot, WalkParams,
};
use strider_walking::{
    Collaborators, CommandHandle, ControlLoop, CycleCommand, CycleStatus, LoopControl, Supervisor,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const JOINTS: usize = 12;
const WEIGHT: f64 = 600.0;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Bipedal walking core driven by mock collaborators.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the robot and walk a straight plan.
    Walk(WalkArgs),

    /// Adapted step for a range of measured DCM errors.
    AdaptationSweep {
        /// Largest DCM error in metres (swept symmetrically).
        #[arg(long, default_value_t = 0.12)]
        max_offset: f64,

        /// Number of sweep points.
        #[arg(short = 'n', long, default_value_t = 7)]
        samples: usize,
    },

    /// Print the default configuration.
    DefaultConfig,
}

#[derive(Args, Default)]
struct WalkArgs {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control cycles to run after preparation.
    #[arg(short, long, default_value_t = 400)]
    ticks: usize,

    /// Steps in the initial plan.
    #[arg(long, default_value_t = 4)]
    steps: usize,

    /// Forward goal sent once walking starts.
    #[arg(long)]
    goal: Option<f64>,

    /// Forward DCM measurement error injected during the walk, in metres.
    #[arg(long, default_value_t = 0.0)]
    dcm_offset: f64,

    /// Walking cycle at which the DCM error appears.
    #[arg(long, default_value_t = 60)]
    disturb_at: usize,

    /// Cycles the DCM error lasts.
    #[arg(long, default_value_t = 40)]
    disturb_for: usize,

    /// Uniform DCM noise amplitude in metres.
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Print every n-th walking cycle.
    #[arg(long, default_value_t = 25)]
    print_every: usize,

    /// Run on the periodic control thread at the configured rate.
    #[arg(long)]
    realtime: bool,
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn build_supervisor(
    config: WalkingConfig,
    args: &WalkArgs,
) -> Result<(Supervisor, impl Fn(Vector2<f64>)), Box<dyn Error>> {
    let walk = WalkParams {
        dt: config.general.sampling_time,
        omega: config.general.omega(),
        com_height: config.general.nominal_com_height,
        steps: args.steps,
        ..WalkParams::default()
    };
    let (planner, _) = ScriptedPlanner::new(straight_walk(&walk), walk);
    let (robot, _) = SimulatedRobot::new(JOINTS, WEIGHT);
    let (kinematics, probe) = PassthroughKinematics::new(config.general.nominal_com_height);
    let kinematics = if args.noise > 0.0 {
        kinematics.with_noise(args.seed, args.noise)
    } else {
        kinematics
    };
    let (ik, _) = RecordingIk::new(JOINTS);

    let supervisor = Supervisor::configure(
        config,
        Collaborators {
            planner: Box::new(planner),
            robot: Box::new(robot),
            kinematics: Box::new(kinematics),
            ik: Box::new(ik),
        },
    )?;
    let disturb = move |offset: Vector2<f64>| probe.lock().dcm_offset = offset;
    Ok((supervisor, disturb))
}

fn print_command(command: &CycleCommand) {
    let step = command.adapted_step.map_or_else(
        || "-".to_owned(),
        |s| format!("{} x={:+.4} t={:.3}", s.foot, s.zmp.x, s.impact_time),
    );
    println!(
        "t={:7.3}  zmp=({:+.4}, {:+.4})  measured=({:+.4}, {:+.4})  com=({:+.4}, {:+.4})  step: {step}",
        command.time,
        command.desired_zmp.x,
        command.desired_zmp.y,
        command.measured_zmp.x,
        command.measured_zmp.y,
        command.com.position.x,
        command.com.position.y,
    );
}

fn run_walk(args: &WalkArgs) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => WalkingConfig::from_file(path)?,
        None => WalkingConfig::default(),
    };
    let period = Duration::from_secs_f64(config.general.sampling_time);
    let (mut supervisor, disturb) = build_supervisor(config, args)?;
    supervisor.prepare()?;

    if args.realtime {
        return run_realtime(supervisor, args, period);
    }

    let offset = Vector2::new(args.dcm_offset, 0.0);
    let mut walked = 0;
    let mut failures = 0;
    let mut adapted = 0;
    while walked < args.ticks {
        if walked == args.disturb_at {
            disturb(offset);
        }
        if walked == args.disturb_at + args.disturb_for {
            disturb(Vector2::zeros());
        }
        match supervisor.run_cycle() {
            Ok(CycleStatus::Prepared) => {
                supervisor.start_walking()?;
                if let Some(goal) = args.goal {
                    supervisor.set_goal(goal, 0.0)?;
                }
            }
            Ok(CycleStatus::Walked(command)) => {
                if walked % args.print_every.max(1) == 0 {
                    print_command(&command);
                }
                adapted += usize::from(command.adapted_step.is_some());
                walked += 1;
            }
            Ok(CycleStatus::Preparing | CycleStatus::Idle) => {}
            Err(e) => {
                warn!(stage = %e.stage, error = %e.source, "cycle failed");
                failures += 1;
                walked += 1;
            }
        }
    }

    println!(
        "\ntotal: cycles={walked}, failures={failures}, cycles with adapted step={adapted}, time={:.3}s",
        supervisor.time()
    );
    Ok(())
}

fn run_realtime(supervisor: Supervisor, args: &WalkArgs, period: Duration) -> Result<(), Box<dyn Error>> {
    let handle = CommandHandle::new(supervisor);
    let commands = handle.clone();
    let goal = args.goal;
    let ticks = args.ticks;
    let print_every = args.print_every.max(1);
    let mut walked = 0;

    let control = ControlLoop::spawn_with_handle(handle, period, move |outcome| {
        match outcome {
            Ok(CycleStatus::Prepared) => {
                let started = commands
                    .start_walking()
                    .map_err(Into::into)
                    .and_then(|()| goal.map_or(Ok(()), |x| commands.set_goal(x, 0.0)));
                if let Err(e) = started {
                    error!(error = %e, "could not start walking");
                    return LoopControl::Halt;
                }
            }
            Ok(CycleStatus::Walked(command)) => {
                if walked % print_every == 0 {
                    print_command(command);
                }
                walked += 1;
            }
            Ok(_) => {}
            Err(_) => walked += 1,
        }
        if walked >= ticks {
            LoopControl::Halt
        } else {
            LoopControl::Continue
        }
    })?;
    let commands = control.handle();
    control.join();
    info!(phase = %commands.phase(), time = commands.inspect(Supervisor::time), "realtime session finished");
    Ok(())
}

fn run_adaptation_sweep(max_offset: f64, samples: usize) -> Result<(), Box<dyn Error>> {
    let mut engine = StepAdaptationEngine::new(&StepAdaptationConfig::default())?;
    let omega = (9.81_f64 / 0.6).sqrt();
    let sigma = (omega * 0.5).exp();
    let dcm_offset = 0.5 / (sigma - 1.0);
    println!("nominal: step=0.500 m  duration=0.500 s  sigma={sigma:.4}  dcm_offset={dcm_offset:.4}");
    println!("{:>9} {:>9} {:>10} {:>10}", "error", "zmp", "duration", "dcm_off");

    #[allow(clippy::cast_precision_loss)]
    let span = samples.saturating_sub(1).max(1) as f64;
    for i in 0..samples {
        #[allow(clippy::cast_precision_loss)]
        let error = if samples > 1 {
            -max_offset + 2.0 * max_offset * i as f64 / span
        } else {
            0.0
        };
        let request = StepAdaptationRequest {
            nominal_zmp_position: 0.5,
            nominal_sigma: sigma,
            nominal_dcm_offset: dcm_offset,
            desired_dcm_at_merge_point: 0.5 + dcm_offset,
            omega,
            measured_zmp: 0.0,
            measured_dcm: (0.5 + dcm_offset) / sigma + error,
        };
        let result = engine.solve(&request)?;
        println!(
            "{error:>+9.4} {:>9.4} {:>10.4} {:>10.4}",
            result.zmp_position,
            result.step_duration(omega),
            result.dcm_offset
        );
    }
    Ok(())
}

fn run_default_config() -> Result<(), Box<dyn Error>> {
    print!("{}", toml::to_string_pretty(&WalkingConfig::default())?);
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Some(Commands::Walk(args)) => run_walk(&args),
        Some(Commands::AdaptationSweep {
            max_offset,
            samples,
        }) => run_adaptation_sweep(max_offset, samples),
        Some(Commands::DefaultConfig) => run_default_config(),
        None => {
            // Default: a short walk with defaults
            run_walk(&WalkArgs {
                ticks: 400,
                steps: 4,
                disturb_at: 60,
                disturb_for: 40,
                print_every: 25,
                ..WalkArgs::default()
            })
        }
    }
}
