//! # gearbox
//!
//! Headless front end for the actuator control core.
//!
//! ```bash
//! # write ~/.gearbox/config.toml with every actuator in simulation
//! gearbox init-config
//!
//! # run the configured climb plan against the simulated plants
//! gearbox climb --cycles 3000
//!
//! # drive one actuator open loop and report the speed it reaches
//! gearbox characterize flywheel --volts 12
//! ```
//!
//! The binary ships no motor-controller drivers, so actuators configured as
//! `real` are run in simulation instead.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use gearbox_runtime::{Robot, RobotConfig, telemetry};
use gearbox_sequencer::StageStatus;
use gearbox_types::{ActuatorId, ClimbState, GearboxError, HardwareMode};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gearbox")]
#[command(about = "Actuator control and climb sequencing, run headless", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file [default: ~/.gearbox/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the configured climb plan until DONE
    Climb {
        /// Give up after this many control cycles
        #[arg(long, default_value_t = 3000)]
        cycles: u64,

        /// Pace cycles at the configured loop period instead of running flat out
        #[arg(long)]
        realtime: bool,
    },

    /// Apply a constant voltage to one actuator and report the speed reached
    Characterize {
        /// flywheel, feeder, intake_roller, elevator_extension or elevator_pivot
        actuator: ActuatorId,

        #[arg(long, default_value_t = 12.0, allow_negative_numbers = true)]
        volts: f64,

        #[arg(long, default_value_t = 250)]
        cycles: u64,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    telemetry::init_tracing("gearbox");

    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(config::config_path);

    let result = match cli.command {
        Commands::Climb { cycles, realtime } => run_climb(&path, cycles, realtime),
        Commands::Characterize { actuator, volts, cycles } => run_characterize(&path, actuator, volts, cycles),
        Commands::InitConfig { force } => run_init_config(&path, force),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

// ── Robot assembly ───────────────────────────────────────────────────────────

fn build_robot(path: &Path) -> Result<Robot, GearboxError> {
    let mut cfg = config::load_or_default(path)?;
    simulate_real_actuators(&mut cfg);
    Robot::from_config(&cfg, None)
}

/// Swap `real` actuators to `sim`; `replay` ones stay inert.
fn simulate_real_actuators(cfg: &mut RobotConfig) {
    for (id, actuator) in cfg.actuators.iter_mut() {
        if actuator.mode == HardwareMode::Real {
            info!(actuator = %id, "no driver available, simulating");
            actuator.mode = HardwareMode::Sim;
        }
    }
}

// ── climb ────────────────────────────────────────────────────────────────────

fn run_climb(path: &Path, cycles: u64, realtime: bool) -> Result<(), GearboxError> {
    let mut robot = build_robot(path)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    let period = Duration::from_secs_f64(robot.loop_period_s());
    let mut state = robot.sequencer().current_state();
    let mut blocked = false;
    println!("{} {}", "climb:".bold(), state.to_string().cyan());

    for _ in 0..cycles {
        if interrupted.load(Ordering::SeqCst) {
            robot.cancel_climb();
            robot.stop_all();
            robot.periodic();
            println!("{} cancelled in {}", "climb:".bold(), state.to_string().yellow());
            return Ok(());
        }

        let status = robot.climb_periodic();
        match status {
            StageStatus::Blocked(blocks) if !blocked => {
                println!("{} blocked: {blocks:?}", "climb:".bold().red());
                blocked = true;
            }
            StageStatus::Blocked(_) => {}
            _ => blocked = false,
        }

        let next = robot.sequencer().current_state();
        if next != state {
            println!(
                "{} {} → {} (cycle {})",
                "climb:".bold(),
                state.to_string().dimmed(),
                next.to_string().cyan(),
                robot.cycle()
            );
            state = next;
        }
        if state == ClimbState::Done {
            print_snapshot(&robot);
            return Ok(());
        }
        if realtime {
            std::thread::sleep(period);
        }
    }

    print_snapshot(&robot);
    Err(GearboxError::Configuration(format!(
        "climb did not finish within {cycles} cycles (stuck in {state})"
    )))
}

fn print_snapshot(robot: &Robot) {
    match serde_json::to_string_pretty(&robot.snapshot()) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(error = %e, "could not render snapshot"),
    }
}

// ── characterize ─────────────────────────────────────────────────────────────

fn run_characterize(path: &Path, id: ActuatorId, volts: f64, cycles: u64) -> Result<(), GearboxError> {
    let mut robot = build_robot(path)?;
    let controller = robot
        .controller_mut(id)
        .ok_or_else(|| GearboxError::Configuration(format!("{id} is not configured")))?;
    controller.run_open_loop(volts);

    for _ in 0..cycles {
        robot.periodic();
    }
    let Some(controller) = robot.controller(id) else {
        return Ok(());
    };
    let inputs = controller.inputs();

    println!("{} {} at {volts:.2} V for {cycles} cycles", "characterize:".bold(), id.to_string().cyan());
    println!("  velocity      {:>10.3}", inputs.velocity);
    println!("  position      {:>10.3}", inputs.position);
    println!("  applied volts {:>10.3}", inputs.applied_volts);
    println!("  current       {:>10.3} A", inputs.current_amps);
    if let Some(fault) = controller.fault() {
        println!("  {} {fault:?}", "fault".red().bold());
    }
    robot.stop_all();
    robot.periodic();
    Ok(())
}

// ── init-config ──────────────────────────────────────────────────────────────

fn run_init_config(path: &Path, force: bool) -> Result<(), GearboxError> {
    if path.exists() && !force {
        println!("{} {} already exists (use --force to overwrite)", "init-config:".bold(), path.display());
        return Ok(());
    }
    config::save_to(&RobotConfig::default(), path)?;
    println!("{} wrote {}", "init-config:".bold(), path.display().to_string().green());
    Ok(())
}
