/**
 * AUV Mission Runner
 *
 * 1. Loads the mission config (TOML)
 * 2. Opens the serial link to the vehicle board
 * 3. Runs the configured sub-tasks in order against a detection source
 * 4. Stops the thrusters on exit or Ctrl-C
 *
 * Usage: auv_mission --replay detections.jsonl [--config mission.toml] [--port /dev/ttyACM0]
 *        auv_mission --dry-run [--config mission.toml]
 */

use std::path::PathBuf;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use clap::Parser;

use auv_mission::{
    CancellationToken, MissionConfig, MissionContext, MissionError, ReplayDetector, SerialVehicle,
};

#[derive(Parser, Debug)]
#[command(name = "auv_mission", about = "Run the configured AUV mission")]
struct Args{
    /// Mission config file; built-in defaults when omitted
    #[arg(long, env = "AUV_MISSION_CONFIG")]
    config: Option<PathBuf>,

    /// Serial port of the vehicle board (overrides the config)
    #[arg(long, env = "AUV_MISSION_PORT")]
    port: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Recorded detections (JSON lines) to feed the mission
    #[arg(long, required_unless_present = "dry_run")]
    replay: Option<PathBuf>,

    /// Print the resolved mission and exit without opening the link
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()>{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config{
        Some(path) => MissionConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MissionConfig::from_toml_str("").context("resolving default config")?,
    };
    if let Some(port) = args.port{
        cfg.link.port = port;
    }
    if let Some(baud) = args.baud{
        cfg.link.baud = baud;
    }

    let mut sequencer = cfg.build_sequencer();
    log::info!("link: {} @ {} baud", cfg.link.port, cfg.link.baud);
    for (idx, name) in sequencer.task_names().enumerate(){
        log::info!("task {}: {}", idx + 1, name);
    }
    if args.dry_run{
        return Ok(());
    }

    let Some(replay) = args.replay else{
        bail!("--replay is required to run the mission");
    };
    let mut detector = ReplayDetector::open(&replay)
        .with_context(|| format!("opening replay {}", replay.display()))?;

    let mut link = SerialVehicle::new(&cfg.link.port, cfg.link.baud)
        .with_depth_gain(cfg.link.depth_kp, cfg.link.depth_max_heave)
        .start()
        .context("starting vehicle link")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("interrupt received, cancelling mission");
        on_signal.cancel();
    })
    .context("installing Ctrl-C handler")?;

    // let the board report its first sensor frames
    std::thread::sleep(Duration::from_secs(1));

    let mut actuator = link.handle();
    let sensors = link.handle();
    let result = {
        let mut ctx = MissionContext::new(&mut actuator, &sensors, &mut detector, cancel);
        sequencer.run(&mut ctx)
    };
    link.shutdown();

    match result{
        Ok(report) if report.is_clean() => {
            log::info!("mission complete");
            Ok(())
        }
        Ok(report) => {
            for (name, err) in &report.failed{
                log::error!("{}: {}", name, err);
            }
            bail!("{} of {} tasks failed", report.failed.len(), sequencer.len())
        }
        Err(MissionError::Cancelled{ task }) => {
            log::warn!("mission cancelled during {}", task);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
