//! `tank` – command line entry point.
//!
//! 1. Loads `tank.toml` (or `--config PATH`).
//! 2. Brings up the motion controller: waits for the OctoPrint API, connects
//!    the printer board and sends the bring-up batch.  With `--dry-run` no
//!    request leaves the process; commands are only logged.
//! 3. Wires camera, detector and speech and runs the behavior loop
//!    (`--random` runs random chain moves instead of tracking).
//! 4. Ctrl-C stops the loop at the next cycle boundary; a second Ctrl-C
//!    exits immediately.
//!
//! A transport or configuration error ends the process with status 1.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use tracing::{error, info, warn};

use tank_hal::{
    Camera, Clock, DisconnectedCamera, DryRunTransport, FixedBackoff, HttpSnapshotCamera,
    MotionClient, MotionTransport, OctoPrintTransport, PhraseLibrary, PlayerSpeaker,
    SilentSpeaker, Speaker, SystemClock,
};
use tank_perception::{DetectionRecorder, Detector, HttpDetector, NoDetector, PersonSignal};
use tank_runtime::{BehaviorController, SpeechCue, init_tracing};
use tank_types::TankError;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "tank")]
#[command(version)]
#[command(about = "Person-tracking tank controller")]
struct Args {
    /// Log motion commands instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Wander at random instead of tracking people
    #[arg(long)]
    random: bool,

    /// Configuration file
    #[arg(long, default_value = "tank.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_tracing("tank");

    print_banner(&args);

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            eprintln!("{}", "  Second Ctrl-C, exiting now.".red().bold());
            std::process::exit(130);
        }
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping after the current cycle …".yellow().bold()
        );
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; the loop can only be killed");
    }

    match run(&args, &shutdown) {
        Ok(()) => {
            println!("{}", "  ✓ Tank stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "tank stopped on fatal error");
            eprintln!("{}: {}", "Fatal".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, shutdown: &AtomicBool) -> Result<(), TankError> {
    let cfg = config::load_from(&args.config)?;
    info!(path = %args.config.display(), config = ?cfg, "configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let transport: Box<dyn MotionTransport> = if args.dry_run {
        Box::new(DryRunTransport::new())
    } else {
        Box::new(OctoPrintTransport::new(
            cfg.octoprint.url.clone(),
            cfg.octoprint.api_key.clone(),
        )?)
    };
    let mut motion = MotionClient::new(transport);
    motion.bring_up(
        &cfg.connection_params(),
        &FixedBackoff::new(cfg.liveness_interval()),
        clock.as_ref(),
    )?;

    let person = person_signal(&cfg, clock.clone())?;
    let speech = SpeechCue::new(speaker(&cfg)?);
    let mut controller =
        BehaviorController::new(cfg.controller_config()?, motion, person, speech, clock);

    if args.random {
        controller.run_random(shutdown)
    } else {
        controller.run(shutdown)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

fn person_signal(cfg: &Config, clock: Arc<dyn Clock>) -> Result<PersonSignal, TankError> {
    let d = &cfg.detection;
    let camera: Box<dyn Camera> = match &d.camera_url {
        Some(url) => Box::new(HttpSnapshotCamera::new(
            "camera",
            url.clone(),
            d.frame_width,
            d.frame_height,
        )
        .map_err(as_config)?),
        None => {
            warn!("no camera configured; the tank will only wander");
            Box::new(DisconnectedCamera::new("camera"))
        }
    };
    let detector: Box<dyn Detector> = match &d.detector_url {
        Some(url) => Box::new(HttpDetector::new(url.clone()).map_err(as_config)?),
        None => Box::new(NoDetector),
    };

    let signal = PersonSignal::new(camera, detector, cfg.person_filter(), clock);
    Ok(match &d.memory_dir {
        Some(dir) => signal.with_recorder(DetectionRecorder::new(dir, cfg.save_interval())),
        None => signal,
    })
}

/// A client that cannot even be built is a setup problem, not a runtime one.
fn as_config(e: TankError) -> TankError {
    TankError::Config(e.to_string())
}

fn speaker(cfg: &Config) -> Result<Box<dyn Speaker>, TankError> {
    let Some(speech) = &cfg.speech else {
        info!("no [speech] table; cues are only logged");
        return Ok(Box::new(SilentSpeaker));
    };
    let library = PhraseLibrary::scan(&speech.phrases_dir)?;
    Ok(Box::new(PlayerSpeaker::new(
        library,
        speech.player.clone(),
        speech.tts.clone(),
    )))
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(args: &Args) {
    println!();
    println!("{}", r#"  ______          __  "#.bold().green());
    println!("{}", r#" /_  __/__ ____  / /__"#.bold().green());
    println!("{}", r#"  / / / _ `/ _ \/  '_/"#.bold().green());
    println!("{}", r#" /_/  \_,_/_//_/_/\_\ "#.bold().green());
    println!();
    println!(
        "  {} {}",
        "Tank".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    let mode = match (args.dry_run, args.random) {
        (true, true) => "dry run, random",
        (true, false) => "dry run",
        (false, true) => "live, random",
        (false, false) => "live",
    };
    println!("  Mode: {}", mode.bold());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_live_tracking_with_local_config() {
        let args = Args::try_parse_from(["tank"]).unwrap();
        assert!(!args.dry_run);
        assert!(!args.random);
        assert_eq!(args.config, PathBuf::from("tank.toml"));
    }

    #[test]
    fn parses_all_flags() {
        let args =
            Args::try_parse_from(["tank", "--dry-run", "--random", "--config", "/etc/tank.toml"])
                .unwrap();
        assert!(args.dry_run);
        assert!(args.random);
        assert_eq!(args.config, PathBuf::from("/etc/tank.toml"));
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Args::try_parse_from(["tank", "--turbo"]).is_err());
    }

    fn sample_config() -> Config {
        let raw = r#"
[octoprint]
url = "http://octopi.local/api"

[motion]
chain_min = 0
chain_max = 2000
chain_speed = 6000
chain_time_per_1000 = 1.0
gun_min = 0
gun_max = 2000
gun_max_per_move = 50
gun_speed = 3000
gun_time_per_1000 = 0.5

[behavior]
time_scale = 3.0
wait_for_camera_time = 10.0

[detection]
confidence_threshold = 0.5
person_class = 0
"#;
        config::parse(raw).unwrap()
    }

    #[test]
    fn without_camera_signal_reports_never_seen() {
        let cfg = sample_config();
        let mut signal = person_signal(&cfg, Arc::new(SystemClock)).unwrap();
        let r = signal.poll();
        assert!(!r.person_detected());
        assert!(r.camera_last_seen.is_none());
    }

    #[test]
    fn missing_phrases_dir_is_config_error() {
        let mut cfg = sample_config();
        cfg.speech = Some(config::SpeechConfig {
            phrases_dir: PathBuf::from("/definitely/not/here"),
            player: vec!["aplay".into()],
            tts: vec![],
        });
        assert!(matches!(speaker(&cfg), Err(TankError::Config(_))));
    }

    #[test]
    fn dry_run_brings_up_without_network() {
        let cfg = sample_config();
        let transport = DryRunTransport::new();
        let log = transport.log();
        let mut motion = MotionClient::new(Box::new(transport));
        motion
            .bring_up(
                &cfg.connection_params(),
                &FixedBackoff::new(cfg.liveness_interval()),
                &SystemClock,
            )
            .unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
