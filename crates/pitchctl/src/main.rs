//! Pitch Master control CLI.
//!
//! One-shot subcommands for scripted use, an interactive console shell,
//! and a full-screen control panel.

mod panel;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pitch_analysis::export::{self, RunRecord};
use pitch_analysis::sinefit::{self, FitReport};
use pitch_proto::{Direction, Frame, MotorCommand, Waveform};
use pitch_rig::{Rig, RigConfig, RigError};

#[derive(Parser)]
#[command(name = "pitchctl")]
#[command(version, about = "Pitch Master Control Tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Force DEV_MODE: simulate I2C/GPIO instead of touching hardware
    #[arg(long, global = true)]
    dev: bool,

    /// Force the hardware backend (DEV_MODE off)
    #[arg(long, global = true, conflicts_with = "dev")]
    hardware: bool,

    /// I2C bus device path (overrides I2C_BUS_PATH)
    #[arg(long, global = true)]
    bus: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show rig, peripheral, and session status
    /// Examples:
    ///     pitchctl status
    ///     pitchctl status --json
    #[command(verbatim_doc_comment)]
    Status {
        /// Emit only the JSON response
        #[arg(short, long)]
        json: bool,
    },
    /// Start the motor
    /// Examples:
    ///     pitchctl start --speed 12.5
    ///     pitchctl start --speed 5 --waveform triangle --ramp 80 --direction ccw
    #[command(verbatim_doc_comment)]
    Start {
        /// Operating speed in Hz
        #[arg(short, long)]
        speed: f64,

        /// Speed waveform: sine, square, or triangle
        #[arg(short, long, default_value = "sine")]
        waveform: Waveform,

        /// Ramp multiplier (0-255)
        #[arg(short, long, default_value_t = 50)]
        ramp: u8,

        /// Rotation direction: cw or ccw
        #[arg(short, long, default_value = "cw")]
        direction: Direction,
    },
    /// Ramp the motor down and stop
    Stop,
    /// Engage the emergency stop (cuts motor power)
    Estop,
    /// Encoder operations
    Encoder {
        #[command(subcommand)]
        command: EncoderCommand,
    },
    /// Capture HLFB duty samples from the motor drive
    Hlfb {
        /// Number of samples to capture
        #[arg(short, long)]
        samples: Option<usize>,
    },
    /// One-shot characterization run: start, arm, capture, download, stop,
    /// and save the run CSV
    /// Examples:
    ///     pitchctl capture --speed 10 --out run.csv
    ///     pitchctl capture --speed 10 --samples 200 --hlfb-samples 50 --out run.csv
    #[command(verbatim_doc_comment)]
    Capture {
        /// Operating speed in Hz
        #[arg(short, long)]
        speed: f64,

        /// Speed waveform: sine, square, or triangle
        #[arg(short, long, default_value = "sine")]
        waveform: Waveform,

        /// Ramp multiplier (0-255)
        #[arg(short, long, default_value_t = 50)]
        ramp: u8,

        /// Rotation direction: cw or ccw
        #[arg(short, long, default_value = "cw")]
        direction: Direction,

        /// Encoder samples to record (default from config)
        #[arg(long)]
        samples: Option<usize>,

        /// HLFB samples to capture (default from config)
        #[arg(long)]
        hlfb_samples: Option<usize>,

        /// Output CSV path
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Fit the sinusoidal model to a saved run or to demo data
    /// Examples:
    ///     pitchctl fit run.csv
    ///     pitchctl fit run.csv --column angle --json
    ///     pitchctl fit --demo --noise 0.3
    #[command(verbatim_doc_comment)]
    Fit {
        /// Run CSV written by 'capture' or the panel
        path: Option<PathBuf>,

        /// Column to fit: hlfb or angle
        #[arg(long, default_value = "hlfb")]
        column: String,

        /// Fit generated demo data instead of a file
        #[arg(long)]
        demo: bool,

        /// Demo noise amplitude
        #[arg(long, default_value_t = 0.3)]
        noise: f64,

        /// Demo point count
        #[arg(long, default_value_t = 256)]
        points: usize,

        /// Emit only the JSON response
        #[arg(short, long)]
        json: bool,
    },
    /// Interactive console shell
    Shell,
    /// Full-screen control panel
    Panel,
}

#[derive(Subcommand)]
enum EncoderCommand {
    /// Read the shaft position once (no trigger)
    Read,
    /// Arm a triggered capture
    Arm {
        /// Number of samples to record
        #[arg(short, long)]
        samples: Option<usize>,
    },
    /// Download the captured samples
    Download {
        /// Emit only the JSON response
        #[arg(short, long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; logs go to stderr so command output stays clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,pitch_rig=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(
        dev_mode = config.dev_mode,
        bus = %config.bus_path,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Status { json } => cmd_status(config, json).await,
        Commands::Start {
            speed,
            waveform,
            ramp,
            direction,
        } => {
            cmd_start(
                config,
                MotorCommand {
                    waveform,
                    speed_hz: speed,
                    ramp,
                    direction,
                },
            )
            .await
        }
        Commands::Stop => cmd_stop(config).await,
        Commands::Estop => cmd_estop(config).await,
        Commands::Encoder { command } => cmd_encoder(config, command).await,
        Commands::Hlfb { samples } => cmd_hlfb(config, samples).await,
        Commands::Capture {
            speed,
            waveform,
            ramp,
            direction,
            samples,
            hlfb_samples,
            out,
        } => {
            cmd_capture(
                config,
                MotorCommand {
                    waveform,
                    speed_hz: speed,
                    ramp,
                    direction,
                },
                samples,
                hlfb_samples,
                out,
            )
            .await
        }
        Commands::Fit {
            path,
            column,
            demo,
            noise,
            points,
            json,
        } => cmd_fit(config, path, column, demo, noise, points, json),
        Commands::Shell => run_shell(Rig::new(config)?).await,
        Commands::Panel => panel::run_panel(Rig::new(config)?).await,
    }
}

fn load_config(cli: &Cli) -> Result<RigConfig> {
    let mut config = RigConfig::from_env().context("loading rig configuration")?;
    if cli.dev {
        config.dev_mode = true;
    }
    if cli.hardware {
        config.dev_mode = false;
    }
    if let Some(bus) = &cli.bus {
        config.bus_path = bus.clone();
    }
    Ok(config)
}

// ============================================================================
// One-shot commands
// ============================================================================

async fn cmd_status(config: RigConfig, json: bool) -> Result<()> {
    let rig = Rig::new(config)?;
    let status = rig.status().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "Rig status (DEV_MODE {})",
        if status.dev_mode { "on" } else { "off" }
    );
    println!(
        "  Power:    {}",
        if status.powered { "on" } else { "off (E-stop)" }
    );
    println!("  Motor:    {}", format_status(&status.motor));
    println!("  Encoder:  {}", format_status(&status.encoder));
    match rig.read_position().await {
        Ok(position) => println!("  Position: {position}"),
        Err(e) => println!("  Position: unavailable ({e})"),
    }
    println!(
        "  Session:  {} HLFB / {} encoder samples, E-stop {}",
        status.session.hlfb_samples,
        status.session.encoder_samples,
        if status.session.estop_engaged {
            "engaged"
        } else {
            "clear"
        }
    );
    Ok(())
}

fn format_status(status: &std::result::Result<pitch_proto::Status, String>) -> String {
    match status {
        Ok(s) => s.to_string(),
        Err(e) => format!("unavailable ({e})"),
    }
}

async fn cmd_start(config: RigConfig, cmd: MotorCommand) -> Result<()> {
    let mut rig = Rig::new(config)?;
    let speed = rig.start(&cmd).await?;
    println!(
        "Motor started: {speed} Hz {} waveform, ramp {}, {}",
        cmd.waveform, cmd.ramp, cmd.direction
    );
    Ok(())
}

async fn cmd_stop(config: RigConfig) -> Result<()> {
    let mut rig = Rig::new(config)?;
    rig.stop().await?;
    println!("Stop command sent");
    Ok(())
}

async fn cmd_estop(config: RigConfig) -> Result<()> {
    let mut rig = Rig::new(config)?;
    rig.emergency_stop().await?;
    println!("E-STOP engaged: motor power cut");
    Ok(())
}

async fn cmd_encoder(config: RigConfig, command: EncoderCommand) -> Result<()> {
    let default_samples = config.encoder_samples;
    let mut rig = Rig::new(config)?;

    match command {
        EncoderCommand::Read => {
            let position = rig.read_position().await?;
            println!("Current position: {position}");
        }
        EncoderCommand::Arm { samples } => {
            let samples = samples.unwrap_or(default_samples);
            rig.arm_encoder(samples).await?;
            println!("Encoder armed for {samples} samples, waiting for triggers");
        }
        EncoderCommand::Download { json } => {
            let count = rig.download_encoder().await?;
            if json {
                println!("{}", serde_json::to_string(&rig.session().encoder)?);
            } else {
                println!("Retrieved {count} encoder samples");
            }
        }
    }
    Ok(())
}

async fn cmd_hlfb(config: RigConfig, samples: Option<usize>) -> Result<()> {
    let samples = samples.unwrap_or(config.hlfb_samples);
    let mut rig = Rig::new(config)?;
    let count = rig.capture_hlfb(samples).await?;
    println!("Captured {count} HLFB samples");
    Ok(())
}

async fn cmd_capture(
    config: RigConfig,
    cmd: MotorCommand,
    samples: Option<usize>,
    hlfb_samples: Option<usize>,
    out: PathBuf,
) -> Result<()> {
    let enc_samples = samples.unwrap_or(config.encoder_samples);
    let duty_samples = hlfb_samples.unwrap_or(config.hlfb_samples);
    let mut rig = Rig::new(config)?;

    let run = {
        let rig = &mut rig;
        async move {
            rig.start(&cmd).await?;
            rig.arm_encoder(enc_samples).await?;
            rig.capture_hlfb(duty_samples).await?;
            rig.download_encoder().await?;
            Ok::<(), RigError>(())
        }
    }
    .await;

    // Stop the motor whether or not the capture succeeded.
    let stop = rig.stop().await;
    run.context("capture run failed")?;
    stop.context("stopping after capture")?;

    let session = rig.session();
    let record = RunRecord::new(
        session.last_speed_hz,
        session.hlfb.clone(),
        Some(session.encoder.clone()),
    );
    export::save(&out, &record)?;

    println!(
        "Saved {} HLFB and {} encoder samples to {}",
        record.hlfb.len(),
        session.encoder.len(),
        out.display()
    );
    Ok(())
}

fn cmd_fit(
    config: RigConfig,
    path: Option<PathBuf>,
    column: String,
    demo: bool,
    noise: f64,
    points: usize,
    json: bool,
) -> Result<()> {
    let (t, y) = if demo {
        sinefit::demo_series(points.max(16), noise, 42)
    } else {
        let path = path.context("provide a run CSV path or use --demo")?;
        let run = export::load(&path)?;
        let t = run.timebase(config.sample_rate_hz);
        let y = match column.as_str() {
            "hlfb" => run.hlfb.clone(),
            "angle" => run
                .angle_series()
                .context("run has no complete angle column; fit --column hlfb instead")?,
            other => anyhow::bail!("unknown column: {other} (expected hlfb or angle)"),
        };
        (t, y)
    };

    let report = sinefit::fit(&t, &y)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_fit_report(&report);
    }
    Ok(())
}

fn print_fit_report(report: &FitReport) {
    println!("--- Initial Guess ---");
    print_params(&report.guess);
    println!("--- Fitted Parameters ---");
    print_params(&report.params);
    println!(
        "({} in {} iterations, residual RMS {:.6})",
        if report.converged {
            "converged"
        } else {
            "did not converge"
        },
        report.iterations,
        report.residual_rms
    );
}

fn print_params(params: &sinefit::SineParams) {
    println!(
        "Amplitude: {:.4}  Frequency: {:.4} rad/s ({:.4} Hz)  Phase: {:.4}  Mean: {:.4}",
        params.amplitude,
        params.frequency,
        params.frequency_hz(),
        params.phase,
        params.mean
    );
}

// ============================================================================
// Interactive shell
// ============================================================================

const SHELL_HELP: &str = "Here are the available commands:

command  = define how the motor should operate
start    = run the motor start up sequence
stop     = run the motor stop sequence
estop    = engage the emergency stop
release  = release the emergency stop latch
position = read the encoder position once
arm      = arm a triggered encoder capture
read     = download the captured encoder data
hlfb     = capture HLFB samples from the motor drive
save     = save captured data to a CSV file
buf      = show the last command frame sent
exit     = exit the program";

async fn run_shell(mut rig: Rig) -> Result<()> {
    println!("Pitch Master interactive shell. Type 'help' for commands.");

    let mut pending: Option<MotorCommand> = None;
    let mut last_frame = Frame::default();

    loop {
        let line = prompt("\nType the command you would like to execute: ")?;
        if line.is_empty() {
            // stdin closed
            break;
        }
        match line.trim() {
            "help" => println!("{SHELL_HELP}"),
            "command" => match prompt_motor_command() {
                Ok(cmd) => {
                    match Frame::start(&cmd) {
                        Ok(frame) => last_frame = frame,
                        Err(e) => {
                            println!("Command not encodable: {e}");
                            continue;
                        }
                    }
                    pending = Some(cmd);
                    println!("\nWaveform command properly defined!");
                }
                Err(e) => println!("Invalid input: {e}"),
            },
            "start" => match &pending {
                Some(cmd) => {
                    println!(
                        "\nMotor will run a {} waveform at {} Hz with ramp multiplier {}.",
                        cmd.waveform, cmd.speed_hz, cmd.ramp
                    );
                    match rig.start(cmd).await {
                        Ok(speed) => {
                            if let Ok(frame) = Frame::start(cmd) {
                                last_frame = frame;
                            }
                            println!("Motor started at {speed} Hz");
                        }
                        Err(e) => println!("Start failed: {e}"),
                    }
                }
                None => println!("Define a command first (type 'command')"),
            },
            "stop" => match rig.stop().await {
                Ok(()) => {
                    last_frame = Frame::stop();
                    println!("Stop command sent");
                }
                Err(e) => println!("Stop failed: {e}"),
            },
            "estop" => match rig.emergency_stop().await {
                Ok(()) => {
                    last_frame = Frame::emergency_stop();
                    println!("E-STOP engaged: motor power cut");
                }
                Err(e) => println!("E-stop failed: {e}"),
            },
            "release" => match rig.release_estop() {
                Ok(()) => println!("E-stop released (motor remains stopped)"),
                Err(e) => println!("Release failed: {e}"),
            },
            "position" => match rig.read_position().await {
                Ok(position) => println!("Current position: {position}"),
                Err(e) => println!("Failed to read position: {e}"),
            },
            "arm" => {
                let samples = prompt_usize(
                    "Enter number of samples to record (default 200): ",
                    rig.config().encoder_samples,
                );
                match rig.arm_encoder(samples).await {
                    Ok(()) => println!("Armed. Waiting for triggers..."),
                    Err(e) => println!("Arm failed: {e}"),
                }
            }
            "read" => match rig.download_encoder().await {
                Ok(count) => println!("Retrieved {count} encoder samples"),
                Err(e) => println!("Read failed: {e}"),
            },
            "hlfb" => {
                let samples = prompt_usize(
                    "Enter number of samples to capture (default 50): ",
                    rig.config().hlfb_samples,
                );
                match rig.capture_hlfb(samples).await {
                    Ok(count) => println!("Captured {count} HLFB samples"),
                    Err(e) => println!("HLFB capture failed: {e}"),
                }
            }
            "save" => {
                let name = match prompt("Name the file: ") {
                    Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
                    _ => {
                        println!("No file name given. Skipping save.");
                        continue;
                    }
                };
                let path = PathBuf::from(format!("{name}.csv"));
                let session = rig.session();
                let encoder = (!session.encoder.is_empty()).then(|| session.encoder.clone());
                let record = RunRecord::new(session.last_speed_hz, session.hlfb.clone(), encoder);
                match export::save(&path, &record) {
                    Ok(()) => println!("CSV file created successfully: {}", path.display()),
                    Err(e) => println!("Save failed: {e}"),
                }
            }
            "buf" => println!("{last_frame} {:?}", last_frame.bytes()),
            "exit" => break,
            "" => {}
            other => println!("Unknown command: {other} (type 'help')"),
        }
    }

    Ok(())
}

fn prompt(text: &str) -> Result<String> {
    print!("{text}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line)
}

fn prompt_usize(text: &str, default: usize) -> usize {
    match prompt(text) {
        Ok(line) if !line.trim().is_empty() => line.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn prompt_motor_command() -> Result<MotorCommand> {
    println!(
        "
    1 = Sine
    2 = Square
    3 = Triangle
    "
    );
    let waveform: Waveform = prompt("Type the number corresponding to the waveform you desire: ")?
        .trim()
        .parse()
        .map_err(anyhow::Error::msg)?;
    println!("\n{waveform} waveform selected!");

    let speed_hz: f64 = prompt("\nType the operating speed you desire (Hz): ")?
        .trim()
        .parse()
        .context("operating speed must be a number")?;

    let ramp: u8 = prompt("Type the ramp multiplier (0-255): ")?
        .trim()
        .parse()
        .context("ramp multiplier must be between 0 and 255")?;

    let direction: Direction = {
        let line = prompt("Type the direction (cw/ccw, default cw): ")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Direction::Cw
        } else {
            trimmed.parse().map_err(anyhow::Error::msg)?
        }
    };

    Ok(MotorCommand {
        waveform,
        speed_hz,
        ramp,
        direction,
    })
}
