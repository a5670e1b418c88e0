//! open-h80i CLI: command-line cooler control tool.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use open_h80i_core::comm::ErrorClass;
use open_h80i_core::commands;
use open_h80i_core::config::SessionConfig;
use open_h80i_core::device::{Color, LedMode};
use open_h80i_core::profile::{self, Profile};
use open_h80i_core::safety::{Percent, COOLING_DISCLAIMER};
use open_h80i_core::session::DeviceSession;
use open_h80i_core::usb::{RusbHandle, RusbTransport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Pause between the demo writes and the second status read.
const DEMO_SETTLE: Duration = Duration::from_secs(2);

type Session = DeviceSession<RusbHandle>;

#[derive(Parser)]
#[command(
    name = "open-h80i",
    version,
    about = "Open-source Corsair H80i V2 cooler control"
)]
struct Cli {
    /// USB product ID (hex, e.g. 0c12).
    #[arg(long, global = true, value_parser = parse_hex_u16)]
    pid: Option<u16>,

    /// JSON session configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (also enables libusb debug output).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected Corsair coolers.
    ListDevices,
    /// Print liquid temperature and pump/fan speeds.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Set pump speed (percent; values above 100 are clamped).
    SetPump { percent: u32 },
    /// Set one fan's speed.
    SetFan {
        /// Fan header index (0 or 1).
        index: u8,
        /// Speed in percent; values above 100 are clamped.
        percent: u32,
    },
    /// Set both fans to the same speed.
    SetFans { percent: u32 },
    /// Set LED mode and colour.
    SetLed {
        /// Mode: static, blink, pulse, rainbow.
        mode: String,
        /// Colour as rrggbb.
        color: String,
    },
    /// Apply a cooling profile (defaults to the built-in profile).
    Apply { profile: Option<PathBuf> },
    /// Write the built-in profile to a file.
    SaveProfile { path: PathBuf },
    /// Read status, apply demo settings, wait, and read status again.
    Demo,
}

fn parse_hex_u16(s: &str) -> std::result::Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex product ID '{s}': {e}"))
}

fn session_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(pid) = cli.pid {
        config.product_id = pid;
    }
    Ok(config)
}

fn open_session(transport: &RusbTransport, config: SessionConfig) -> Result<Session> {
    let (vid, pid) = (config.vendor_id, config.product_id);
    let mut session = DeviceSession::open_with_config(transport, config)
        .with_context(|| format!("open cooler (VID=0x{vid:04X} PID=0x{pid:04X})"))?;
    session.initialize().context("initialize cooler")?;
    Ok(session)
}

fn print_status(session: &mut Session) -> open_h80i_core::error::Result<()> {
    let status = commands::get_status(session)?;
    println!("H80i V2 Status:");
    println!("---------------");
    println!("{status}");
    Ok(())
}

/// Run one demo step. Returns false if the sequence should stop.
fn demo_step(
    label: &str,
    failures: &mut usize,
    result: open_h80i_core::error::Result<()>,
) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            *failures += 1;
            eprintln!("{label} failed: {e}");
            !ErrorClass::classify(&e).should_abort()
        }
    }
}

fn run_demo(session: &mut Session) -> usize {
    let mut failures = 0;
    let demo = Profile::default();

    println!("Device connected successfully\n");
    if !demo_step("Status read", &mut failures, print_status(session)) {
        return failures;
    }

    println!("\nSetting pump to {}...", demo.pump);
    let pump = commands::set_pump_speed(session, demo.pump.get()).map(|_| ());
    if !demo_step("Set pump", &mut failures, pump) {
        return failures;
    }

    println!("Setting fans to {}...", demo.fans[0]);
    for (index, duty) in (0u8..).zip(demo.fans.iter()) {
        let fan = commands::set_fan_speed(session, index, duty.get()).map(|_| ());
        if !demo_step("Set fan", &mut failures, fan) {
            return failures;
        }
    }

    println!("Setting LED to blue {}...", demo.led.mode);
    let Color { r, g, b } = demo.led.color;
    let led = commands::set_led(session, demo.led.mode, r, g, b);
    if !demo_step("Set LED", &mut failures, led) {
        return failures;
    }

    std::thread::sleep(DEMO_SETTLE);

    println!("\nUpdated status:");
    demo_step("Status read", &mut failures, print_status(session));
    failures
}

fn run(cli: Cli) -> Result<bool> {
    let config = session_config(&cli)?;
    let command = cli.command.unwrap_or(Commands::Demo);
    if let Commands::SaveProfile { path } = &command {
        profile::save_profile(path, &Profile::default())?;
        println!("Profile saved to {}", path.display());
        return Ok(true);
    }

    let mut transport = RusbTransport::new().context("initialize libusb")?;
    transport.set_debug_logging(cli.verbose);

    if let Commands::ListDevices = command {
        let devices = transport.discover_devices()?;
        if devices.is_empty() {
            println!("No Corsair coolers found.");
            println!("Ensure the cooler's USB header is connected and you have device permissions.");
        } else {
            for dev in &devices {
                println!(
                    "{} (VID: 0x{:04X}, PID: 0x{:04X}, bus {:03} address {:03})",
                    dev.model.name(),
                    dev.vid,
                    dev.pid,
                    dev.bus,
                    dev.address
                );
            }
        }
        return Ok(true);
    }

    let is_demo = matches!(command, Commands::Demo);
    let mut session = open_session(&transport, config)?;
    let ok = match command {
        Commands::Status { json } => {
            let status = commands::get_status(&mut session)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{status}");
            }
            true
        }
        Commands::SetPump { percent } => {
            let sent = commands::set_pump_speed(&mut session, Percent::saturating(percent).get())?;
            println!("Pump set to {sent}");
            true
        }
        Commands::SetFan { index, percent } => {
            let sent =
                commands::set_fan_speed(&mut session, index, Percent::saturating(percent).get())?;
            println!("Fan {index} set to {sent}");
            true
        }
        Commands::SetFans { percent } => {
            let sent = commands::set_all_fans(&mut session, Percent::saturating(percent).get())?;
            println!("Fans set to {sent}");
            true
        }
        Commands::SetLed { mode, color } => {
            let parsed_mode = LedMode::from_name(&mode).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown LED mode '{}'. Valid modes: static, blink, pulse, rainbow",
                    mode
                )
            })?;
            let parsed_color = Color::from_hex(&color)
                .ok_or_else(|| anyhow::anyhow!("Invalid colour '{color}', expected rrggbb"))?;
            let Color { r, g, b } = parsed_color;
            commands::set_led(&mut session, parsed_mode, r, g, b)?;
            println!("LED set to {parsed_mode} {parsed_color}");
            true
        }
        Commands::Apply { profile: path } => {
            let loaded = match path {
                Some(path) => profile::load_profile(&path)?,
                None => Profile::default(),
            };
            profile::apply_profile(&mut session, &loaded)?;
            println!("Applied profile '{}'", loaded.name);
            true
        }
        Commands::Demo => {
            println!("Corsair H80i V2 Control Utility");
            println!("-------------------------------");
            eprintln!("{COOLING_DISCLAIMER}\n");
            run_demo(&mut session) == 0
        }
        Commands::ListDevices | Commands::SaveProfile { .. } => true,
    };

    session.close();
    if is_demo {
        println!("\nDevice closed");
    }
    Ok(ok)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
