//! Ferry CLI
//!
//! Raw file transfer over a hardware-flow-controlled serial link.
//!
//! - `ferry send` streams a file out a port until end of file
//! - `ferry receive` captures a port into memory until Enter is pressed,
//!   then saves the capture in one write
//! - `ferry ports` lists the serial ports present

mod config;
mod listener;
mod progress;
mod prompt;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use std::path::{Path, PathBuf};

use config::{Config, expand_path};
use ferry_core::{CancellationSource, ReceiveSession, SendSession, SessionError};
use ferry_link::{Link, PortInfo, SerialLink};
use listener::ListenerMode;
use progress::{ReceiveProgress, SendProgress, format_bytes};
use prompt::{Prompter, resolve_baud};

/// Ferry - move a file across a serial cable
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output (implies --verbose)
    #[arg(short, long)]
    debug: bool,

    /// Configuration file path [default: ferry/config.toml in the platform
    /// config directory, used only if present]
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a file out a serial port
    Send {
        /// File to send (prompted for when omitted)
        file: Option<String>,

        /// Serial device (prompted for when omitted)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate; invalid values fall back to 2000000
        #[arg(short, long)]
        baud: Option<String>,
    },

    /// Capture a serial port into a file until Enter is pressed
    Receive {
        /// Where to save the capture (prompted for when omitted)
        output: Option<String>,

        /// Serial device (prompted for when omitted)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate; invalid values fall back to 2000000
        #[arg(short, long)]
        baud: Option<String>,

        /// How the Enter key is watched
        #[arg(long, value_enum)]
        listener: Option<ListenerMode>,

        /// Drop the capture instead of saving it if the link fails
        #[arg(long)]
        discard_on_error: bool,
    },

    /// List serial ports
    Ports,

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show specific configuration key
        key: Option<String>,
    },

    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,

        /// Value to set
        value: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over the flags
    let log_level = if cli.debug {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let explicit = cli.config.as_deref().map(expand_path);

    match cli.command {
        Commands::Send { file, port, baud } => {
            let config = session_config(explicit.as_deref())?;
            send_file(file, port, baud, &config)?;
        }
        Commands::Receive {
            output,
            port,
            baud,
            listener,
            discard_on_error,
        } => {
            let config = session_config(explicit.as_deref())?;
            let mode = listener.unwrap_or(config.listener.mode);
            receive_file(output, port, baud, mode, discard_on_error, &config)?;
        }
        Commands::Ports => {
            list_ports()?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { key } => {
                config_show(key, &Config::load_from(explicit.as_deref())?)?;
            }
            ConfigAction::Set { key, value } => {
                let config_path = explicit.unwrap_or_else(Config::default_path);
                config_set(&key, &value, &config_path)?;
            }
        },
    }

    Ok(())
}

/// Configuration for a transfer; values a session cannot run with are
/// rejected here rather than by `config` subcommands.
fn session_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let config = Config::load_from(explicit)?;
    config.validate()?;
    Ok(config)
}

/// One-line summary of an open link.
fn describe_link(link: &SerialLink) -> String {
    let flow = link.flow_control();
    let handshakes = match (flow.rts_cts, flow.dsr_dtr) {
        (true, true) => "RTS/CTS and DTR",
        (true, false) => "RTS/CTS",
        (false, true) => "DTR",
        (false, false) => "no handshake",
    };
    format!(
        "Opened {} at {} baud with {handshakes}",
        link.name(),
        link.baud_rate()
    )
}

/// Device from the command line, or picked from the ports present.
fn choose_port<R, W>(
    port: Option<String>,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<String>
where
    R: prompt::LineSource,
    W: std::io::Write,
{
    if let Some(port) = port {
        return Ok(port);
    }

    let ports = ferry_link::available_ports()?;
    if ports.is_empty() {
        anyhow::bail!("no serial ports found");
    }
    let chosen: PortInfo = prompter.select_port(&ports)?;
    Ok(chosen.device)
}

/// Baud rate from the command line, or asked for.
fn choose_baud<R, W>(
    baud: Option<String>,
    default: u32,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<u32>
where
    R: prompt::LineSource,
    W: std::io::Write,
{
    match baud {
        Some(text) => {
            let (baud, error) = resolve_baud(&text, default);
            if let Some(e) = error {
                tracing::warn!("{e}, using {baud}");
            }
            Ok(baud)
        }
        None => Ok(prompter.baud_rate(default)?),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Send a file out a serial port
fn send_file(
    file: Option<String>,
    port: Option<String>,
    baud: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let mut prompter = Prompter::stdio();
    let device = choose_port(port, &mut prompter)?;
    let baud_rate = choose_baud(baud, config.serial.baud_rate, &mut prompter)?;

    let path = match file.filter(|f| !f.trim().is_empty()) {
        Some(file) => PathBuf::from(file),
        None => prompter.send_path()??,
    };

    let link = SerialLink::open(&config.send_link(&device, baud_rate))
        .with_context(|| format!("Failed to open {device}"))?;
    println!("{}", describe_link(&link));

    let session = SendSession::new(link, &path, &config.send_options())?;
    println!(
        "Sending {} ({})",
        path.display(),
        format_bytes(session.expected_bytes())
    );

    let mut progress = SendProgress::new(file_label(&path));
    let report = session.run(&mut progress)?;

    println!(
        "{} {} in {:.2}s{}",
        style("Transfer complete:").green(),
        format_bytes(report.bytes),
        report.elapsed.as_secs_f64(),
        report
            .throughput
            .map(|rate| format!(" ({rate})"))
            .unwrap_or_default()
    );
    Ok(())
}

/// Capture a serial port into a file
fn receive_file(
    output: Option<String>,
    port: Option<String>,
    baud: Option<String>,
    mode: ListenerMode,
    discard_on_error: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let mut prompter = Prompter::stdio();
    let device = choose_port(port, &mut prompter)?;
    let baud_rate = choose_baud(baud, config.serial.baud_rate, &mut prompter)?;

    let explicit = match output.filter(|o| !o.trim().is_empty()) {
        Some(output) => Some(PathBuf::from(output)),
        None => prompter.receive_path()?,
    };
    let path = match explicit {
        Some(path) => path,
        None => {
            let path = ferry_files::naming::default_capture_path_now()
                .context("Failed to resolve the working directory")?;
            println!("Capture will be saved as {}", path.display());
            path
        }
    };

    let link = SerialLink::open(&config.receive_link(&device, baud_rate))
        .with_context(|| format!("Failed to open {device}"))?;
    println!("{}", describe_link(&link));

    let mut options = config.receive_options();
    if discard_on_error {
        options.persist_on_error = false;
    }

    let trigger = listener::stop_trigger(mode).context("Failed to set up the stop key")?;
    let source = CancellationSource::new(trigger).with_interval(config.poll_interval());

    let mut session = ReceiveSession::new(link, path, options)?;
    let mut progress = ReceiveProgress::new(prompter);

    match session.run(source, &mut progress) {
        Ok(report) => {
            println!(
                "{} {} ({})",
                style("File saved to:").green(),
                report.path.display(),
                format_bytes(report.bytes)
            );
            if let Some(rate) = report.throughput {
                println!(
                    "Average rate {rate} over {:.2}s",
                    report.elapsed.as_secs_f64()
                );
            }
            Ok(())
        }
        Err(SessionError::Interrupted {
            source,
            saved_to,
            bytes,
        }) => {
            match saved_to {
                Some(path) => eprintln!(
                    "{} {} of partial capture saved to {}",
                    style("Link failed:").red(),
                    format_bytes(bytes),
                    path.display()
                ),
                None => eprintln!(
                    "{} {} of partial capture discarded",
                    style("Link failed:").red(),
                    format_bytes(bytes)
                ),
            }
            Err(source).context("Receive interrupted")
        }
        Err(e) => Err(e.into()),
    }
}

/// List serial ports
fn list_ports() -> anyhow::Result<()> {
    let ports = ferry_link::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    prompt::print_ports(&mut std::io::stdout(), &ports)?;
    Ok(())
}

/// Show configuration (all or specific key)
fn config_show(key: Option<String>, config: &Config) -> anyhow::Result<()> {
    if let Some(key) = key {
        println!("{}", config.get(&key)?);
        return Ok(());
    }

    println!("Ferry Configuration");
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Set a configuration value
fn config_set(key: &str, value: &str, config_path: &Path) -> anyhow::Result<()> {
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    config.set(key, value)?;
    config.validate()?;
    config.save(config_path)?;

    println!("Set {key} = {value}");
    println!("Configuration saved to {}", config_path.display());
    Ok(())
}
