//! dimmer - keep dimming the screen after the backlight hits its floor.
//!
//! `dimmer` (or `dimmer run`) starts the daemon. The other subcommands talk
//! to a running daemon over its control socket.

mod daemon;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use dimmer_core::{Config, logging};
use tracing::{error, info};

use services::ipc::{self, ControlMessage};

#[derive(Debug, Parser)]
#[command(name = "dimmer", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: $XDG_CONFIG_HOME/dimmer/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the daemon (default).
    Run,
    /// Set the dimmer brightness, 0.0 (darkest) to 1.0 (no dimming).
    Set {
        #[arg(allow_negative_numbers = true, value_parser = parse_level)]
        level: f64,
    },
    /// Remove dimming.
    Reset,
    /// Turn backlight-button control of the dimmer on or off.
    Shortcut { state: Toggle },
    /// Print the default configuration.
    DefaultConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Levels outside [0, 1] are clamped by the daemon; NaN and infinities are refused.
fn parse_level(s: &str) -> Result<f64, String> {
    let level: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if level.is_finite() {
        Ok(level)
    } else {
        Err(format!("level must be a finite number, got {s}"))
    }
}

fn send(msg: ControlMessage) -> ExitCode {
    match ipc::send(&msg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to reach dimmer daemon at {:?}: {e}", ipc::socket_path());
            eprintln!("dimmer: daemon not reachable: {e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let loaded = match Config::load(cli.config.as_deref()) {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!("{e}");
                    eprintln!("dimmer: {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(source) = &loaded.source {
                info!("Using config {:?}", source);
            }
            match daemon::run(&loaded.config) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("dimmer daemon failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Set { level } => send(ControlMessage::SetBrightness(level)),
        Command::Reset => send(ControlMessage::Reset),
        Command::Shortcut { state } => send(ControlMessage::Shortcut(matches!(state, Toggle::On))),
        Command::DefaultConfig => {
            print!("{}", dimmer_core::DEFAULT_CONFIG_TOML);
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["dimmer"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["dimmer", "-vv", "set", "0.3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Some(Command::Set { level }) if level == 0.3));

        let cli = Cli::try_parse_from(["dimmer", "shortcut", "on"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Shortcut { state: Toggle::On })
        ));

        assert!(Cli::try_parse_from(["dimmer", "shortcut", "maybe"]).is_err());
    }

    #[test]
    fn set_refuses_non_finite_levels() {
        for level in ["nan", "NaN", "inf", "-inf", "bright"] {
            assert!(
                Cli::try_parse_from(["dimmer", "set", level]).is_err(),
                "accepted {level}"
            );
        }

        let cli = Cli::try_parse_from(["dimmer", "set", "-0.5"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Set { level }) if level == -0.5));
    }
}
