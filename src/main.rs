/*
 * This file is part of Pifan.
 *
 * Copyright (C) 2025 Pifan contributors
 *
 * Pifan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Pifan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Pifan. If not, see <https://www.gnu.org/licenses/>.
 */

use std::path::PathBuf;

use anyhow::{bail, Context};
use serde_json::json;
use tracing::{error, info};

use pifan::config::default_config_path;
use pifan::logger::{self, log_event, LogSink};
use pifan::service::{run_service, ServiceOptions};
use pifan::PifanError;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    event_log: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    Run(CliArgs),
    Help,
    Version,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut cli = CliArgs::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "--logging" => cli.event_log = true,
            "-c" | "--config" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    bail!("--config requires a path argument");
                };
                cli.config_path = Some(PathBuf::from(path));
            }
            arg => bail!("Unknown argument: {}", arg),
        }
        i += 1;
    }
    Ok(Command::Run(cli))
}

fn print_help() {
    eprintln!("pifand {} - Raspberry Pi PWM fan controller", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    pifand [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Config file (default: $PIFAN_CONFIG or /opt/pi4-fan/config.json)");
    eprintln!("        --logging       Append lifecycle events to /var/log/pifan/events.json");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    PIFAN_LOG           Log level (trace, debug, info, warn, error)");
    eprintln!("    PIFAN_CONFIG        Config file path");
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let cli = match parse_args(&args) {
        Ok(Command::Run(cli)) => cli,
        Ok(Command::Help) => {
            print_help();
            return;
        }
        Ok(Command::Version) => {
            println!("pifand {}", VERSION);
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let sink = logger::init_tracing(LogSink::detect());
    if cli.event_log {
        match logger::init_event_log(None) {
            Some(path) => info!("Event log: {}", path.display()),
            None => eprintln!("Could not open an event log, continuing without one"),
        }
        log_event("startup", json!({ "version": VERSION, "args": args }));
    }

    info!("STARTUP: pifand {} starting", VERSION);
    info!("STARTUP: Logging to {}", sink);

    let opts = ServiceOptions {
        config_path: cli.config_path.unwrap_or_else(default_config_path),
        ..ServiceOptions::default()
    };

    match run_service(opts).await.context("fan controller stopped") {
        Ok(signal) => {
            log_event("shutdown", json!({ "signal": signal.to_string() }));
            info!("SHUTDOWN: Fan controller terminated gracefully");
        }
        Err(e) => {
            error!("{:#}", e);
            if e.downcast_ref::<PifanError>().is_some_and(PifanError::is_hardware) {
                error!("Check that the GPIO pin is free and /dev/gpiomem is accessible");
            }
            log_event("fatal_error", json!({ "error": format!("{:#}", e) }));
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("pifand")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_no_args_runs_with_defaults() {
        assert_eq!(parse_args(&args(&[])).unwrap(), Command::Run(CliArgs::default()));
    }

    #[test]
    fn test_config_and_logging() {
        let cmd = parse_args(&args(&["--logging", "-c", "/etc/pifan.json"])).unwrap();
        assert_eq!(
            cmd,
            Command::Run(CliArgs {
                config_path: Some(PathBuf::from("/etc/pifan.json")),
                event_log: true,
            })
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["-v"])).unwrap(), Command::Version);
    }

    #[test]
    fn test_missing_config_value() {
        assert!(parse_args(&args(&["--config"])).is_err());
    }

    #[test]
    fn test_unknown_argument() {
        let err = parse_args(&args(&["--turbo"])).unwrap_err();
        assert!(err.to_string().contains("--turbo"));
    }
}
