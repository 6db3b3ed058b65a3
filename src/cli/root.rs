use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::cli::{exec, monitor, poll, scan};
use crate::common::debug;
use crate::config::{Config, Initializer};
use crate::Result;

/// UT1300 battery telemetry collector
#[derive(Parser, Debug)]
#[command(version, propagate_version = true, subcommand_required = true)]
pub struct BatmonCommand {
    /// Global options
    #[command(flatten)]
    pub global: GlobalOptions,
    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Global options
#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Configuration file path
    #[arg(long, short = 'C', env = "BATMON_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    /// Duplicate log output to this file
    #[arg(long, env = "BATMON_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
    /// Append to the log file instead of truncating it
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub log_append: bool,
}

/// Discovery options
#[derive(Args, Debug, Default)]
pub struct ScanOptions {
    /// Stop scanning after this many batteries
    #[arg(long, env = "BATMON_MAX_BATTERIES")]
    pub max_batteries: Option<usize>,
    /// Scan timeout
    #[arg(long, env = "BATMON_SCAN_TIMEOUT_MS")]
    pub scan_timeout_ms: Option<u64>,
    /// Accepted advertised name, matched as substring. Repeatable
    #[arg(long = "name")]
    pub local_names: Vec<String>,
}

/// Request schedule options
#[derive(Args, Debug, Default)]
pub struct PollOptions {
    /// Time to wait for a response before sending the next request
    #[arg(long, env = "BATMON_COMMAND_INTERVAL_MS")]
    pub command_interval_ms: Option<u64>,
    /// Time to wait for responses after the last request
    #[arg(long, env = "BATMON_SETTLE_MS")]
    pub settle_ms: Option<u64>,
}

impl ScanOptions {
    pub(crate) fn apply(self, config: &mut Config) {
        let ScanOptions {
            max_batteries,
            scan_timeout_ms,
            local_names,
        } = self;

        config.ble.set_max_batteries(max_batteries);
        config.ble.set_scan_timeout_milliseconds(scan_timeout_ms);
        config.ble.set_local_names(&mut Some(local_names));
    }
}

impl PollOptions {
    pub(crate) fn apply(self, config: &mut Config) {
        config
            .poll
            .set_command_interval_milliseconds(self.command_interval_ms);
        config.poll.set_settle_milliseconds(self.settle_ms);
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan
    Scan(scan::ScanCommand),
    /// Poll
    Poll(poll::PollCommand),
    /// Monitor
    Monitor(monitor::MonitorCommand),
    /// Exec
    Exec(exec::ExecCommand),
}

/// Parse command line args
pub fn parse() -> BatmonCommand {
    BatmonCommand::parse()
}

/// Load the configuration file if given, defaults otherwise.
pub async fn load_initializer(path: Option<&Path>) -> Result<Initializer> {
    match path {
        Some(path) => {
            debug!("Load config {}", path.display());
            Ok(Initializer::load_config_file(path).await?)
        }
        None => Ok(Initializer::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exec_with_trailing_args() {
        let command = BatmonCommand::try_parse_from([
            "batmon", "exec", "--tee", "run.log", "--", "python", "main.py", "--verbose",
        ])
        .unwrap();

        let Command::Exec(exec) = command.command else {
            panic!("exec expected");
        };
        assert_eq!(exec.command, vec!["python", "main.py", "--verbose"]);
    }

    #[test]
    fn scan_options_override_config() {
        let command = BatmonCommand::try_parse_from([
            "batmon",
            "scan",
            "--max-batteries",
            "2",
            "--name",
            "UT1300",
            "--name",
            "R1300",
        ])
        .unwrap();

        let Command::Scan(scan) = command.command else {
            panic!("scan expected");
        };
        let mut config = Config::default();
        scan.scan.apply(&mut config);

        assert_eq!(config.ble.max_batteries(), 2);
    }
}
