use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use clap::{ArgAction, Args};

use crate::common::ErrorKind;
use crate::config::env;
use crate::launch::{Launcher, TeeTarget};
use crate::Result;

/// Run a program with variables from an env file
#[derive(Args, Debug)]
pub struct ExecCommand {
    /// Env file passed to the program
    #[arg(long, default_value = env::DEFAULT_ENV_FILE)]
    pub(crate) env_file: PathBuf,
    /// Duplicate the program's stdout and stderr to this file
    #[arg(long)]
    pub(crate) tee: Option<PathBuf>,
    /// Append to the tee file instead of truncating it
    #[arg(long, action = ArgAction::SetTrue, requires = "tee")]
    pub(crate) append: bool,
    /// Program and its arguments
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub(crate) command: Vec<OsString>,
}

impl ExecCommand {
    pub async fn run(self) -> Result<()> {
        let ExecCommand {
            env_file,
            tee,
            append,
            command,
        } = self;

        let mut command = command.into_iter();
        let program = command.next().ok_or_else(|| {
            ErrorKind::Io(io::Error::new(io::ErrorKind::InvalidInput, "no program given"))
        })?;

        let mut launcher = Launcher::new(program).args(command).env_file(env_file);
        if let Some(path) = tee {
            launcher = launcher.tee(TeeTarget { path, append });
        }

        launcher.run().await
    }
}
