//! Run an external program with variables from an env file, optionally
//! duplicating its output to a log file.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::common::{debug, error, info, warn};
use crate::config::env;
use crate::{BatmonError, Result};

const COPY_BUFFER_BYTES: usize = 8 * 1024;

// Shell exit code for a command that cannot be found.
const COMMAND_NOT_FOUND: i32 = 127;

/// Log file receiving the child's combined stdout and stderr.
#[derive(Debug, Clone)]
pub struct TeeTarget {
    pub path: PathBuf,
    // Keep existing content instead of truncating.
    pub append: bool,
}

#[derive(Debug)]
pub struct Launcher {
    program: OsString,
    args: Vec<OsString>,
    env_file: Option<PathBuf>,
    tee: Option<TeeTarget>,
}

impl Launcher {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_file: None,
            tee: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn tee(mut self, target: TeeTarget) -> Self {
        self.tee = Some(target);
        self
    }

    /// Run the program to completion and treat a non zero exit as an error.
    pub async fn run(self) -> Result<()> {
        let status = self.status().await?;
        if status.success() {
            Ok(())
        } else {
            Err(BatmonError::ChildExited {
                code: exit_code(status),
            })
        }
    }

    /// Run the program to completion and return its exit status.
    pub async fn status(self) -> Result<ExitStatus> {
        let vars = match &self.env_file {
            Some(path) => {
                let vars = env::read_env_file(path)?;
                debug!("Loaded {} variables from {}", vars.len(), path.display());
                vars
            }
            None => Vec::new(),
        };

        let log = match &self.tee {
            Some(target) => Some(Arc::new(Mutex::new(open_log(target).await?))),
            None => None,
        };

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .envs(vars)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!(program = ?self.program, args = ?self.args, "Launch");
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                error!(program = ?self.program, "Command not found");
                return Err(BatmonError::ChildExited {
                    code: COMMAND_NOT_FOUND,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(copy_stream(out, tokio::io::stdout(), log.clone()))
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(copy_stream(err, tokio::io::stderr(), log.clone()))
        });

        let status = child.wait().await?;

        // Drain what is left in the pipes before reporting.
        for copier in [stdout, stderr].into_iter().flatten() {
            copier.await.map_err(io::Error::from)?;
        }
        if let Some(log) = log {
            log.lock().await.flush().await?;
        }

        info!(code = exit_code(status), "Exited");
        Ok(status)
    }
}

async fn open_log(target: &TeeTarget) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if target.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(&target.path).await
}

// Copy `src` verbatim to `console` and, if present, to the shared log file.
// A failing destination is dropped and copying continues into the other one.
async fn copy_stream<R, W>(mut src: R, console: W, log: Option<Arc<Mutex<File>>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut console = Some(console);
    let mut log = log;
    let mut buf = vec![0u8; COPY_BUFFER_BYTES];
    loop {
        let n = match src.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!("Read child output: {}", err);
                break;
            }
        };

        if let Some(out) = console.as_mut() {
            let written = match out.write_all(&buf[..n]).await {
                Ok(()) => out.flush().await,
                Err(err) => Err(err),
            };
            if let Err(err) = written {
                debug!("Stop copying to console: {}", err);
                console = None;
            }
        }

        if let Some(file) = &log {
            let written = file.lock().await.write_all(&buf[..n]).await;
            if let Err(err) = written {
                warn!("Stop copying to log file: {}", err);
                log = None;
            }
        }
    }
}

/// Shell style exit code. Signals map to 128 + signal number.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn child_sees_env_file_and_output_is_teed() {
        tokio_test::block_on(async move {
            let env = env_file("GREETING=hello\nTARGET=\"the world\"\n");
            let dir = tempfile::tempdir().unwrap();
            let log = dir.path().join("run.log");

            let status = Launcher::new("sh")
                .args(["-c", "echo \"$GREETING $TARGET\"; echo oops 1>&2; exit 3"])
                .env_file(env.path())
                .tee(TeeTarget {
                    path: log.clone(),
                    append: false,
                })
                .status()
                .await
                .unwrap();

            assert_eq!(exit_code(status), 3);

            let logged = std::fs::read_to_string(&log).unwrap();
            assert!(logged.contains("hello the world\n"));
            assert!(logged.contains("oops\n"));
            assert_eq!(logged.len(), "hello the world\n".len() + "oops\n".len());
        })
    }

    #[test]
    fn env_file_does_not_leak_into_parent() {
        tokio_test::block_on(async move {
            let env = env_file("BATMON_TEST_LAUNCH_SCOPED=1\n");

            Launcher::new("true")
                .env_file(env.path())
                .run()
                .await
                .unwrap();

            assert!(std::env::var("BATMON_TEST_LAUNCH_SCOPED").is_err());
        })
    }

    #[test]
    fn append_keeps_previous_log() {
        tokio_test::block_on(async move {
            let dir = tempfile::tempdir().unwrap();
            let log = dir.path().join("run.log");
            std::fs::write(&log, "previous\n").unwrap();

            Launcher::new("echo")
                .args(["next"])
                .tee(TeeTarget {
                    path: log.clone(),
                    append: true,
                })
                .run()
                .await
                .unwrap();

            assert_eq!(std::fs::read_to_string(&log).unwrap(), "previous\nnext\n");
        })
    }

    #[test]
    fn failing_child_is_reported() {
        tokio_test::block_on(async move {
            let err = Launcher::new("sh")
                .args(["-c", "exit 7"])
                .run()
                .await
                .unwrap_err();

            assert!(matches!(err, BatmonError::ChildExited { code: 7 }));
            assert_eq!(err.exit_code(), 7);
        })
    }

    #[test]
    fn missing_program_exits_127() {
        tokio_test::block_on(async move {
            let err = Launcher::new("batmon-test-no-such-program")
                .run()
                .await
                .unwrap_err();

            assert!(matches!(err, BatmonError::ChildExited { code: 127 }));
        })
    }

    struct BrokenPipe;

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<io::Result<usize>> {
            std::task::Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn closed_console_keeps_log_complete() {
        tokio_test::block_on(async move {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("run.log");
            let file = File::create(&path).await.unwrap();
            let log = Arc::new(Mutex::new(file));

            let output = "line\n".repeat(4096);
            copy_stream(output.as_bytes(), BrokenPipe, Some(log.clone())).await;
            log.lock().await.flush().await.unwrap();

            assert_eq!(std::fs::read_to_string(&path).unwrap(), output);
        })
    }

    #[test]
    fn missing_env_file_fails_before_launch() {
        tokio_test::block_on(async move {
            let dir = tempfile::tempdir().unwrap();
            let result = Launcher::new("true")
                .env_file(dir.path().join(".env"))
                .run()
                .await;

            assert!(matches!(result, Err(BatmonError::Internal(_))));
        })
    }
}
